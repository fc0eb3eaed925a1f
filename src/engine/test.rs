#[cfg(test)]
mod tests {
    use crate::engine;
    use crate::error::CommandError;
    use crate::response::{Scope, ServerEvent};
    use crate::room::{Material, MaterialKind, MaterialSpec, Participant, Position, Room};
    use crate::session::Role;
    use std::collections::HashSet;

    fn open_room() -> Room {
        let mut room = Room::new("AB12CD".to_string(), "Math".to_string(), "Kim".to_string());
        room.is_open = true;
        room
    }

    fn teacher(connection_id: u64) -> Participant {
        Participant {
            connection_id,
            name: "Kim".to_string(),
            role: Role::Teacher,
            room_code: "AB12CD".to_string(),
        }
    }

    fn student(connection_id: u64) -> Participant {
        Participant {
            connection_id,
            name: "Lee".to_string(),
            role: Role::Student,
            room_code: "AB12CD".to_string(),
        }
    }

    fn post(room: &mut Room, sender: &Participant, text: &str) -> u64 {
        let emit = engine::send_message(room, sender, text, None, false).unwrap();
        match emit.event {
            ServerEvent::NewMessage { message } => message.id,
            other => panic!("expected NewMessage, got {:?}", other),
        }
    }

    fn link_spec(title: &str) -> MaterialSpec {
        MaterialSpec {
            kind: MaterialKind::Youtube,
            url: format!("https://youtu.be/{}", title),
            title: title.to_string(),
            video_id: Some(title.to_string()),
            thumbnail: None,
            path: None,
            size: None,
            mimetype: None,
        }
    }

    fn add(room: &mut Room, title: &str) -> Material {
        engine::add_material(room, link_spec(title)).0
    }

    fn ids(room: &Room) -> Vec<u64> {
        room.materials.iter().map(|m| m.id).collect()
    }

    // Room lifecycle

    #[test]
    fn test_toggle_open_flips_and_broadcasts() {
        let mut room = Room::new("AB12CD".into(), "Math".into(), "Kim".into());
        assert!(!room.is_open);

        let emit = engine::toggle_open(&mut room);
        assert!(room.is_open);
        assert_eq!(emit.scope, Scope::Room);
        assert_eq!(
            emit.event,
            ServerEvent::RoomStatusChanged { is_open: true }
        );

        engine::toggle_open(&mut room);
        assert!(!room.is_open);
    }

    #[test]
    fn test_student_cannot_join_closed_room() {
        let mut room = Room::new("AB12CD".into(), "Math".into(), "Kim".into());

        let result = engine::join(&mut room, 2, "Lee", Role::Student);
        assert_eq!(result.unwrap_err(), CommandError::RoomClosed);
        // Join never partially succeeds.
        assert!(room.students.is_empty());
    }

    #[test]
    fn test_teacher_may_join_closed_room() {
        let mut room = Room::new("AB12CD".into(), "Math".into(), "Kim".into());
        let outcome = engine::join(&mut room, 1, "Kim", Role::Teacher).unwrap();
        // Teachers are not roster members.
        assert!(room.students.is_empty());
        assert!(matches!(
            outcome.snapshot,
            ServerEvent::JoinResult { success: true, .. }
        ));
    }

    #[test]
    fn test_join_requires_name() {
        let mut room = open_room();
        let result = engine::join(&mut room, 2, "   ", Role::Student);
        assert_eq!(result.unwrap_err(), CommandError::EmptyField("name"));
        assert!(room.students.is_empty());
    }

    #[test]
    fn test_student_join_adds_to_roster_and_announces() {
        let mut room = open_room();
        let outcome = engine::join(&mut room, 2, "Lee", Role::Student).unwrap();

        assert_eq!(room.students.len(), 1);
        assert_eq!(room.students[0].connection_id, 2);
        assert_eq!(outcome.announce.scope, Scope::RoomExceptSender(2));
        assert_eq!(
            outcome.announce.event,
            ServerEvent::UserJoined {
                name: "Lee".to_string(),
                role: Role::Student,
            }
        );
    }

    #[test]
    fn test_join_snapshot_hides_hidden_messages_from_students() {
        let mut room = open_room();
        let kim = teacher(1);
        let visible = post(&mut room, &kim, "visible");
        let hidden = post(&mut room, &kim, "hidden");
        engine::set_message_hidden(&mut room, hidden, true).unwrap();

        let outcome = engine::join(&mut room, 2, "Lee", Role::Student).unwrap();
        let messages = match outcome.snapshot {
            ServerEvent::JoinResult {
                messages: Some(messages),
                ..
            } => messages,
            other => panic!("expected snapshot, got {:?}", other),
        };
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, visible);

        // A joining teacher sees everything.
        let outcome = engine::join(&mut room, 3, "Park", Role::Teacher).unwrap();
        match outcome.snapshot {
            ServerEvent::JoinResult {
                messages: Some(messages),
                ..
            } => assert_eq!(messages.len(), 2),
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    // Messages

    #[test]
    fn test_send_message_rejects_empty_text() {
        let mut room = open_room();
        let result = engine::send_message(&mut room, &teacher(1), "  ", None, false);
        assert_eq!(result.unwrap_err(), CommandError::EmptyField("text"));
        assert!(room.messages.is_empty());
    }

    #[test]
    fn test_student_cannot_post_to_closed_room() {
        let mut room = open_room();
        room.is_open = false;
        let result = engine::send_message(&mut room, &student(2), "hi", None, false);
        assert_eq!(result.unwrap_err(), CommandError::RoomClosed);
        assert!(room.messages.is_empty());

        // The teacher still can.
        engine::send_message(&mut room, &teacher(1), "hi", None, false).unwrap();
        assert_eq!(room.messages.len(), 1);
    }

    #[test]
    fn test_message_ids_are_never_reused() {
        let mut room = open_room();
        let kim = teacher(1);
        let mut seen = HashSet::new();
        for i in 0..50 {
            let id = post(&mut room, &kim, &format!("note {}", i));
            assert!(seen.insert(id), "message id reused");
        }
    }

    #[test]
    fn test_message_scope_follows_moderation_policy() {
        let mut room = open_room();

        let emit = engine::send_message(&mut room, &teacher(1), "hi", None, true).unwrap();
        assert_eq!(emit.scope, Scope::Room);

        let emit = engine::send_message(&mut room, &student(2), "hi", None, false).unwrap();
        assert_eq!(emit.scope, Scope::Room);

        let emit = engine::send_message(&mut room, &student(2), "hi", None, true).unwrap();
        assert_eq!(emit.scope, Scope::Teachers);
    }

    #[test]
    fn test_messages_keep_append_order() {
        let mut room = open_room();
        let kim = teacher(1);
        let first = post(&mut room, &kim, "first");
        let second = post(&mut room, &kim, "second");
        let third = post(&mut room, &kim, "third");

        engine::delete_message(&mut room, second).unwrap();
        let order: Vec<u64> = room.messages.iter().map(|m| m.id).collect();
        assert_eq!(order, vec![first, third]);
    }

    #[test]
    fn test_move_message_updates_position_except_sender() {
        let mut room = open_room();
        let id = post(&mut room, &teacher(1), "note");

        let position = Position { x: 50.0, y: 75.0 };
        let emit = engine::move_message(&mut room, 1, id, position).unwrap();
        assert_eq!(emit.scope, Scope::RoomExceptSender(1));
        assert_eq!(room.message(id).unwrap().position, Some(position));
    }

    #[test]
    fn test_visibility_round_trip_restores_message() {
        let mut room = open_room();
        let id = post(&mut room, &teacher(1), "note");
        let before = room.message(id).unwrap().clone();

        engine::set_message_hidden(&mut room, id, true).unwrap();
        assert!(room.message(id).unwrap().hidden);

        let emit = engine::set_message_hidden(&mut room, id, false).unwrap();
        let after = room.message(id).unwrap().clone();
        assert_eq!(after, before);

        // Revealing re-sends the full message for receivers that lack it.
        match emit.event {
            ServerEvent::MessageVisibilityChanged {
                hidden: false,
                message: Some(message),
                ..
            } => assert_eq!(message.id, id),
            other => panic!("expected full message, got {:?}", other),
        }
    }

    #[test]
    fn test_hiding_omits_message_payload() {
        let mut room = open_room();
        let id = post(&mut room, &teacher(1), "note");

        let emit = engine::set_message_hidden(&mut room, id, true).unwrap();
        assert_eq!(
            emit.event,
            ServerEvent::MessageVisibilityChanged {
                message_id: id,
                hidden: true,
                message: None,
            }
        );
    }

    #[test]
    fn test_deleted_message_yields_not_found_afterwards() {
        let mut room = open_room();
        let id = post(&mut room, &teacher(1), "note");

        engine::delete_message(&mut room, id).unwrap();

        let position = Position { x: 0.0, y: 0.0 };
        assert_eq!(
            engine::move_message(&mut room, 1, id, position).unwrap_err(),
            CommandError::MessageNotFound(id)
        );
        assert_eq!(
            engine::set_message_hidden(&mut room, id, true).unwrap_err(),
            CommandError::MessageNotFound(id)
        );
        assert_eq!(
            engine::delete_message(&mut room, id).unwrap_err(),
            CommandError::MessageNotFound(id)
        );
    }

    // Materials

    #[test]
    fn test_add_material_appends_in_order() {
        let mut room = open_room();
        let a = add(&mut room, "a");
        let b = add(&mut room, "b");
        assert_eq!(a.order, 0);
        assert_eq!(b.order, 1);
        assert_eq!(ids(&room), vec![a.id, b.id]);
    }

    #[test]
    fn test_reorder_is_idempotent() {
        let mut room = open_room();
        let a = add(&mut room, "a");
        let b = add(&mut room, "b");
        let c = add(&mut room, "c");

        let ordering = vec![c.id, a.id, b.id];
        engine::reorder_materials(&mut room, &ordering).unwrap();
        let first_pass = room.materials.clone();

        engine::reorder_materials(&mut room, &ordering).unwrap();
        assert_eq!(room.materials, first_pass);
        assert_eq!(ids(&room), ordering);
        let orders: Vec<usize> = room.materials.iter().map(|m| m.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[test]
    fn test_reorder_rejects_non_permutations() {
        let mut room = open_room();
        let a = add(&mut room, "a");
        let b = add(&mut room, "b");
        let before = room.materials.clone();

        // Dropped id
        assert_eq!(
            engine::reorder_materials(&mut room, &[a.id]).unwrap_err(),
            CommandError::BadReorder
        );
        // Duplicate id
        assert_eq!(
            engine::reorder_materials(&mut room, &[a.id, a.id]).unwrap_err(),
            CommandError::BadReorder
        );
        // Unknown id
        assert_eq!(
            engine::reorder_materials(&mut room, &[a.id, b.id + 1]).unwrap_err(),
            CommandError::BadReorder
        );
        // No state change on any rejection
        assert_eq!(room.materials, before);
    }

    #[test]
    fn test_reorder_keeps_shown_material_pointer() {
        let mut room = open_room();
        let a = add(&mut room, "a");
        let b = add(&mut room, "b");
        engine::show_material(&mut room, b.id).unwrap();
        assert_eq!(room.current_index(), Some(1));

        engine::reorder_materials(&mut room, &[b.id, a.id]).unwrap();
        assert_eq!(room.current_material, Some(b.id));
        assert_eq!(room.current_index(), Some(0));
    }

    #[test]
    fn test_show_material_broadcasts_with_index() {
        let mut room = open_room();
        add(&mut room, "a");
        let b = add(&mut room, "b");

        let emit = engine::show_material(&mut room, b.id).unwrap();
        assert_eq!(emit.scope, Scope::Room);
        match emit.event {
            ServerEvent::MaterialShown {
                material: Some(material),
                index: Some(index),
            } => {
                assert_eq!(material.id, b.id);
                assert_eq!(index, 1);
            }
            other => panic!("expected MaterialShown, got {:?}", other),
        }

        let missing = (0..).find(|id| room.material_index(*id).is_none()).unwrap();
        assert_eq!(
            engine::show_material(&mut room, missing).unwrap_err(),
            CommandError::MaterialNotFound(missing)
        );
    }

    #[test]
    fn test_delete_shown_material_prefers_same_index() {
        let mut room = open_room();
        add(&mut room, "a");
        let b = add(&mut room, "b");
        let c = add(&mut room, "c");
        engine::show_material(&mut room, b.id).unwrap();

        let (_, emits) = engine::delete_material(&mut room, b.id).unwrap();
        // The material that slid into b's index is now shown.
        assert_eq!(room.current_material, Some(c.id));
        assert_eq!(emits.len(), 2);
        match &emits[1].event {
            ServerEvent::MaterialShown {
                material: Some(material),
                index: Some(1),
            } => assert_eq!(material.id, c.id),
            other => panic!("expected pointer advance, got {:?}", other),
        }
    }

    #[test]
    fn test_delete_last_shown_material_falls_back_to_previous() {
        let mut room = open_room();
        let a = add(&mut room, "a");
        let b = add(&mut room, "b");
        engine::show_material(&mut room, b.id).unwrap();

        engine::delete_material(&mut room, b.id).unwrap();
        assert_eq!(room.current_material, Some(a.id));
        assert_eq!(room.current_index(), Some(0));
    }

    #[test]
    fn test_delete_only_shown_material_clears_pointer() {
        let mut room = open_room();
        let a = add(&mut room, "a");
        engine::show_material(&mut room, a.id).unwrap();

        let (_, emits) = engine::delete_material(&mut room, a.id).unwrap();
        assert!(room.current_material.is_none());
        assert_eq!(
            emits[1].event,
            ServerEvent::MaterialShown {
                material: None,
                index: None,
            }
        );

        // A subsequent joiner sees no current material.
        room.is_open = true;
        let outcome = engine::join(&mut room, 2, "Lee", Role::Student).unwrap();
        match outcome.snapshot {
            ServerEvent::JoinResult {
                current_material,
                current_material_index,
                ..
            } => {
                assert!(current_material.is_none());
                assert!(current_material_index.is_none());
            }
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[test]
    fn test_delete_unshown_material_keeps_pointer() {
        let mut room = open_room();
        let a = add(&mut room, "a");
        let b = add(&mut room, "b");
        engine::show_material(&mut room, a.id).unwrap();

        let (deleted, emits) = engine::delete_material(&mut room, b.id).unwrap();
        assert_eq!(deleted.id, b.id);
        assert_eq!(emits.len(), 1);
        assert_eq!(room.current_material, Some(a.id));
    }

    #[test]
    fn test_delete_material_returns_it_for_blob_release() {
        let mut room = open_room();
        let spec = MaterialSpec {
            kind: MaterialKind::Pdf,
            url: "/uploads/file-1-2.pdf".to_string(),
            title: "worksheet.pdf".to_string(),
            video_id: None,
            thumbnail: None,
            path: Some("uploads/file-1-2.pdf".to_string()),
            size: Some(1024),
            mimetype: Some("application/pdf".to_string()),
        };
        let (material, _) = engine::add_material(&mut room, spec);

        let (deleted, _) = engine::delete_material(&mut room, material.id).unwrap();
        assert_eq!(deleted.path.as_deref(), Some("uploads/file-1-2.pdf"));
        assert_eq!(
            engine::delete_material(&mut room, material.id).unwrap_err(),
            CommandError::MaterialNotFound(material.id)
        );
    }

    // Departure

    #[test]
    fn test_leave_removes_student_from_roster() {
        let mut room = open_room();
        engine::join(&mut room, 2, "Lee", Role::Student).unwrap();
        engine::join(&mut room, 3, "Choi", Role::Student).unwrap();

        let emit = engine::leave(&mut room, 2, "Lee", Role::Student);
        assert_eq!(room.students.len(), 1);
        assert_eq!(room.students[0].connection_id, 3);
        assert_eq!(emit.scope, Scope::RoomExceptSender(2));
        assert_eq!(
            emit.event,
            ServerEvent::UserLeft {
                name: "Lee".to_string(),
                role: Role::Student,
            }
        );
    }

    #[test]
    fn test_leave_keeps_authored_content() {
        let mut room = open_room();
        engine::join(&mut room, 2, "Lee", Role::Student).unwrap();
        engine::send_message(&mut room, &student(2), "mine", None, false).unwrap();

        engine::leave(&mut room, 2, "Lee", Role::Student);
        assert_eq!(room.messages.len(), 1);
    }
}
