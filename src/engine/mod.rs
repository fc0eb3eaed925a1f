//! The room state engine: one validate-then-commit transition per command.
//!
//! Each operation checks its preconditions before touching anything, so an
//! error never leaves a room partially mutated. Operations return the
//! events to deliver and their scopes; the gateway owns authorization (via
//! the session directory) and actually publishing.

mod test;

use crate::error::{CommandError, Result};
use crate::response::{Emit, ServerEvent};
use crate::room::{Material, MaterialSpec, Message, Participant, Position, Room};
use crate::session::Role;
use crate::utils;
use std::collections::HashSet;

/// Result of a successful join: the snapshot reply for the joiner plus the
/// announcement for everyone already there.
#[derive(Debug)]
pub struct JoinOutcome {
    pub participant: Participant,
    pub snapshot: ServerEvent,
    pub announce: Emit,
}

/// Flips the room's open flag.
pub fn toggle_open(room: &mut Room) -> Emit {
    room.is_open = !room.is_open;
    tracing::info!(code = %room.code, is_open = room.is_open, "room status changed");
    Emit::room(ServerEvent::RoomStatusChanged {
        is_open: room.is_open,
    })
}

/// Adds a participant to the room. Students may only enter an open room;
/// no participant is added unless the reply will report success.
pub fn join(
    room: &mut Room,
    connection_id: u64,
    name: &str,
    role: Role,
) -> Result<JoinOutcome> {
    if name.trim().is_empty() {
        return Err(CommandError::EmptyField("name"));
    }
    if role == Role::Student && !room.is_open {
        return Err(CommandError::RoomClosed);
    }

    let participant = Participant {
        connection_id,
        name: name.to_string(),
        role,
        room_code: room.code.clone(),
    };
    if role == Role::Student {
        room.students.push(participant.clone());
    }

    let snapshot = ServerEvent::JoinResult {
        success: true,
        room: Some(room.summary()),
        participant: Some(participant.clone()),
        messages: Some(room.messages_for(role)),
        materials: Some(room.materials.clone()),
        current_material: room.shown_material().cloned(),
        current_material_index: room.current_index(),
        reason: None,
    };
    let announce = Emit::except(
        connection_id,
        ServerEvent::UserJoined {
            name: participant.name.clone(),
            role,
        },
    );
    tracing::info!(code = %room.code, name = %participant.name, role = ?role, "user joined");

    Ok(JoinOutcome {
        participant,
        snapshot,
        announce,
    })
}

/// Appends a message with a fresh id. Students may only post while the
/// room is open; with moderated intake their messages deliver teacher-only
/// until the teacher chooses to reveal them.
pub fn send_message(
    room: &mut Room,
    sender: &Participant,
    text: &str,
    position: Option<Position>,
    moderated_intake: bool,
) -> Result<Emit> {
    if text.trim().is_empty() {
        return Err(CommandError::EmptyField("text"));
    }
    if sender.role == Role::Student && !room.is_open {
        return Err(CommandError::RoomClosed);
    }

    let message = Message {
        id: utils::fresh_id(),
        sender: sender.name.clone(),
        role: sender.role,
        text: text.to_string(),
        timestamp: utils::now_millis(),
        position,
        hidden: false,
    };
    room.messages.push(message.clone());

    let event = ServerEvent::NewMessage { message };
    if sender.role == Role::Student && moderated_intake {
        Ok(Emit::teachers(event))
    } else {
        Ok(Emit::room(event))
    }
}

/// Repositions a message. The sender's client already shows the new
/// position, so it is excluded from delivery.
pub fn move_message(
    room: &mut Room,
    sender_connection: u64,
    message_id: u64,
    position: Position,
) -> Result<Emit> {
    let message = room
        .message_mut(message_id)
        .ok_or(CommandError::MessageNotFound(message_id))?;
    message.position = Some(position);
    Ok(Emit::except(
        sender_connection,
        ServerEvent::MessagePositionUpdated {
            message_id,
            position,
        },
    ))
}

/// Hides a message from students or reveals it again.
pub fn set_message_hidden(
    room: &mut Room,
    message_id: u64,
    hidden: bool,
) -> Result<Emit> {
    let message = room
        .message_mut(message_id)
        .ok_or(CommandError::MessageNotFound(message_id))?;
    message.hidden = hidden;
    let message = (!hidden).then(|| message.clone());
    Ok(Emit::room(ServerEvent::MessageVisibilityChanged {
        message_id,
        hidden,
        message,
    }))
}

pub fn delete_message(room: &mut Room, message_id: u64) -> Result<Emit> {
    let index = room
        .messages
        .iter()
        .position(|m| m.id == message_id)
        .ok_or(CommandError::MessageNotFound(message_id))?;
    room.messages.remove(index);
    Ok(Emit::room(ServerEvent::MessageDeleted { message_id }))
}

/// Appends a material with a fresh id at the end of the sequence.
pub fn add_material(room: &mut Room, spec: MaterialSpec) -> (Material, Emit) {
    let material = Material {
        id: utils::fresh_id(),
        kind: spec.kind,
        url: spec.url,
        title: spec.title,
        order: room.materials.len(),
        video_id: spec.video_id,
        thumbnail: spec.thumbnail,
        path: spec.path,
        size: spec.size,
        mimetype: spec.mimetype,
    };
    room.materials.push(material.clone());
    tracing::info!(code = %room.code, material = material.id, title = %material.title, "material added");
    let emit = Emit::room(ServerEvent::MaterialAdded {
        material: material.clone(),
    });
    (material, emit)
}

/// Re-sequences the material list per the submitted id ordering.
///
/// The submission must be a permutation of the room's material ids; an id
/// list that drops or invents materials is rejected before any change, so
/// applying the same ordering twice is a no-op.
pub fn reorder_materials(room: &mut Room, material_ids: &[u64]) -> Result<Emit> {
    if material_ids.len() != room.materials.len() {
        return Err(CommandError::BadReorder);
    }
    let mut seen = HashSet::new();
    for id in material_ids {
        if !seen.insert(*id) || room.material_index(*id).is_none() {
            return Err(CommandError::BadReorder);
        }
    }

    let mut reordered = Vec::with_capacity(material_ids.len());
    for id in material_ids {
        if let Some(index) = room.material_index(*id) {
            let mut material = room.materials.remove(index);
            material.order = reordered.len();
            reordered.push(material);
        }
    }
    room.materials = reordered;

    Ok(Emit::room(ServerEvent::MaterialsReordered {
        materials: room.materials.clone(),
    }))
}

/// Removes a material by id and returns it so the gateway can release any
/// backing blob.
///
/// If the deleted material was the one being shown, the pointer advances
/// server-side: the material now at the same index, else the previous one,
/// else nothing. Late joiners then see a consistent pointer instead of a
/// client-side patch.
pub fn delete_material(
    room: &mut Room,
    material_id: u64,
) -> Result<(Material, Vec<Emit>)> {
    let index = room
        .material_index(material_id)
        .ok_or(CommandError::MaterialNotFound(material_id))?;
    let was_shown = room.current_material == Some(material_id);
    let material = room.materials.remove(index);

    let mut emits = vec![Emit::room(ServerEvent::MaterialDeleted { material_id })];
    if was_shown {
        let next = room
            .materials
            .get(index)
            .or_else(|| index.checked_sub(1).and_then(|i| room.materials.get(i)))
            .cloned();
        room.current_material = next.as_ref().map(|m| m.id);
        emits.push(Emit::room(ServerEvent::MaterialShown {
            index: room.current_index(),
            material: next,
        }));
    }
    Ok((material, emits))
}

/// Puts a material on every student's viewer.
pub fn show_material(room: &mut Room, material_id: u64) -> Result<Emit> {
    let index = room
        .material_index(material_id)
        .ok_or(CommandError::MaterialNotFound(material_id))?;
    room.current_material = Some(material_id);
    Ok(Emit::room(ServerEvent::MaterialShown {
        material: Some(room.materials[index].clone()),
        index: Some(index),
    }))
}

/// Removes a departing connection from the room roster and tells the rest
/// of the room. Messages and materials persist regardless of author.
pub fn leave(room: &mut Room, connection_id: u64, name: &str, role: Role) -> Emit {
    if role == Role::Student {
        room.students.retain(|s| s.connection_id != connection_id);
    }
    Emit::except(
        connection_id,
        ServerEvent::UserLeft {
            name: name.to_string(),
            role,
        },
    )
}
