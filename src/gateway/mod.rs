//! The transport/session gateway: the only caller of the room state engine.
//!
//! One instance serves every connection. Per connection it runs a command
//! loop over a [`StreamAdapter`], authorizes each command against the
//! session directory, applies the engine transition under a single state
//! lock, and only then fans the resulting events out — so broadcast always
//! observes committed state and no two mutations interleave.

pub mod axum;
pub mod mpsc;
pub mod ws;

use crate::broadcaster::{Broadcaster, Recipients};
use crate::connection::{SinkAdapter, StreamAdapter};
use crate::engine;
use crate::error::{CommandError, Result};
use crate::message::ClientCommand;
use crate::registry::RoomRegistry;
use crate::response::{Emit, Scope, ServerEvent};
use crate::room::{Material, MaterialKind, MaterialSpec, Position, Room};
use crate::session::{Role, SessionDirectory};
use crate::upload::BlobStore;
use crate::utils;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Failure of the HTTP upload side channel.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("blob store failure: {0}")]
    Storage(#[from] std::io::Error),
}

/// Registry and session directory, mutated together under one lock.
///
/// A single async mutex is the chosen serialization for the "one logical
/// writer" model: commands on any room are applied one at a time, which is
/// more than the per-room atomicity contract requires and trivially
/// race-free for code generation.
struct CoreState {
    registry: RoomRegistry,
    sessions: SessionDirectory,
}

pub struct Gateway<S: SinkAdapter> {
    state: Mutex<CoreState>,
    broadcaster: Broadcaster<S>,
    blobs: Arc<dyn BlobStore>,
    /// When set, student-authored messages deliver teacher-only.
    moderated_intake: bool,
}

impl<S: SinkAdapter> Gateway<S> {
    pub fn new(blobs: Arc<dyn BlobStore>, moderated_intake: bool) -> Self {
        Gateway {
            state: Mutex::new(CoreState {
                registry: RoomRegistry::new(),
                sessions: SessionDirectory::new(),
            }),
            broadcaster: Broadcaster::new(),
            blobs,
            moderated_intake,
        }
    }

    /// Runs a connection to completion: register the sink, process commands
    /// until the stream ends, then tear the session down.
    pub async fn handle_stream<St: StreamAdapter>(&self, stream: &mut St, sink: S) {
        let connection_id = utils::fresh_id();
        self.broadcaster.register(connection_id, sink).await;
        tracing::debug!(connection_id, "connection opened");

        loop {
            match stream.next().await {
                Ok(command) => self.handle_command(connection_id, command).await,
                Err(e) => {
                    tracing::debug!(connection_id, error = %e, "stream ended");
                    break;
                }
            }
        }

        self.disconnect(connection_id).await;
    }

    /// Applies one command. A rejected command mutates nothing, broadcasts
    /// nothing, and answers the issuing connection with an `Error` event
    /// (join failures answer with a failed `JoinResult` instead).
    pub async fn handle_command(&self, connection_id: u64, command: ClientCommand) {
        let result = match command {
            ClientCommand::CreateRoom { name, teacher_name } => {
                self.create_room(connection_id, &name, &teacher_name).await
            }
            ClientCommand::JoinRoom {
                room_code,
                name,
                role,
            } => self.join_room(connection_id, &room_code, &name, role).await,
            ClientCommand::ToggleRoomOpen => {
                self.teacher_command(connection_id, "open or close the room", |room, _| {
                    Ok(vec![engine::toggle_open(room)])
                })
                .await
            }
            ClientCommand::SendMessage { text, position } => {
                self.send_message(connection_id, &text, position).await
            }
            ClientCommand::MoveMessage {
                message_id,
                position,
            } => {
                self.teacher_command(connection_id, "move messages", move |room, sender| {
                    engine::move_message(room, sender, message_id, position).map(|e| vec![e])
                })
                .await
            }
            ClientCommand::ToggleMessageVisibility { message_id, hidden } => {
                self.teacher_command(connection_id, "hide messages", move |room, _| {
                    engine::set_message_hidden(room, message_id, hidden).map(|e| vec![e])
                })
                .await
            }
            ClientCommand::DeleteMessage { message_id } => {
                self.teacher_command(connection_id, "delete messages", move |room, _| {
                    engine::delete_message(room, message_id).map(|e| vec![e])
                })
                .await
            }
            ClientCommand::AddMaterial { material } => {
                self.teacher_command(connection_id, "add materials", move |room, _| {
                    Ok(vec![engine::add_material(room, material).1])
                })
                .await
            }
            ClientCommand::ReorderMaterials { material_ids } => {
                self.teacher_command(connection_id, "reorder materials", move |room, _| {
                    engine::reorder_materials(room, &material_ids).map(|e| vec![e])
                })
                .await
            }
            ClientCommand::DeleteMaterial { material_id } => {
                self.delete_material(connection_id, material_id).await
            }
            ClientCommand::ShowMaterial { material_id } => {
                self.teacher_command(connection_id, "show materials", move |room, _| {
                    engine::show_material(room, material_id).map(|e| vec![e])
                })
                .await
            }
        };

        if let Err(e) = result {
            tracing::debug!(connection_id, error = %e, "command rejected");
            self.broadcaster
                .send_to(
                    connection_id,
                    &ServerEvent::Error {
                        message: e.to_string(),
                    },
                )
                .await;
        }
    }

    async fn create_room(
        &self,
        connection_id: u64,
        name: &str,
        teacher_name: &str,
    ) -> Result<()> {
        if name.trim().is_empty() {
            return Err(CommandError::EmptyField("name"));
        }
        if teacher_name.trim().is_empty() {
            return Err(CommandError::EmptyField("teacherName"));
        }

        // Creating while bound to a room is a switch: leave the old room
        // before taking the teacher seat in the new one.
        self.detach(connection_id).await;

        let (code, reply) = {
            let mut state = self.state.lock().await;
            let state = &mut *state;
            let room = state.registry.create_room(name.trim(), teacher_name.trim());
            let code = room.code.clone();
            let participant = crate::room::Participant {
                connection_id,
                name: teacher_name.trim().to_string(),
                role: Role::Teacher,
                room_code: code.clone(),
            };
            let reply = ServerEvent::RoomCreated {
                room: room.summary(),
                participant,
            };
            state.sessions.bind(
                connection_id,
                teacher_name.trim().to_string(),
                Role::Teacher,
                code.clone(),
            );
            (code, reply)
        };

        self.broadcaster.subscribe(&code, connection_id).await;
        self.broadcaster.send_to(connection_id, &reply).await;
        Ok(())
    }

    async fn join_room(
        &self,
        connection_id: u64,
        room_code: &str,
        name: &str,
        role: Role,
    ) -> Result<()> {
        let code = RoomRegistry::normalize(room_code);

        // Joining while bound is a switch: the old room sees the departure
        // first, even if the new join is then refused.
        self.detach(connection_id).await;

        let joined = {
            let mut state = self.state.lock().await;
            let state = &mut *state;
            let attempt = match state.registry.get_mut(&code) {
                None => Err(CommandError::RoomNotFound(code.clone())),
                Some(room) => engine::join(room, connection_id, name, role),
            };
            if let Ok(outcome) = &attempt {
                state.sessions.bind(
                    connection_id,
                    outcome.participant.name.clone(),
                    role,
                    code.clone(),
                );
            }
            attempt
        };

        match joined {
            Ok(outcome) => {
                self.broadcaster.subscribe(&code, connection_id).await;
                self.broadcaster
                    .send_to(connection_id, &outcome.snapshot)
                    .await;
                self.deliver(&code, &[], vec![outcome.announce]).await;
            }
            Err(e) => {
                // Join never partially succeeds and never emits a generic
                // error; the joiner gets a failed result with the reason.
                tracing::debug!(connection_id, code = %code, reason = %e, "join refused");
                self.broadcaster
                    .send_to(
                        connection_id,
                        &ServerEvent::JoinResult {
                            success: false,
                            room: None,
                            participant: None,
                            messages: None,
                            materials: None,
                            current_material: None,
                            current_material_index: None,
                            reason: Some(e.to_string()),
                        },
                    )
                    .await;
            }
        }
        Ok(())
    }

    async fn send_message(
        &self,
        connection_id: u64,
        text: &str,
        position: Option<Position>,
    ) -> Result<()> {
        let (room_code, teachers, emit) = {
            let mut state = self.state.lock().await;
            let state = &mut *state;
            let binding = state
                .sessions
                .lookup(connection_id)
                .cloned()
                .ok_or(CommandError::NotBound)?;
            let room = state
                .registry
                .get_mut(&binding.room_code)
                .ok_or_else(|| CommandError::RoomNotFound(binding.room_code.clone()))?;
            let sender = crate::room::Participant {
                connection_id,
                name: binding.name.clone(),
                role: binding.role,
                room_code: binding.room_code.clone(),
            };
            let emit =
                engine::send_message(room, &sender, text, position, self.moderated_intake)?;
            let teachers = state.sessions.teachers_in(&binding.room_code);
            (binding.room_code, teachers, emit)
        };

        self.deliver(&room_code, &teachers, vec![emit]).await;
        Ok(())
    }

    async fn delete_material(
        &self,
        connection_id: u64,
        material_id: u64,
    ) -> Result<()> {
        let (room_code, material, emits) = {
            let mut state = self.state.lock().await;
            let state = &mut *state;
            let (binding, room) =
                authorize_teacher(state, connection_id, "delete materials")?;
            let (material, emits) = engine::delete_material(room, material_id)?;
            (binding.room_code, material, emits)
        };

        self.deliver(&room_code, &[], emits).await;
        self.release_blob(&material).await;
        Ok(())
    }

    /// Stores an uploaded blob and attaches it to the room, broadcasting
    /// `MaterialAdded` exactly as the socket command would.
    pub async fn upload_material(
        &self,
        room_code: &str,
        original_name: &str,
        mimetype: &str,
        bytes: &[u8],
    ) -> Result<Material, UploadError> {
        let code = RoomRegistry::normalize(room_code);
        {
            // Room existence is checked before the blob is written so a
            // stale code cannot litter the store.
            let state = self.state.lock().await;
            if state.registry.get(&code).is_none() {
                return Err(CommandError::RoomNotFound(code).into());
            }
        }

        let blob = self.blobs.store(original_name, bytes).await?;
        let spec = MaterialSpec {
            kind: MaterialKind::from_mime(mimetype),
            url: blob.url,
            title: original_name.to_string(),
            video_id: None,
            thumbnail: None,
            path: Some(blob.path),
            size: Some(blob.size),
            mimetype: Some(mimetype.to_string()),
        };

        let (material, emit) = {
            let mut state = self.state.lock().await;
            let state = &mut *state;
            let room = state
                .registry
                .get_mut(&code)
                .ok_or_else(|| CommandError::RoomNotFound(code.clone()))?;
            engine::add_material(room, spec)
        };

        self.deliver(&code, &[], vec![emit]).await;
        Ok(material)
    }

    /// Tears down everything a departed connection held: session binding,
    /// room roster membership, topic subscription, sink.
    pub async fn disconnect(&self, connection_id: u64) {
        self.detach(connection_id).await;
        self.broadcaster.unregister(connection_id).await;
    }

    /// Unbinds the connection from whatever room it is in: roster removal,
    /// departure announcement, topic unsubscribe. No-op when unbound.
    /// Shared by disconnect and by room switches, so a connection is never
    /// a member of two rooms at once.
    async fn detach(&self, connection_id: u64) {
        let departed = {
            let mut state = self.state.lock().await;
            let state = &mut *state;
            state.sessions.unbind(connection_id).map(|binding| {
                let emit = state
                    .registry
                    .get_mut(&binding.room_code)
                    .map(|room| engine::leave(room, connection_id, &binding.name, binding.role));
                (binding, emit)
            })
        };

        if let Some((binding, emit)) = departed {
            tracing::info!(connection_id, code = %binding.room_code, name = %binding.name, "user left");
            self.broadcaster
                .unsubscribe(&binding.room_code, connection_id)
                .await;
            if let Some(emit) = emit {
                self.deliver(&binding.room_code, &[], vec![emit]).await;
            }
        }
    }

    /// Shared path for every command that requires a teacher binding:
    /// authorize, apply the transition under the lock, then publish.
    async fn teacher_command<F>(
        &self,
        connection_id: u64,
        verb: &'static str,
        apply: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut Room, u64) -> Result<Vec<Emit>>,
    {
        let (room_code, teachers, emits) = {
            let mut state = self.state.lock().await;
            let state = &mut *state;
            let (binding, room) = authorize_teacher(state, connection_id, verb)?;
            let emits = apply(room, connection_id)?;
            let teachers = state.sessions.teachers_in(&binding.room_code);
            (binding.room_code, teachers, emits)
        };

        self.deliver(&room_code, &teachers, emits).await;
        Ok(())
    }

    async fn deliver(&self, room_code: &str, teachers: &[u64], emits: Vec<Emit>) {
        for emit in emits {
            let recipients = match emit.scope {
                Scope::Room => Recipients::All,
                Scope::RoomExceptSender(sender) => Recipients::Except(sender),
                Scope::Teachers => Recipients::Only(teachers),
            };
            self.broadcaster
                .publish(room_code, recipients, &emit.event)
                .await;
        }
    }

    async fn release_blob(&self, material: &Material) {
        if let Some(path) = &material.path {
            if let Err(e) = self.blobs.remove(path).await {
                // The material is already gone from room state; a stale
                // blob is logged, not surfaced.
                tracing::warn!(path = %path, error = %e, "failed to release blob");
            }
        }
    }
}

/// Looks up the caller's binding and room, refusing non-teachers.
fn authorize_teacher<'a>(
    state: &'a mut CoreState,
    connection_id: u64,
    verb: &'static str,
) -> Result<(crate::session::Binding, &'a mut Room)> {
    let binding = state
        .sessions
        .lookup(connection_id)
        .cloned()
        .ok_or(CommandError::NotBound)?;
    if !binding.role.is_teacher() {
        return Err(CommandError::TeacherOnly(verb));
    }
    let room = state
        .registry
        .get_mut(&binding.room_code)
        .ok_or_else(|| CommandError::RoomNotFound(binding.room_code.clone()))?;
    Ok((binding, room))
}
