//! Inbound client commands.
//!
//! One tagged union covers every command a client may issue, so transports
//! validate shape before anything touches room state. The wire envelope is
//! `{"type": "...", "data": {...}}` with camelCase names, matching what the
//! browser clients send.


use crate::room::{MaterialSpec, Position};
use crate::session::Role;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientCommand {
    /// Create a room and bind the connection as its teacher.
    CreateRoom { name: String, teacher_name: String },
    /// Join an existing room by code.
    JoinRoom {
        room_code: String,
        name: String,
        role: Role,
    },
    /// Flip the room between open and closed (teacher only).
    ToggleRoomOpen,
    /// Post a sticky-note message onto the canvas.
    SendMessage {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<Position>,
    },
    /// Move a message to a new canvas position (teacher only).
    MoveMessage { message_id: u64, position: Position },
    /// Hide a message from students or reveal it again (teacher only).
    ToggleMessageVisibility { message_id: u64, hidden: bool },
    /// Remove a message from the room (teacher only).
    DeleteMessage { message_id: u64 },
    /// Attach a material, e.g. a YouTube link (teacher only). File uploads
    /// arrive through the HTTP side channel instead.
    AddMaterial { material: MaterialSpec },
    /// Re-sequence the material list; the ids must be a permutation of the
    /// room's materials (teacher only).
    ReorderMaterials { material_ids: Vec<u64> },
    /// Remove a material and release its backing blob (teacher only).
    DeleteMaterial { material_id: u64 },
    /// Put a material on every student's viewer (teacher only).
    ShowMaterial { material_id: u64 },
}
