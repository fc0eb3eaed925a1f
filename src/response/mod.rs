//! Outbound events and their delivery scopes.
//!
//! The engine describes what to deliver as a list of [`Emit`]s; the
//! transport mechanics of actually reaching sockets live in the
//! broadcaster. Events use the same `{"type", "data"}` envelope as inbound
//! commands.


use crate::room::{Material, Message, Participant, Position, RoomInfo};
use crate::session::Role;
use serde::{Deserialize, Serialize};

/// Which subset of a room's connections receives an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Every connection in the room, sender included.
    Room,
    /// Everyone but the given connection; used where the sender already
    /// applied the change locally, like drag moves.
    RoomExceptSender(u64),
    /// Only connections bound to the room with the teacher role.
    Teachers,
}

/// One event plus where to deliver it.
#[derive(Debug, Clone, PartialEq)]
pub struct Emit {
    pub scope: Scope,
    pub event: ServerEvent,
}

impl Emit {
    pub fn room(event: ServerEvent) -> Self {
        Emit {
            scope: Scope::Room,
            event,
        }
    }

    pub fn except(sender: u64, event: ServerEvent) -> Self {
        Emit {
            scope: Scope::RoomExceptSender(sender),
            event,
        }
    }

    pub fn teachers(event: ServerEvent) -> Self {
        Emit {
            scope: Scope::Teachers,
            event,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Reply to the creator only.
    RoomCreated {
        room: RoomInfo,
        participant: Participant,
    },
    /// Reply to the joiner only; carries the full room snapshot on success
    /// and a human-readable reason on failure.
    JoinResult {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room: Option<RoomInfo>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        participant: Option<Participant>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        messages: Option<Vec<Message>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        materials: Option<Vec<Material>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_material: Option<Material>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_material_index: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    UserJoined {
        name: String,
        role: Role,
    },
    UserLeft {
        name: String,
        role: Role,
    },
    RoomStatusChanged {
        is_open: bool,
    },
    NewMessage {
        message: Message,
    },
    MessagePositionUpdated {
        message_id: u64,
        position: Position,
    },
    /// When a message becomes visible again the full message rides along,
    /// because students that joined while it was hidden never received it.
    MessageVisibilityChanged {
        message_id: u64,
        hidden: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<Message>,
    },
    MessageDeleted {
        message_id: u64,
    },
    MaterialAdded {
        material: Material,
    },
    MaterialsReordered {
        materials: Vec<Material>,
    },
    MaterialDeleted {
        material_id: u64,
    },
    /// `material: None` means nothing is shown anymore.
    MaterialShown {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        material: Option<Material>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<usize>,
    },
    /// Sent to the issuing connection only; never broadcast.
    Error {
        message: String,
    },
}
