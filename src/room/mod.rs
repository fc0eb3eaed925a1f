//! The room model: the authoritative state every connected client mirrors.
//!
//! Messages keep strict append order (it is the default stacking order on
//! the canvas) and are never re-sorted; materials are explicitly
//! reorderable by the teacher. The currently shown material is tracked by
//! id so a reorder never silently changes what students are looking at.

use crate::session::Role;
use crate::utils;
use serde::{Deserialize, Serialize};

/// Canvas coordinates of a sticky note, in client pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A participant as seen by the room: one live connection plus identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub connection_id: u64,
    pub name: String,
    pub role: Role,
    pub room_code: String,
}

/// A sticky-note message on the shared canvas.
///
/// `position` is `None` until someone places it; receiving clients choose a
/// non-overlapping default in that case. Only `position` and `hidden` are
/// mutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: u64,
    pub sender: String,
    pub role: Role,
    pub text: String,
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    pub hidden: bool,
}

/// What kind of teaching content a material is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialKind {
    Image,
    Pdf,
    Powerpoint,
    Video,
    Youtube,
    /// Any other uploaded file.
    File,
}

impl MaterialKind {
    /// Classifies an uploaded file from its MIME type.
    pub fn from_mime(mime: &str) -> MaterialKind {
        let mime = mime.to_ascii_lowercase();
        if mime.starts_with("image/") {
            MaterialKind::Image
        } else if mime == "application/pdf" {
            MaterialKind::Pdf
        } else if mime.contains("powerpoint") || mime.contains("presentation") {
            MaterialKind::Powerpoint
        } else if mime.starts_with("video/") {
            MaterialKind::Video
        } else {
            MaterialKind::File
        }
    }
}

/// A piece of teaching content attached to a room.
///
/// `order` is explicit and survives deletions of earlier materials, so it
/// can diverge from the collection index; a reorder reassigns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub id: u64,
    pub kind: MaterialKind,
    pub url: String,
    pub title: String,
    pub order: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
}

/// Inbound description of a material to add; ids and ordering are assigned
/// server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialSpec {
    pub kind: MaterialKind,
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
}

/// Room header included in snapshots and creation replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub code: String,
    pub name: String,
    pub teacher_name: String,
    pub is_open: bool,
    pub created_at: u64,
    pub student_count: usize,
}

/// One teacher-led session: the unit of isolation for messages, materials
/// and participants.
#[derive(Debug, Clone)]
pub struct Room {
    pub code: String,
    pub name: String,
    pub teacher_name: String,
    /// Gates whether students may join or send messages. Starts closed.
    pub is_open: bool,
    pub created_at: u64,
    /// Insertion order = join order.
    pub students: Vec<Participant>,
    /// Strictly append order; deletions remove by id.
    pub messages: Vec<Message>,
    pub materials: Vec<Material>,
    /// Id of the material currently shown to students, if any.
    pub current_material: Option<u64>,
}

impl Room {
    pub fn new(code: String, name: String, teacher_name: String) -> Self {
        Room {
            code,
            name,
            teacher_name,
            is_open: false,
            created_at: utils::now_millis(),
            students: Vec::new(),
            messages: Vec::new(),
            materials: Vec::new(),
            current_material: None,
        }
    }

    pub fn summary(&self) -> RoomInfo {
        RoomInfo {
            code: self.code.clone(),
            name: self.name.clone(),
            teacher_name: self.teacher_name.clone(),
            is_open: self.is_open,
            created_at: self.created_at,
            student_count: self.students.len(),
        }
    }

    pub fn message(&self, id: u64) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn message_mut(&mut self, id: u64) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    pub fn material_index(&self, id: u64) -> Option<usize> {
        self.materials.iter().position(|m| m.id == id)
    }

    /// Collection index of the currently shown material, recomputed from
    /// its id so it stays correct across reorders and deletions.
    pub fn current_index(&self) -> Option<usize> {
        self.current_material.and_then(|id| self.material_index(id))
    }

    pub fn shown_material(&self) -> Option<&Material> {
        self.current_index().map(|i| &self.materials[i])
    }

    /// The message list a joiner of the given role receives: students never
    /// see hidden messages, teachers see everything.
    pub fn messages_for(&self, role: Role) -> Vec<Message> {
        match role {
            Role::Teacher => self.messages.clone(),
            Role::Student => self
                .messages
                .iter()
                .filter(|m| !m.hidden)
                .cloned()
                .collect(),
        }
    }
}
