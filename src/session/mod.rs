//! The session directory: which identity each live connection speaks as.
//!
//! A binding is created when a connection successfully creates or joins a
//! room and removed exactly once, on disconnect. Every mutating command is
//! authorized against it; a connection with no binding may not touch any
//! room state.


use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The two participant roles. There is no third.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
}

impl Role {
    pub fn is_teacher(self) -> bool {
        matches!(self, Role::Teacher)
    }
}

/// The identity a connection authenticated as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: String,
    pub role: Role,
    /// Normalized room code the connection belongs to.
    pub room_code: String,
}

/// Connection-id keyed map of [`Binding`]s.
#[derive(Debug, Default)]
pub struct SessionDirectory {
    bindings: HashMap<u64, Binding>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts the binding for a connection. Last write wins, which is what
    /// lets a reconnecting teacher rebind onto a fresh connection.
    pub fn bind(&mut self, connection_id: u64, name: String, role: Role, room_code: String) {
        self.bindings.insert(
            connection_id,
            Binding {
                name,
                role,
                room_code,
            },
        );
    }

    pub fn lookup(&self, connection_id: u64) -> Option<&Binding> {
        self.bindings.get(&connection_id)
    }

    /// Removes and returns the binding, if any. Called once per disconnect.
    pub fn unbind(&mut self, connection_id: u64) -> Option<Binding> {
        self.bindings.remove(&connection_id)
    }

    /// Connection ids of every teacher-role binding in the given room,
    /// the receiver set of the teacher-only delivery scope.
    pub fn teachers_in(&self, room_code: &str) -> Vec<u64> {
        self.bindings
            .iter()
            .filter(|(_, b)| b.role.is_teacher() && b.room_code == room_code)
            .map(|(id, _)| *id)
            .collect()
    }
}
