//! The room registry: the single source of truth for room existence.
//!
//! Rooms are keyed by a short generated code. Once created they live for
//! the server process lifetime; an ephemeral classroom tool can afford to
//! abandon rooms rather than reap them.


use crate::room::Room;
use rand::Rng;
use std::collections::HashMap;

/// Code alphabet: uppercase alphanumeric with the look-alike glyphs
/// (0/O, 1/I) removed so codes survive being read off a projector.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 6;

#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical form of a room code: lookups are case-insensitive.
    pub fn normalize(code: &str) -> String {
        code.trim().to_ascii_uppercase()
    }

    fn generate_code(&self) -> String {
        let mut rng = rand::rng();
        loop {
            let code: String = (0..CODE_LEN)
                .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
                .collect();
            // Collision retry; never surfaced to the caller.
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }

    /// Creates a room with a unique code, closed and empty, and returns it.
    pub fn create_room(&mut self, name: &str, teacher_name: &str) -> &mut Room {
        let code = self.generate_code();
        let room = Room::new(code.clone(), name.to_string(), teacher_name.to_string());
        tracing::info!(code = %code, name = %name, teacher = %teacher_name, "room created");
        self.rooms.entry(code).or_insert(room)
    }

    pub fn get(&self, code: &str) -> Option<&Room> {
        self.rooms.get(&Self::normalize(code))
    }

    pub fn get_mut(&mut self, code: &str) -> Option<&mut Room> {
        self.rooms.get_mut(&Self::normalize(code))
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
