use thiserror::Error;

/// Errors produced while validating or applying a client command.
///
/// Every variant is terminal for the single command that raised it: the
/// command mutates nothing, nothing is broadcast, and only the issuing
/// connection is told. Room code generation collisions are retried
/// internally and never appear here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("room {0} not found")]
    RoomNotFound(String),

    #[error("message {0} not found")]
    MessageNotFound(u64),

    #[error("material {0} not found")]
    MaterialNotFound(u64),

    /// The connection never authenticated via create or join.
    #[error("connection is not bound to a room")]
    NotBound,

    #[error("only the teacher may {0}")]
    TeacherOnly(&'static str),

    #[error("room is closed")]
    RoomClosed,

    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("material ids must be a permutation of the room's materials")]
    BadReorder,
}

/// Convenience alias used throughout the engine and gateway.
pub type Result<T, E = CommandError> = std::result::Result<T, E>;
