//! Real-time classroom board server.
//!
//! A teacher creates a room, students join it with a short code, and the
//! teacher posts positionable sticky-note messages and teaching materials
//! that are mirrored live to every connected client.
//!
//! The crate is organized around five components:
//! - [`registry`]: the in-memory room store and code generator,
//! - [`session`]: the connection → (name, role, room) directory,
//! - [`engine`]: validate-then-commit state transitions over a [`room::Room`],
//! - [`broadcaster`]: per-room topics with scoped fan-out,
//! - [`gateway`]: the per-connection command loop tying the above together,
//!   with websocket, axum and in-process MPSC transports.

pub mod broadcaster;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod message;
pub mod registry;
pub mod response;
pub mod room;
pub mod session;
pub mod upload;
pub mod utils;
