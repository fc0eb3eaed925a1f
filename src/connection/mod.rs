//! Transport seams: how the gateway talks to a connection without knowing
//! whether it is a websocket, an axum upgrade or an in-process channel.

use crate::message::ClientCommand;
use crate::response::ServerEvent;
use async_trait::async_trait;

/// Outbound half of a connection.
#[async_trait]
pub trait SinkAdapter: Send + Sync {
    async fn send(
        &mut self,
        event: ServerEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Inbound half of a connection. An error ends the connection's command
/// loop and triggers disconnect cleanup.
#[async_trait]
pub trait StreamAdapter: Send {
    async fn next(&mut self) -> Result<ClientCommand, Box<dyn std::error::Error + Send + Sync>>;
}
