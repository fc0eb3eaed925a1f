//! In-process transport over Tokio MPSC channels.
//!
//! Clients connect by exchanging `ClientCommand`s and `ServerEvent`s over
//! channel pairs, with no networking involved. This is the transport the
//! end-to-end tests run on, and it works for embedding the gateway inside
//! another process.


use crate::connection::{SinkAdapter, StreamAdapter};
use crate::gateway::Gateway;
use crate::message::ClientCommand;
use crate::response::ServerEvent;
use crate::upload::BlobStore;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::io;
use tokio::sync::mpsc::{self, Receiver, Sender};

#[derive(Clone)]
pub struct MpscSink {
    sender: Sender<ServerEvent>,
}

#[async_trait]
impl SinkAdapter for MpscSink {
    async fn send(
        &mut self,
        event: ServerEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.sender.send(event).await.map_err(|e| {
            Box::new(io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("failed to send event: {}", e),
            )) as _
        })
    }
}

pub struct MpscStream {
    receiver: Receiver<ClientCommand>,
}

#[async_trait]
impl StreamAdapter for MpscStream {
    async fn next(&mut self) -> Result<ClientCommand, Box<dyn std::error::Error + Send + Sync>> {
        self.receiver.recv().await.ok_or_else(|| {
            Box::new(io::Error::new(io::ErrorKind::BrokenPipe, "channel closed")) as _
        })
    }
}

pub struct MpscGateway {
    gateway: Arc<Gateway<MpscSink>>,
}

impl MpscGateway {
    pub fn new(blobs: Arc<dyn BlobStore>, moderated_intake: bool) -> Self {
        MpscGateway {
            gateway: Arc::new(Gateway::new(blobs, moderated_intake)),
        }
    }

    pub fn gateway(&self) -> Arc<Gateway<MpscSink>> {
        self.gateway.clone()
    }

    /// Connects a new in-process client. Dropping the returned command
    /// sender ends the connection and triggers disconnect cleanup, exactly
    /// like a socket closing.
    pub fn connect(&self, buffer_size: usize) -> (Sender<ClientCommand>, Receiver<ServerEvent>) {
        let (command_tx, command_rx) = mpsc::channel(buffer_size);
        let (event_tx, event_rx) = mpsc::channel(buffer_size);

        let gateway = self.gateway.clone();
        tokio::spawn(async move {
            let mut stream = MpscStream {
                receiver: command_rx,
            };
            let sink = MpscSink { sender: event_tx };
            gateway.handle_stream(&mut stream, sink).await;
        });

        (command_tx, event_rx)
    }
}
