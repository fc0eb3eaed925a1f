//! Raw websocket transport over `tokio-tungstenite`.

use crate::connection::{SinkAdapter, StreamAdapter};
use crate::gateway::Gateway;
use crate::message::ClientCommand;
use crate::response::ServerEvent;
use crate::upload::BlobStore;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::io;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, WebSocketStream};
use tungstenite::{Message, Utf8Bytes};

pub struct WsSink {
    sink: SplitSink<WebSocketStream<TcpStream>, Message>,
}

#[async_trait]
impl SinkAdapter for WsSink {
    async fn send(
        &mut self,
        event: ServerEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let message = Message::Text(Utf8Bytes::from(serde_json::to_string(&event)?));
        self.sink.send(message).await.map_err(|e| Box::new(e) as _)
    }
}

pub struct WsStream {
    stream: SplitStream<WebSocketStream<TcpStream>>,
}

#[async_trait]
impl StreamAdapter for WsStream {
    async fn next(&mut self) -> Result<ClientCommand, Box<dyn std::error::Error + Send + Sync>> {
        loop {
            let message = match self.stream.next().await {
                Some(message) => message?,
                None => {
                    return Err(Box::new(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        "connection closed",
                    )))
                }
            };
            match message {
                Message::Text(text) => return Ok(serde_json::from_slice(text.as_ref())?),
                Message::Close(_) => {
                    return Err(Box::new(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        "connection closed",
                    )))
                }
                // Control frames are not commands.
                _ => continue,
            }
        }
    }
}

/// Standalone websocket listener serving one [`Gateway`].
pub struct WebsocketServer {
    gateway: Arc<Gateway<WsSink>>,
    listener: Option<TcpListener>,
}

impl WebsocketServer {
    pub fn new(blobs: Arc<dyn BlobStore>, moderated_intake: bool) -> Self {
        WebsocketServer {
            gateway: Arc::new(Gateway::new(blobs, moderated_intake)),
            listener: None,
        }
    }

    pub fn gateway(&self) -> Arc<Gateway<WsSink>> {
        self.gateway.clone()
    }

    pub async fn bind_addr(&mut self, addr: &str) -> io::Result<()> {
        self.listener = Some(TcpListener::bind(addr).await?);
        Ok(())
    }

    pub fn bind_listener(&mut self, listener: TcpListener) {
        self.listener = Some(listener);
    }

    /// Accept loop; one task per connection.
    pub async fn listen(&mut self) -> io::Result<()> {
        let listener = self.listener.take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "no listener bound")
        })?;
        loop {
            let (stream, addr) = listener.accept().await?;
            tracing::debug!(peer = %addr, "accepted connection");
            tokio::spawn(Self::stream_worker(stream, self.gateway.clone()));
        }
    }

    async fn stream_worker(stream: TcpStream, gateway: Arc<Gateway<WsSink>>) {
        let websocket = match accept_async(stream).await {
            Ok(websocket) => websocket,
            Err(e) => {
                tracing::warn!(error = %e, "websocket handshake failed");
                return;
            }
        };
        let (sink, stream) = websocket.split();
        let mut stream = WsStream { stream };
        gateway.handle_stream(&mut stream, WsSink { sink }).await;
    }
}
