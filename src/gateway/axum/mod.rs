//! Axum transport: websocket upgrade plus the HTTP upload side channel.
//!
//! File upload is deliberately not part of the socket protocol; the client
//! posts multipart data to `/rooms/{code}/upload` and the server performs
//! the equivalent of an `AddMaterial` command, broadcasting `MaterialAdded`
//! to the room like any other mutation.

use crate::connection::{SinkAdapter, StreamAdapter};
use crate::error::CommandError;
use crate::gateway::{Gateway, UploadError};
use crate::message::ClientCommand;
use crate::response::ServerEvent;
use crate::room::Material;
use crate::upload::BlobStore;
use async_trait::async_trait;
use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use axum::extract::{Multipart, Path, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::io;

pub struct AxumWsSink {
    sink: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl SinkAdapter for AxumWsSink {
    async fn send(
        &mut self,
        event: ServerEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let message = Message::Text(Utf8Bytes::from(serde_json::to_string(&event)?));
        self.sink.send(message).await.map_err(|e| Box::new(e) as _)
    }
}

pub struct AxumWsStream {
    stream: SplitStream<WebSocket>,
}

#[async_trait]
impl StreamAdapter for AxumWsStream {
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
                _ => continue,
            }
        }
    }
}

/// Gateway wrapper that mounts onto an axum [`Router`].
pub struct AxumGateway {
    gateway: Arc<Gateway<AxumWsSink>>,
}

impl AxumGateway {
    pub fn new(blobs: Arc<dyn BlobStore>, moderated_intake: bool) -> Self {
        AxumGateway {
            gateway: Arc::new(Gateway::new(blobs, moderated_intake)),
        }
    }

    pub fn gateway(&self) -> Arc<Gateway<AxumWsSink>> {
        self.gateway.clone()
    }

    /// Adds the websocket route at `ws_path` and the upload route at
    /// `/rooms/{code}/upload` to the given router.
    pub fn attach_router(&self, ws_path: &str, router: Router) -> Router {
        let ws_gateway = self.gateway.clone();
        let upload_gateway = self.gateway.clone();
        router
            .route(
                ws_path,
                get(move |ws: WebSocketUpgrade| ws_handler(ws, ws_gateway)),
            )
            .route(
                "/rooms/{code}/upload",
                post(move |path: Path<String>, multipart: Multipart| {
                    upload_handler(upload_gateway, path, multipart)
                }),
            )
    }
}

async fn ws_handler(ws: WebSocketUpgrade, gateway: Arc<Gateway<AxumWsSink>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| async move {
        let (sink, stream) = socket.split();
        let mut stream = AxumWsStream { stream };
        gateway.handle_stream(&mut stream, AxumWsSink { sink }).await;
    })
}

async fn upload_handler(
    gateway: Arc<Gateway<AxumWsSink>>,
    Path(code): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Material>, (StatusCode, String)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let original_name = field.file_name().unwrap_or("upload").to_string();
        let mimetype = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

        let material = gateway
            .upload_material(&code, &original_name, &mimetype, &bytes)
            .await
            .map_err(|e| (upload_status(&e), e.to_string()))?;
        return Ok(Json(material));
    }
    Err((StatusCode::BAD_REQUEST, "missing file field".to_string()))
}

fn upload_status(error: &UploadError) -> StatusCode {
    match error {
        UploadError::Command(CommandError::RoomNotFound(_)) => StatusCode::NOT_FOUND,
        UploadError::Command(_) => StatusCode::BAD_REQUEST,
        UploadError::Storage(e) if e.kind() == io::ErrorKind::InvalidData => {
            StatusCode::PAYLOAD_TOO_LARGE
        }
        UploadError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
