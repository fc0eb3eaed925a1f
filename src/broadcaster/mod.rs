//! The broadcast layer: per-room topics over registered sinks.
//!
//! Each room code is a topic; connections subscribe when they create or
//! join and unsubscribe on disconnect. Delivery is fire-and-forget and
//! at-most-once per connected receiver; a send failure is logged, never
//! retried, because a reconnecting client resynchronizes through a fresh
//! join, not a backlog replay. Sends never run under the connection map
//! lock and fan out concurrently, so a stalled receiver delays only its
//! own delivery.


use crate::connection::SinkAdapter;
use crate::response::ServerEvent;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Resolved receiver set for one publish. The gateway translates the
/// semantic [`crate::response::Scope`] into this before calling in, so the
/// broadcaster never needs to know about roles.
#[derive(Debug, Clone, Copy)]
pub enum Recipients<'a> {
    All,
    Except(u64),
    Only(&'a [u64]),
}

impl Recipients<'_> {
    fn includes(&self, connection_id: u64) -> bool {
        match self {
            Recipients::All => true,
            Recipients::Except(excluded) => connection_id != *excluded,
            Recipients::Only(ids) => ids.contains(&connection_id),
        }
    }
}

pub struct Broadcaster<S: SinkAdapter> {
    /// Each sink sits behind its own lock; the outer map lock is only ever
    /// held to look handles up, never across a send.
    sinks: Mutex<HashMap<u64, Arc<Mutex<S>>>>,
    topics: Mutex<HashMap<String, HashSet<u64>>>,
}

impl<S: SinkAdapter> Default for Broadcaster<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: SinkAdapter> Broadcaster<S> {
    pub fn new() -> Self {
        Broadcaster {
            sinks: Mutex::new(HashMap::new()),
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// Registers the outbound half of a new connection.
    pub async fn register(&self, connection_id: u64, sink: S) {
        self.sinks
            .lock()
            .await
            .insert(connection_id, Arc::new(Mutex::new(sink)));
    }

    /// Drops the sink; any topic membership must be removed separately via
    /// [`Broadcaster::unsubscribe`].
    pub async fn unregister(&self, connection_id: u64) {
        self.sinks.lock().await.remove(&connection_id);
    }

    pub async fn subscribe(&self, room_code: &str, connection_id: u64) {
        self.topics
            .lock()
            .await
            .entry(room_code.to_string())
            .or_default()
            .insert(connection_id);
    }

    pub async fn unsubscribe(&self, room_code: &str, connection_id: u64) {
        let mut topics = self.topics.lock().await;
        if let Some(members) = topics.get_mut(room_code) {
            members.remove(&connection_id);
            if members.is_empty() {
                topics.remove(room_code);
            }
        }
    }

    /// Sends an event to a single connection, typically a command reply or
    /// an error local to that caller.
    pub async fn send_to(&self, connection_id: u64, event: &ServerEvent) {
        let sink = self.sinks.lock().await.get(&connection_id).cloned();
        if let Some(sink) = sink {
            if let Err(e) = sink.lock().await.send(event.clone()).await {
                tracing::warn!(connection_id, error = %e, "direct send failed");
            }
        }
    }

    /// Fans an event out to the room topic, filtered by `recipients`.
    /// Deliveries run concurrently, each under its own sink lock.
    pub async fn publish(&self, room_code: &str, recipients: Recipients<'_>, event: &ServerEvent) {
        let members: Vec<u64> = {
            let topics = self.topics.lock().await;
            match topics.get(room_code) {
                Some(members) => members
                    .iter()
                    .copied()
                    .filter(|id| recipients.includes(*id))
                    .collect(),
                None => return,
            }
        };

        let handles: Vec<(u64, Arc<Mutex<S>>)> = {
            let sinks = self.sinks.lock().await;
            members
                .into_iter()
                .filter_map(|id| sinks.get(&id).map(|sink| (id, sink.clone())))
                .collect()
        };

        join_all(handles.into_iter().map(|(connection_id, sink)| async move {
            if let Err(e) = sink.lock().await.send(event.clone()).await {
                tracing::warn!(connection_id, room_code, error = %e, "broadcast send failed");
            }
        }))
        .await;
    }
}
