//! WebSocket connection manager.
//!
//! Tracks active WebSocket connections and fans sync results out to them.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

use super::ServerMessage;
use crate::sync::{CallbackId, Synchronizer};

/// Sender for WebSocket messages.
pub type MessageSender = mpsc::UnboundedSender<ServerMessage>;

/// A single WebSocket connection.
#[derive(Debug)]
pub struct Connection {
    /// Unique identifier for this connection
    pub id: String,
    /// Label the client chose when connecting
    pub client: String,
    /// Channel to send messages to this connection
    pub sender: MessageSender,
}

/// Manages active WebSocket connections.
///
/// Thread-safe and can be shared across handlers via `Arc`.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    connections: DashMap<String, Connection>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Create a new connection manager wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a new connection. Returns the connection ID.
    pub fn register(&self, client: String, sender: MessageSender) -> String {
        let conn_id = uuid::Uuid::new_v4().to_string();

        self.connections.insert(
            conn_id.clone(),
            Connection {
                id: conn_id.clone(),
                client,
                sender,
            },
        );

        tracing::info!(conn_id = %conn_id, "WebSocket connection registered");

        conn_id
    }

    pub fn unregister(&self, conn_id: &str) {
        if let Some((_, conn)) = self.connections.remove(conn_id) {
            tracing::info!(
                conn_id = %conn_id,
                client = %conn.client,
                "WebSocket connection unregistered"
            );
        }
    }

    /// Broadcast a message to all connections.
    ///
    /// Returns the number of connections that received the message.
    pub fn broadcast_all(&self, message: ServerMessage) -> usize {
        let mut sent_count = 0;

        for entry in self.connections.iter() {
            if entry.value().sender.send(message.clone()).is_ok() {
                sent_count += 1;
            }
        }

        tracing::debug!(recipients = sent_count, "Broadcast message to connections");

        sent_count
    }

    /// Send a message to a specific connection.
    pub fn send_to(&self, conn_id: &str, message: ServerMessage) -> bool {
        match self.connections.get(conn_id) {
            Some(conn) => conn.sender.send(message).is_ok(),
            None => false,
        }
    }

    /// Get the number of active connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Push every sync pass result to all connections.
    pub fn forward_sync_results(self: &Arc<Self>, sync: &Synchronizer) -> CallbackId {
        let manager = Arc::clone(self);
        sync.on_sync_complete(move |result| {
            manager.broadcast_all(ServerMessage::sync_complete(result));
        })
    }
}
