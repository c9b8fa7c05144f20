//! WebSocket message protocol definitions.
//!
//! All messages are JSON-encoded, tagged by `type` in snake_case. Payloads
//! reuse the camelCase sync result and status shapes of the HTTP API.

use serde::{Deserialize, Serialize};
use sitesync_engine::{SyncResult, SyncStatus};

/// Messages sent from client to agent.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ask for the current sync status.
    Status {
        /// Request ID for correlating responses
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Run a sync pass now.
    Sync {
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Keep-alive ping.
    Ping,
}

/// Messages sent from agent to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Pushed to every connection after each sync pass.
    SyncComplete { result: SyncResult },

    /// Response to a status request.
    Status {
        status: SyncStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },

    /// Response to a sync request.
    SyncResult {
        result: SyncResult,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },

    /// Response to ping.
    Pong,

    /// Error message.
    Error {
        /// Error description
        message: String,
        /// Request ID from the original request (if applicable)
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
}

impl ServerMessage {
    /// Create an error message.
    pub fn error(message: impl Into<String>, request_id: Option<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
            request_id,
        }
    }

    /// Create a sync_complete push notification.
    pub fn sync_complete(result: &SyncResult) -> Self {
        ServerMessage::SyncComplete {
            result: result.clone(),
        }
    }
}
