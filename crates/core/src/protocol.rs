// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Realtime channel frames exchanged with the central store.
//!
//! The protocol is simple:
//! - Server pushes JSON frames `{"type": ..., "payload": ...}`
//! - Client sends a liveness probe `{"type": "ping"}` while connected
//!
//! Inbound frames are parsed in two steps: [`RawFrame`] accepts any
//! well-formed frame, then [`ServerFrame::from_raw`] maps the recognized
//! `type` values. Unknown types are not an error at this layer; the channel
//! logs and drops them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frame type for a data-update notification.
pub const MEMORY_UPDATE: &str = "memory_update";
/// Frame type for a server-initiated sync signal.
pub const SYNC: &str = "sync";
/// Frame type for the liveness response.
pub const PONG: &str = "pong";
/// Frame type for a server-reported error.
pub const ERROR: &str = "error";

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Liveness probe, sent on every heartbeat tick.
    Ping,
}

impl ClientFrame {
    /// Creates a Ping frame.
    pub fn ping() -> Self {
        ClientFrame::Ping
    }

    /// Serializes the frame to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Any syntactically valid inbound frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawFrame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl RawFrame {
    /// Deserializes a frame from JSON text.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Messages sent from server to client, by recognized `type`.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    /// A memory was created, updated or deleted on the server.
    MemoryUpdate(Value),
    /// The server asks clients to resynchronize.
    Sync(Value),
    /// Liveness response to a client Ping.
    Pong,
    /// Error reported by the server.
    Error {
        /// Human-readable error description.
        message: String,
    },
}

impl ServerFrame {
    /// Maps a raw frame onto a recognized variant.
    ///
    /// Returns `None` for unrecognized `type` values.
    pub fn from_raw(raw: RawFrame) -> Option<Self> {
        match raw.kind.as_str() {
            MEMORY_UPDATE => Some(ServerFrame::MemoryUpdate(raw.payload)),
            SYNC => Some(ServerFrame::Sync(raw.payload)),
            PONG => Some(ServerFrame::Pong),
            ERROR => Some(ServerFrame::Error {
                message: error_message(&raw.payload),
            }),
            _ => None,
        }
    }

    /// Serializes the frame to its wire form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let raw = match self {
            ServerFrame::MemoryUpdate(payload) => RawFrame {
                kind: MEMORY_UPDATE.to_string(),
                payload: payload.clone(),
            },
            ServerFrame::Sync(payload) => RawFrame {
                kind: SYNC.to_string(),
                payload: payload.clone(),
            },
            ServerFrame::Pong => RawFrame {
                kind: PONG.to_string(),
                payload: Value::Null,
            },
            ServerFrame::Error { message } => RawFrame {
                kind: ERROR.to_string(),
                payload: serde_json::json!({ "message": message }),
            },
        };
        serde_json::to_string(&raw)
    }
}

/// Servers send either `{"message": "..."}` or a bare string as payload.
fn error_message(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| payload.to_string()),
        Value::Null => "unknown server error".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
