// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Events published on the sync client's bus.

use std::fmt;

use cairn_core::QueuedItem;
use serde_json::Value;

use crate::bus::BusEvent;
use crate::channel::ConnectionState;
use crate::queue::DrainReport;

/// Everything a subscriber can observe from the realtime channel and the
/// delivery pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// The realtime channel moved to a new state.
    StateChanged(ConnectionState),
    /// The realtime channel finished its handshake.
    Connected,
    /// The realtime channel was closed on request.
    Disconnected,
    /// Server pushed a `memory_update` frame.
    MemoryUpdate(Value),
    /// Server pushed a `sync` frame.
    SyncSignal(Value),
    /// Something went wrong on the realtime channel.
    Error(ChannelFault),
    /// An event reached the store; carries the server's response body.
    ContextDelivered(Value),
    /// An event was put in the durable queue.
    ContextQueued { item_id: String },
    /// The queue was full and the oldest item was discarded.
    QueueOverflow { evicted: QueuedItem },
    /// A drain pass finished.
    QueueDrained(DrainReport),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncEventKind {
    StateChanged,
    Connected,
    Disconnected,
    MemoryUpdate,
    SyncSignal,
    Error,
    ContextDelivered,
    ContextQueued,
    QueueOverflow,
    QueueDrained,
}

impl SyncEventKind {
    /// Kinds emitted by the realtime channel.
    pub const CHANNEL: [SyncEventKind; 6] = [
        SyncEventKind::StateChanged,
        SyncEventKind::Connected,
        SyncEventKind::Disconnected,
        SyncEventKind::MemoryUpdate,
        SyncEventKind::SyncSignal,
        SyncEventKind::Error,
    ];
}

impl BusEvent for SyncEvent {
    type Kind = SyncEventKind;

    fn kind(&self) -> SyncEventKind {
        match self {
            SyncEvent::StateChanged(_) => SyncEventKind::StateChanged,
            SyncEvent::Connected => SyncEventKind::Connected,
            SyncEvent::Disconnected => SyncEventKind::Disconnected,
            SyncEvent::MemoryUpdate(_) => SyncEventKind::MemoryUpdate,
            SyncEvent::SyncSignal(_) => SyncEventKind::SyncSignal,
            SyncEvent::Error(_) => SyncEventKind::Error,
            SyncEvent::ContextDelivered(_) => SyncEventKind::ContextDelivered,
            SyncEvent::ContextQueued { .. } => SyncEventKind::ContextQueued,
            SyncEvent::QueueOverflow { .. } => SyncEventKind::QueueOverflow,
            SyncEvent::QueueDrained(_) => SyncEventKind::QueueDrained,
        }
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncEvent::StateChanged(state) => write!(f, "state: {state}"),
            SyncEvent::Connected => write!(f, "connected"),
            SyncEvent::Disconnected => write!(f, "disconnected"),
            SyncEvent::MemoryUpdate(payload) => write!(f, "memory_update: {payload}"),
            SyncEvent::SyncSignal(payload) => write!(f, "sync: {payload}"),
            SyncEvent::Error(fault) => write!(f, "error: {fault}"),
            SyncEvent::ContextDelivered(_) => write!(f, "delivered"),
            SyncEvent::ContextQueued { item_id } => write!(f, "queued: {item_id}"),
            SyncEvent::QueueOverflow { evicted } => write!(f, "overflow: evicted {}", evicted.id),
            SyncEvent::QueueDrained(report) => write!(f, "drained: {report}"),
        }
    }
}

/// Failures reported through [`SyncEvent::Error`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelFault {
    /// Automatic reconnection gave up; call `connect()` to try again.
    #[error("realtime reconnection gave up after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("realtime transport error: {0}")]
    Transport(String),

    /// Error frame pushed by the server.
    #[error("server error: {0}")]
    Server(String),
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
