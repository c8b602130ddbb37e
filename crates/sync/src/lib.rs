// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! cairn-sync: Resilient delivery of context events to a central store.
//!
//! ```text
//! ┌──────────────────────── SyncClient ────────────────────────┐
//! │                                                            │
//! │  send_context ──► RetryingTransport ──► MemoryApi (HTTP)    │
//! │        │                 │ exhausted                        │
//! │        │ offline         ▼                                  │
//! │        └──────────► DurableQueue ──► Storage (file/memory)  │
//! │                          ▲                                  │
//! │  set_online(true) ───────┘ process()                        │
//! │                                                            │
//! │  RealtimeChannel ──► Connector (WebSocket)                  │
//! │        │ frames, state changes                              │
//! │        ▼                                                    │
//! │     EventBus ──► on()/off() subscribers                     │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Delivery never fails from the caller's point of view: an event is either
//! delivered or queued for a later drain.

pub mod bus;
pub mod channel;
pub mod client;
pub mod config;
pub mod events;
pub mod http;
pub mod queue;
pub mod retry;
pub mod storage;
pub mod transport;

#[cfg(test)]
mod test_helpers;


pub use bus::{BusEvent, EventBus, ListenerId};
pub use channel::{ChannelConfig, ChannelError, ConnectionState, RealtimeChannel};
pub use client::{BatchOutcome, SyncClient, SyncClientBuilder, SyncError, SyncResult};
pub use config::{ConfigError, SyncConfig};
pub use events::{ChannelFault, SyncEvent, SyncEventKind};
pub use http::{ApiError, HttpApi, MemoryApi};
pub use queue::{DeliveryStatus, DrainReport, DurableQueue, Enqueued, ItemOutcome, QueueConfig};
pub use retry::{DeliveryError, RetryPolicy, RetryingTransport};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};
pub use transport::{Connection, Connector, TransportError, WebSocketConnector};
