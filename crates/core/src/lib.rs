// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! cairn-core: Shared data model for cairn capture agents
//!
//! This crate provides the context event types, the durable queue record,
//! and the realtime wire protocol used by `cairn-sync` and the `cairn` CLI.

pub mod error;
pub mod event;
pub mod protocol;

pub use error::{Error, Result};
pub use event::{ContextEvent, QueuedItem};
pub use protocol::{ClientFrame, RawFrame, ServerFrame};
