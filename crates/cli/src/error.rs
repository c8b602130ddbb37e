// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use cairn_sync::{ConfigError, SyncError};
use thiserror::Error;

/// Errors reported by the `cairn` command line.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Event(#[from] cairn_core::Error),

    #[error("realtime connection lost after {attempts} reconnect attempts\n  hint: check that the endpoint is reachable with 'cairn recent'")]
    RealtimeLost { attempts: u32 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for CLI operations.
pub type Result<T> = std::result::Result<T, Error>;
