// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for cairn-core operations.

use thiserror::Error;

/// All possible errors that can occur in cairn-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("context content must not be empty\n  hint: provide the note, snippet or page text to capture")]
    EmptyContent,

    #[error("invalid metadata entry '{0}'\n  hint: metadata entries use the form key=value")]
    InvalidMetadata(String),
}

/// A specialized Result type for cairn-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
