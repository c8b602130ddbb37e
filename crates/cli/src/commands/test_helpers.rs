// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for command tests.

#![allow(clippy::unwrap_used)]
#![allow(dead_code)]

use std::sync::Arc;

use cairn_sync::{MemoryStorage, SyncClient, SyncConfig};

/// Endpoint nothing listens on. Only used where no request is expected.
pub const UNREACHABLE: &str = "http://127.0.0.1:9";

/// Config with fast, single-attempt delivery against `endpoint`.
pub fn config(endpoint: &str) -> SyncConfig {
    let mut config = SyncConfig::default();
    config.api.endpoint = endpoint.to_string();
    config.api.api_key = "secret".to_string();
    config.retry.max_attempts = 1;
    config.retry.delay_ms = 1;
    config
}

/// HTTP-only client with an in-memory queue.
pub fn client(endpoint: &str) -> SyncClient {
    SyncClient::builder(config(endpoint))
        .storage(Arc::new(MemoryStorage::new()))
        .without_realtime()
        .build()
        .unwrap()
}

/// Output of a command run against `Vec<u8>`.
pub fn text(out: Vec<u8>) -> String {
    String::from_utf8(out).unwrap()
}
