// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Read-back commands. Results are printed as pretty JSON.

use std::io::Write;

use cairn_sync::SyncClient;
use serde_json::Value;

use crate::error::Result;

pub async fn recent<W: Write>(client: &SyncClient, limit: usize, out: &mut W) -> Result<()> {
    let value = client.recent(limit).await?;
    print_json(&value, out)
}

pub async fn search<W: Write>(client: &SyncClient, query: &str, out: &mut W) -> Result<()> {
    let value = client.search(query).await?;
    print_json(&value, out)
}

fn print_json<W: Write>(value: &Value, out: &mut W) -> Result<()> {
    writeln!(out, "{}", serde_json::to_string_pretty(value)?)?;
    Ok(())
}

#[cfg(test)]
#[path = "read_tests.rs"]
mod tests;
