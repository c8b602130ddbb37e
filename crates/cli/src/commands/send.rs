// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;

use cairn_core::{event::parse_metadata_entry, ContextEvent};
use cairn_sync::SyncClient;

use crate::cli::SendArgs;
use crate::error::Result;

/// Build the event described by `args`.
pub fn build_event(args: &SendArgs) -> Result<ContextEvent> {
    let mut event = ContextEvent::new(args.content.as_str(), args.source.as_str())?
        .with_tags(args.tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()));
    for entry in &args.meta {
        let (key, value) = parse_metadata_entry(entry)?;
        event = event.with_metadata(key, value);
    }
    Ok(event)
}

/// Prints `delivered` or `queued`.
pub async fn run<W: Write>(client: &SyncClient, args: SendArgs, out: &mut W) -> Result<()> {
    let event = build_event(&args)?;
    if args.offline {
        client.set_online(false).await;
    }
    let status = client.send_context(event).await;
    writeln!(out, "{status}")?;
    Ok(())
}

#[cfg(test)]
#[path = "send_tests.rs"]
mod tests;
