// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;

use cairn_core::QueuedItem;
use cairn_sync::SyncClient;

use crate::cli::QueueCommand;
use crate::error::Result;

const PREVIEW_CHARS: usize = 60;

pub async fn run<W: Write>(client: &SyncClient, cmd: QueueCommand, out: &mut W) -> Result<()> {
    match cmd {
        QueueCommand::Status => writeln!(out, "{} pending", client.pending_count())?,
        QueueCommand::List => {
            let items = client.queued_items();
            if items.is_empty() {
                writeln!(out, "queue is empty")?;
            }
            for item in &items {
                writeln!(out, "{}", format_item(item))?;
            }
        }
        QueueCommand::Drain => {
            let report = client.process_queue().await;
            writeln!(out, "{report}")?;
        }
        QueueCommand::Clear => writeln!(out, "cleared {} item(s)", client.clear_queue())?,
    }
    Ok(())
}

/// One line per queued item: id, enqueue time, attempts and a preview.
pub fn format_item(item: &QueuedItem) -> String {
    format!(
        "{}  {}  attempts={}  [{}] {}",
        item.id,
        item.enqueued_at.format("%Y-%m-%d %H:%M:%S"),
        item.attempts,
        item.event.source(),
        item.event.preview(PREVIEW_CHARS)
    )
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
