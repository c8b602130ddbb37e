// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Command implementations. Each writes its output to the given writer.

pub mod queue;
pub mod read;
pub mod send;
pub mod watch;

#[cfg(test)]
mod test_helpers;

use std::io::Write;

use cairn_sync::SyncClient;
use tracing::warn;

use crate::cli::Command;
use crate::error::Result;

/// Run one command against `client`.
pub async fn execute<W: Write>(command: Command, client: &SyncClient, out: &mut W) -> Result<()> {
    match command {
        Command::Send(args) => send::run(client, args, out).await,
        Command::Queue(cmd) => queue::run(client, cmd, out).await,
        Command::Recent { limit } => read::recent(client, limit, out).await,
        Command::Search { query } => read::search(client, &query, out).await,
        Command::Watch => watch::run(client, out, ctrl_c()).await,
        Command::Completion { shell } => crate::write_completion(shell, out),
    }
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for ctrl-c, stop with a signal instead");
        std::future::pending::<()>().await;
    }
}
