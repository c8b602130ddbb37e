// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

mod args;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use crate::help;

pub use args::SendArgs;

/// Parse a string that must not be empty or whitespace-only.
fn non_empty_string(s: &str) -> Result<String, String> {
    if s.trim().is_empty() {
        Err("cannot be empty".to_string())
    } else {
        Ok(s.to_string())
    }
}

#[derive(Parser, Debug)]
#[command(name = "cairn")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Capture context into your memory store, online or offline")]
#[command(
    long_about = "Capture context into your memory store, online or offline.\n\n\
    Events that cannot be delivered are kept in a local queue and retried when the store is reachable again."
)]
#[command(after_help = help::quickstart())]
#[command(styles = help::styles())]
pub struct Cli {
    /// Config file (default: ~/.config/cairn/config.toml)
    #[arg(long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send a context event, queueing it if the store is unreachable
    #[command(after_help = help::examples("\
Examples:
  cairn send \"Read later: tokio docs\"          Capture a note
  cairn send \"fn main() {}\" -s vscode -t rust  Capture a snippet with a tag
  cairn send \"Standup\" -m project=cairn         Attach metadata
  cairn send \"Offline note\" --offline           Queue without trying the network"))]
    Send(SendArgs),

    /// Inspect or drain the offline queue
    #[command(subcommand)]
    Queue(QueueCommand),

    /// Show the most recent memories
    Recent {
        /// Maximum number of memories
        #[arg(long, short, default_value_t = 10)]
        limit: usize,
    },

    /// Search memories
    Search {
        #[arg(value_parser = non_empty_string)]
        query: String,
    },

    /// Print realtime events until interrupted
    Watch,

    /// Generate shell completions
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueCommand {
    /// Show how many events are waiting
    Status,
    /// List queued events, oldest first
    List,
    /// Attempt delivery of every queued event once
    Drain,
    /// Discard every queued event
    Clear,
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
