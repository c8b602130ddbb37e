// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! cairn_cli - command-line capture agent.
//!
//! Thin shell around [`cairn_sync::SyncClient`]: loads [`SyncConfig`], sets
//! up logging and runs one command on a tokio runtime.
//!
//! ```rust,ignore
//! use clap::Parser;
//!
//! let cli = cairn_cli::Cli::parse();
//! cairn_cli::run(cli)?;
//! ```

mod cli;
pub mod commands;
pub mod error;
mod help;
pub mod logging;

pub use cli::{Cli, Command, QueueCommand, SendArgs};
pub use error::{Error, Result};

use std::io::Write;

use cairn_sync::{SyncClient, SyncConfig};
use clap::CommandFactory;
use clap_complete::{generate, Shell};

/// Execute a parsed command line. This is the entry point used by `main`.
pub fn run(cli: Cli) -> Result<()> {
    if let Command::Completion { shell } = cli.command {
        return write_completion(shell, &mut std::io::stdout());
    }

    let path = cli.config.unwrap_or_else(SyncConfig::default_path);
    let config = SyncConfig::load_from(&path)?;
    logging::init(&config.log.level);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let client = SyncClient::new(config)?;
        let mut out = std::io::stdout().lock();
        let result = commands::execute(cli.command, &client, &mut out).await;
        client.shutdown().await;
        result
    })
}

/// Write a completion script for `shell`.
pub fn write_completion<W: Write>(shell: Shell, out: &mut W) -> Result<()> {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "cairn", out);
    Ok(())
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
