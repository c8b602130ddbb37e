// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Argument structs for commands with many options.

use clap::Args;

use super::non_empty_string;

#[derive(Args, Clone, Debug, Default)]
pub struct SendArgs {
    /// Text to capture
    #[arg(value_parser = non_empty_string)]
    pub content: String,

    /// Where the event came from
    #[arg(long, short, default_value = "cli")]
    pub source: String,

    /// Add tag(s) to the event (comma-separated or repeated)
    #[arg(long = "tag", short, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Metadata entry as key=value (repeatable); JSON values are parsed
    #[arg(long = "meta", short, value_name = "KEY=VALUE")]
    pub meta: Vec<String>,

    /// Queue the event without attempting delivery
    #[arg(long)]
    pub offline: bool,
}
