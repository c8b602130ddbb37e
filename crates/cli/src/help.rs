// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Help text styling.
//!
//! Respects environment variables:
//! - `NO_COLOR=1`: Disables colors
//! - `COLOR=1`: Forces colors even without TTY

use std::io::IsTerminal;

use clap::builder::styling::Styles;

/// ANSI 256-color codes used in help output.
pub mod codes {
    /// Section headers
    pub const HEADER: u8 = 74;
    /// Commands and literals
    pub const LITERAL: u8 = 250;
    /// Descriptions of examples
    pub const CONTEXT: u8 = 245;
}

const RESET: &str = "\x1b[0m";

/// Check if colors should be enabled based on TTY and environment variables.
pub fn should_colorize() -> bool {
    colorize_with(
        std::env::var("NO_COLOR").ok().as_deref(),
        std::env::var("COLOR").ok().as_deref(),
        std::io::stdout().is_terminal(),
    )
}

fn colorize_with(no_color: Option<&str>, color: Option<&str>, is_tty: bool) -> bool {
    if no_color == Some("1") {
        return false;
    }
    if color == Some("1") {
        return true;
    }
    is_tty
}

fn paint(code: u8, text: &str) -> String {
    format!("\x1b[38;5;{code}m{text}{RESET}")
}

/// clap styles matching the example colors.
pub fn styles() -> Styles {
    if !should_colorize() {
        return Styles::plain();
    }

    use anstyle::{Ansi256Color, Color, Style};

    let color = |code: u8| Style::new().fg_color(Some(Color::Ansi256(Ansi256Color(code))));
    Styles::styled()
        .header(color(codes::HEADER))
        .usage(color(codes::HEADER))
        .literal(color(codes::LITERAL))
        .placeholder(color(codes::CONTEXT))
        .valid(color(codes::CONTEXT))
}

/// Colorize an examples block.
///
/// Lines ending in `:` are headers; other lines are split into a command
/// column and a description at the first run of two or more spaces.
pub fn examples(text: &str) -> String {
    if !should_colorize() {
        return text.to_string();
    }
    colorize_examples(text)
}

fn colorize_examples(text: &str) -> String {
    text.lines()
        .map(|line| {
            let trimmed = line.trim_start();
            let indent = &line[..line.len() - trimmed.len()];
            if trimmed.ends_with(':') && !trimmed.contains("  ") {
                return format!("{indent}{}", paint(codes::HEADER, trimmed));
            }
            match trimmed.find("  ") {
                Some(split) => {
                    let (cmd, desc) = trimmed.split_at(split);
                    let desc_start = desc.len() - desc.trim_start().len();
                    let (gap, desc) = desc.split_at(desc_start);
                    format!(
                        "{indent}{}{gap}{}",
                        paint(codes::LITERAL, cmd),
                        paint(codes::CONTEXT, desc)
                    )
                }
                None => line.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Shown after the top-level help.
pub fn quickstart() -> String {
    examples(
        "\
Get started:
  cairn send \"Idea: cache embeddings\"   Capture a note
  cairn queue status                    Count events waiting for delivery
  cairn queue drain                     Retry queued events now
  cairn watch                           Stream live updates",
    )
}

#[cfg(test)]
#[path = "help_tests.rs"]
mod tests;
