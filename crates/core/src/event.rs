// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Context events and their durable queue wrapper.
//!
//! A [`ContextEvent`] is a unit of captured user activity (a note, a file
//! save, a commit, a page visit). Its serialized form is exactly the body of
//! `POST /v1/memory`. A [`QueuedItem`] wraps an event that could not be
//! delivered yet, together with its delivery attempt counter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Error, Result};

/// A user-originated fact to be captured by the central store.
///
/// Fields are private so an event cannot change after it has been handed to
/// the sync client; use the `with_*` builders while constructing it.
/// Deserializing applies the same checks as [`ContextEvent::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EventFields")]
pub struct ContextEvent {
    content: String,
    source: String,
    tags: Vec<String>,
    metadata: Map<String, Value>,
}

#[derive(Deserialize)]
struct EventFields {
    content: String,
    source: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    metadata: Map<String, Value>,
}

impl TryFrom<EventFields> for ContextEvent {
    type Error = Error;

    fn try_from(fields: EventFields) -> Result<Self> {
        let event = ContextEvent::new(fields.content, fields.source)?;
        Ok(ContextEvent {
            tags: fields.tags,
            metadata: fields.metadata,
            ..event
        })
    }
}

impl ContextEvent {
    /// Creates an event with the given content and origin tag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyContent`] if `content` is empty or only whitespace.
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Result<Self> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(Error::EmptyContent);
        }
        Ok(ContextEvent {
            content,
            source: source.into(),
            tags: Vec::new(),
            metadata: Map::new(),
        })
    }

    /// Replaces the tag list.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Appends a single tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Sets one metadata entry, replacing any previous value for `key`.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Returns the first `max_chars` characters of the content on one line.
    pub fn preview(&self, max_chars: usize) -> String {
        let flat: String = self
            .content
            .chars()
            .map(|c| if c.is_whitespace() { ' ' } else { c })
            .collect();
        if flat.chars().count() <= max_chars {
            flat
        } else {
            let cut: String = flat.chars().take(max_chars.saturating_sub(3)).collect();
            format!("{cut}...")
        }
    }
}

/// Parses a `key=value` metadata entry.
///
/// The value is read as JSON when it parses (numbers, booleans, quoted
/// strings, arrays), and kept as a plain string otherwise.
pub fn parse_metadata_entry(entry: &str) -> Result<(String, Value)> {
    let (key, raw) = entry
        .split_once('=')
        .ok_or_else(|| Error::InvalidMetadata(entry.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(Error::InvalidMetadata(entry.to_string()));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

/// A context event waiting in the durable queue.
///
/// `id` is a UUID v7, so lexical order of ids follows enqueue order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedItem {
    pub id: String,
    pub event: ContextEvent,
    pub enqueued_at: DateTime<Utc>,
    pub attempts: u32,
}

impl QueuedItem {
    /// Wraps an event with a fresh id, the current time and zero attempts.
    pub fn new(event: ContextEvent) -> Self {
        QueuedItem {
            id: Uuid::now_v7().to_string(),
            event,
            enqueued_at: Utc::now(),
            attempts: 0,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
