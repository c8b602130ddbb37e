// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable queue for context events that could not be delivered.
//!
//! The whole queue is kept in memory and rewritten to [`Storage`] as one
//! JSON array after every mutation. On startup the stored array is loaded
//! back; unreadable content is discarded with a warning rather than
//! blocking the agent.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use cairn_core::{ContextEvent, QueuedItem};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::storage::{Storage, StorageError};

/// Capacity before the oldest item is evicted.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 1000;
/// Failed drain passes before an item is dropped.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Storage key holding the serialized queue.
pub const QUEUE_STORAGE_KEY: &str = "cairn.offline_queue";

/// Error type for queue operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Storage could not be read.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    pub max_size: usize,
    pub max_attempts: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            max_size: DEFAULT_MAX_QUEUE_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Result of [`DurableQueue::add`].
#[derive(Debug, Clone, PartialEq)]
pub struct Enqueued {
    pub item_id: String,
    /// Oldest item, discarded because the queue was full.
    pub evicted: Option<QueuedItem>,
}

/// Where an event ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// Accepted by the store.
    Delivered,
    /// Waiting in the durable queue.
    Queued,
    /// Given up on after too many failed drain passes.
    Dropped,
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Queued => "queued",
            DeliveryStatus::Dropped => "dropped",
        };
        f.write_str(s)
    }
}

/// Outcome for one item of a drain pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub item_id: String,
    pub status: DeliveryStatus,
    /// Failed passes recorded for the item after this one.
    pub attempts: u32,
}

/// Summary of one [`DurableQueue::process`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Another pass was already running; nothing was attempted.
    pub skipped: bool,
    pub outcomes: Vec<ItemOutcome>,
}

impl DrainReport {
    fn skipped_pass() -> Self {
        DrainReport {
            skipped: true,
            outcomes: Vec::new(),
        }
    }

    fn count(&self, status: DeliveryStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn delivered(&self) -> usize {
        self.count(DeliveryStatus::Delivered)
    }

    pub fn retained(&self) -> usize {
        self.count(DeliveryStatus::Queued)
    }

    pub fn dropped(&self) -> usize {
        self.count(DeliveryStatus::Dropped)
    }
}

impl fmt::Display for DrainReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.skipped {
            return f.write_str("skipped (drain already in progress)");
        }
        write!(
            f,
            "{} delivered, {} retained, {} dropped",
            self.delivered(),
            self.retained(),
            self.dropped()
        )
    }
}

/// Resets the processing flag when a pass ends, including on cancellation.
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Bounded, persistent FIFO of undelivered context events.
pub struct DurableQueue {
    storage: Arc<dyn Storage>,
    config: QueueConfig,
    items: Mutex<VecDeque<QueuedItem>>,
    processing: AtomicBool,
}

impl DurableQueue {
    /// Loads the persisted queue from `storage`.
    ///
    /// # Errors
    ///
    /// Fails only if the storage itself cannot be read.
    pub fn open(storage: Arc<dyn Storage>, config: QueueConfig) -> QueueResult<Self> {
        let stored: Vec<Value> = match storage.load(QUEUE_STORAGE_KEY)? {
            Some(text) => match serde_json::from_str(&text) {
                Ok(values) => values,
                Err(e) => {
                    warn!(error = %e, "discarding unreadable offline queue");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        let loaded = stored.len();

        // One bad entry costs only itself.
        let mut items: VecDeque<QueuedItem> = stored
            .into_iter()
            .filter_map(|value| match serde_json::from_value(value) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!(error = %e, "dropping unreadable queued item");
                    None
                }
            })
            .collect();

        let exhausted = items.len();
        items.retain(|item| item.attempts < config.max_attempts);
        let exhausted = exhausted - items.len();
        if exhausted > 0 {
            warn!(count = exhausted, "dropping stored items past their attempt limit");
        }
        while items.len() > config.max_size {
            if let Some(old) = items.pop_front() {
                warn!(item_id = %old.id, max_size = config.max_size, "stored queue over capacity, evicted oldest item");
            }
        }
        if !items.is_empty() {
            info!(queue_len = items.len(), "restored offline queue");
        }

        let trimmed = items.len() != loaded;
        let queue = DurableQueue {
            storage,
            config,
            items: Mutex::new(items),
            processing: AtomicBool::new(false),
        };
        if trimmed {
            let items = queue.lock();
            queue.persist(&items);
        }
        Ok(queue)
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<QueuedItem>> {
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Writes the full queue to storage. The in-memory queue stays
    /// authoritative if this fails.
    fn persist(&self, items: &VecDeque<QueuedItem>) {
        let result = serde_json::to_string(items)
            .map_err(QueueError::from)
            .and_then(|json| {
                self.storage
                    .save(QUEUE_STORAGE_KEY, &json)
                    .map_err(QueueError::from)
            });
        if let Err(e) = result {
            error!(error = %e, queue_len = items.len(), "failed to persist offline queue");
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Appends an event, evicting the oldest item if the queue is full.
    pub fn add(&self, event: ContextEvent) -> Enqueued {
        let item = QueuedItem::new(event);
        let item_id = item.id.clone();

        let mut items = self.lock();
        items.push_back(item);
        let evicted = if items.len() > self.config.max_size {
            let old = items.pop_front();
            if let Some(old) = &old {
                warn!(
                    item_id = %old.id,
                    max_size = self.config.max_size,
                    "offline queue full, evicted oldest item"
                );
            }
            old
        } else {
            None
        };
        self.persist(&items);
        debug!(item_id = %item_id, queue_len = items.len(), "context queued");

        Enqueued { item_id, evicted }
    }

    /// Attempts delivery of every item present when the pass starts.
    ///
    /// Returns immediately with a skipped report if another pass is already
    /// running. Items added during the pass wait for the next one.
    pub async fn process<F, Fut, E>(&self, mut deliver: F) -> DrainReport
    where
        F: FnMut(ContextEvent) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: fmt::Display,
    {
        if self
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("drain already in progress");
            return DrainReport::skipped_pass();
        }
        let _guard = ProcessingGuard(&self.processing);

        let snapshot: Vec<QueuedItem> = self.lock().iter().cloned().collect();
        let mut report = DrainReport::default();
        if snapshot.is_empty() {
            return report;
        }
        debug!(queue_len = snapshot.len(), "draining offline queue");

        for item in snapshot {
            let result = deliver(item.event).await;

            let mut items = self.lock();
            let position = items.iter().position(|i| i.id == item.id);
            let outcome = match (result, position) {
                (Ok(()), position) => {
                    if let Some(pos) = position {
                        items.remove(pos);
                    }
                    debug!(item_id = %item.id, "queued context delivered");
                    ItemOutcome {
                        item_id: item.id,
                        status: DeliveryStatus::Delivered,
                        attempts: item.attempts,
                    }
                }
                (Err(e), Some(pos)) => {
                    let attempts = items[pos].attempts + 1;
                    if attempts >= self.config.max_attempts {
                        items.remove(pos);
                        warn!(
                            item_id = %item.id,
                            attempts,
                            error = %e,
                            "dropping queued context after repeated failures"
                        );
                        ItemOutcome {
                            item_id: item.id,
                            status: DeliveryStatus::Dropped,
                            attempts,
                        }
                    } else {
                        items[pos].attempts = attempts;
                        debug!(item_id = %item.id, attempts, error = %e, "queued context still undeliverable");
                        ItemOutcome {
                            item_id: item.id,
                            status: DeliveryStatus::Queued,
                            attempts,
                        }
                    }
                }
                // Evicted or cleared while the delivery was in flight.
                (Err(_), None) => continue,
            };
            self.persist(&items);
            report.outcomes.push(outcome);
        }

        info!(
            delivered = report.delivered(),
            retained = report.retained(),
            dropped = report.dropped(),
            "offline queue drained"
        );
        report
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot of the queued items, oldest first.
    pub fn items(&self) -> Vec<QueuedItem> {
        self.lock().iter().cloned().collect()
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    /// Removes every item. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut items = self.lock();
        let removed = items.len();
        items.clear();
        self.persist(&items);
        removed
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
