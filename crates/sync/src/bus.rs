// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Typed publish/subscribe bus.
//!
//! Handlers are registered per event kind and invoked synchronously, in
//! registration order, on the emitting task. A handler that panics is logged
//! and skipped; it never prevents later handlers from running and never
//! propagates into the emitter.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::error;

/// An event that can be routed by kind.
pub trait BusEvent {
    /// Discriminator handlers subscribe to.
    type Kind: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    fn kind(&self) -> Self::Kind;
}

/// Handle returned by [`EventBus::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Per-kind handler registry.
pub struct EventBus<E: BusEvent> {
    listeners: Mutex<HashMap<E::Kind, Vec<(ListenerId, Handler<E>)>>>,
    next_id: AtomicU64,
}

impl<E: BusEvent> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: BusEvent> EventBus<E> {
    pub fn new() -> Self {
        EventBus {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<E::Kind, Vec<(ListenerId, Handler<E>)>>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers `handler` for events of `kind`.
    pub fn on<F>(&self, kind: E::Kind, handler: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Removes a handler. Returns false if it was not registered for `kind`.
    pub fn off(&self, kind: E::Kind, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let Some(handlers) = listeners.get_mut(&kind) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            listeners.remove(&kind);
        }
        removed
    }

    /// Invokes every handler registered for the event's kind.
    ///
    /// Returns the number of handlers that completed without panicking.
    pub fn emit(&self, event: &E) -> usize {
        let kind = event.kind();
        // Snapshot so handlers may call on/off without deadlocking.
        let handlers: Vec<Handler<E>> = self
            .lock()
            .get(&kind)
            .map(|hs| hs.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        let mut completed = 0;
        for handler in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(()) => completed += 1,
                Err(payload) => {
                    error!(
                        kind = ?kind,
                        reason = %panic_message(payload.as_ref()),
                        "event handler panicked"
                    );
                }
            }
        }
        completed
    }

    /// Clears handlers for one kind, or for every kind when `kind` is `None`.
    pub fn remove_all_listeners(&self, kind: Option<E::Kind>) {
        let mut listeners = self.lock();
        match kind {
            Some(kind) => {
                listeners.remove(&kind);
            }
            None => listeners.clear(),
        }
    }

    pub fn listener_count(&self, kind: E::Kind) -> usize {
        self.lock().get(&kind).map_or(0, Vec::len)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
