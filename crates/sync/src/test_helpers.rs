// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for sync module tests.

#![allow(clippy::unwrap_used)]
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cairn_core::ContextEvent;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::bus::EventBus;
use crate::events::{SyncEvent, SyncEventKind};
use crate::http::{ApiError, ApiFuture, MemoryApi};
use crate::transport::{
    Connection, Connector, FrameSink, FrameSource, TransportError, TransportFuture,
};

/// Create a test event with the given content.
pub fn event(content: &str) -> ContextEvent {
    ContextEvent::new(content, "test").unwrap()
}

/// Subscribe to every given kind and collect what is emitted.
pub fn record(bus: &EventBus<SyncEvent>, kinds: &[SyncEventKind]) -> Arc<Mutex<Vec<SyncEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    for kind in kinds {
        let seen = Arc::clone(&seen);
        bus.on(*kind, move |event: &SyncEvent| {
            seen.lock().unwrap().push(event.clone());
        });
    }
    seen
}

/// Scripted response for one call to [`MockApi`].
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Ok,
    Status(u16),
}

/// In-memory [`MemoryApi`] that records calls and replays scripted replies.
///
/// When the script is empty, calls succeed unless `fail_all` is set.
#[derive(Default)]
pub struct MockApi {
    script: Mutex<VecDeque<Reply>>,
    fail_all: AtomicBool,
    created: Mutex<Vec<ContextEvent>>,
    batches: Mutex<Vec<usize>>,
    calls: Mutex<Vec<Instant>>,
}

impl MockApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let api = Self::new();
        api.set_fail_all(true);
        api
    }

    pub fn script(&self, replies: impl IntoIterator<Item = Reply>) {
        self.script.lock().unwrap().extend(replies);
    }

    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Events accepted by `create_memory`.
    pub fn created(&self) -> Vec<String> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.content().to_string())
            .collect()
    }

    /// Sizes of accepted batches.
    pub fn batches(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }

    /// Number of calls of any kind.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }

    fn next_reply(&self) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(Instant::now());
        let reply = self.script.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Ok) => Ok(()),
            Some(Reply::Status(code)) => Err(ApiError::Server(code)),
            None if self.fail_all.load(Ordering::SeqCst) => Err(ApiError::Server(503)),
            None => Ok(()),
        }
    }
}

impl MemoryApi for MockApi {
    fn create_memory<'a>(&'a self, event: &'a ContextEvent) -> ApiFuture<'a, Value> {
        Box::pin(async move {
            self.next_reply()?;
            let mut created = self.created.lock().unwrap();
            created.push(event.clone());
            Ok(json!({ "id": format!("m{}", created.len()) }))
        })
    }

    fn create_batch<'a>(&'a self, events: &'a [ContextEvent]) -> ApiFuture<'a, Value> {
        Box::pin(async move {
            self.next_reply()?;
            self.batches.lock().unwrap().push(events.len());
            Ok(json!({ "created": events.len() }))
        })
    }

    fn list_recent(&self, limit: usize) -> ApiFuture<'_, Value> {
        Box::pin(async move {
            self.next_reply()?;
            let created = self.created.lock().unwrap();
            let recent: Vec<&str> = created.iter().rev().take(limit).map(|e| e.content()).collect();
            Ok(json!(recent))
        })
    }

    fn search<'a>(&'a self, query: &'a str) -> ApiFuture<'a, Value> {
        Box::pin(async move {
            self.next_reply()?;
            let created = self.created.lock().unwrap();
            let hits: Vec<&str> = created
                .iter()
                .map(|e| e.content())
                .filter(|c| c.contains(query))
                .collect();
            Ok(json!({ "results": hits }))
        })
    }
}

/// Server side of one mock connection.
pub struct MockPeer {
    inbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    outgoing: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl MockPeer {
    /// Push a frame to the client.
    pub fn push(&self, frame: &str) {
        if let Some(tx) = self.inbound.lock().unwrap().as_ref() {
            let _ = tx.send(frame.to_string());
        }
    }

    /// Close the connection from the server side.
    pub fn close(&self) {
        self.inbound.lock().unwrap().take();
    }

    /// Frames the client sent.
    pub fn sent(&self) -> Vec<String> {
        self.outgoing.lock().unwrap().clone()
    }

    /// Whether the client closed its side.
    pub fn client_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct MockSink {
    outgoing: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
    stalled: Arc<AtomicBool>,
}

impl FrameSink for MockSink {
    fn send(&mut self, text: String) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            if self.stalled.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            if self.closed.load(Ordering::SeqCst) {
                return Err(TransportError::ConnectionClosed);
            }
            self.outgoing.lock().unwrap().push(text);
            Ok(())
        })
    }

    fn close(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        })
    }
}

struct MockSource(mpsc::UnboundedReceiver<String>);

impl FrameSource for MockSource {
    fn recv(&mut self) -> TransportFuture<'_, Option<String>> {
        Box::pin(async move { Ok(self.0.recv().await) })
    }
}

/// [`Connector`] that hands out in-memory connections.
#[derive(Default)]
pub struct MockConnector {
    refuse: AtomicBool,
    refuse_next: AtomicU32,
    stall_sends: Arc<AtomicBool>,
    dial_delay: Mutex<Option<Duration>>,
    dials: Mutex<Vec<Instant>>,
    peers: Mutex<Vec<Arc<MockPeer>>>,
    urls: Mutex<Vec<String>>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Connector whose dials all fail.
    pub fn refusing() -> Arc<Self> {
        let connector = Self::new();
        connector.set_refuse(true);
        connector
    }

    pub fn set_refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Fail the next `n` dials, then accept.
    pub fn refuse_next(&self, n: u32) {
        self.refuse_next.store(n, Ordering::SeqCst);
    }

    /// Make every `send` on every connection hang, like a dead peer.
    pub fn stall_sends(&self, stall: bool) {
        self.stall_sends.store(stall, Ordering::SeqCst);
    }

    /// Take `delay` to answer each dial.
    pub fn set_dial_delay(&self, delay: Duration) {
        *self.dial_delay.lock().unwrap() = Some(delay);
    }

    pub fn dial_count(&self) -> usize {
        self.dials.lock().unwrap().len()
    }

    pub fn dial_times(&self) -> Vec<Instant> {
        self.dials.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    /// Most recent accepted connection.
    pub fn peer(&self) -> Arc<MockPeer> {
        Arc::clone(self.peers.lock().unwrap().last().unwrap())
    }

    pub fn peer_count(&self) -> usize {
        self.peers.lock().unwrap().len()
    }
}

impl Connector for MockConnector {
    fn connect(&self, url: &str) -> TransportFuture<'_, Connection> {
        self.dials.lock().unwrap().push(Instant::now());
        self.urls.lock().unwrap().push(url.to_string());
        let refused = self.refuse.load(Ordering::SeqCst)
            || self
                .refuse_next
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
        let delay = *self.dial_delay.lock().unwrap();

        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if refused {
                return Err(TransportError::ConnectionFailed("connection refused".into()));
            }
            let (tx, rx) = mpsc::unbounded_channel();
            let outgoing = Arc::new(Mutex::new(Vec::new()));
            let closed = Arc::new(AtomicBool::new(false));
            self.peers.lock().unwrap().push(Arc::new(MockPeer {
                inbound: Mutex::new(Some(tx)),
                outgoing: Arc::clone(&outgoing),
                closed: Arc::clone(&closed),
            }));
            Ok(Connection {
                sink: Box::new(MockSink {
                    outgoing,
                    closed,
                    stalled: Arc::clone(&self.stall_sends),
                }),
                source: Box::new(MockSource(rx)),
            })
        })
    }
}
