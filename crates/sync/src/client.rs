// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync client facade used by capture agents.
//!
//! Provides a high-level interface for:
//! - Sending context events (with offline queue fallback)
//! - Draining the queue when connectivity returns
//! - Receiving realtime pushes through [`SyncClient::on`]
//! - Reading recent memories back from the store
//!
//! A client is constructed explicitly and shut down explicitly. Clones share
//! the same queue, channel and subscriptions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use cairn_core::{ContextEvent, QueuedItem};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bus::{EventBus, ListenerId};
use crate::channel::{ChannelError, ConnectionState, RealtimeChannel};
use crate::config::{ConfigError, SyncConfig};
use crate::events::{SyncEvent, SyncEventKind};
use crate::http::{ApiError, HttpApi, MemoryApi, BATCH_LIMIT};
use crate::queue::{DeliveryStatus, DrainReport, DurableQueue, QueueError};
use crate::retry::{DeliveryError, RetryingTransport};
use crate::storage::{FileStorage, Storage};
use crate::transport::{Connector, WebSocketConnector};

/// Error type for sync client operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Queue could not be opened.
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// API client could not be built.
    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// A read-back request failed on every attempt.
    #[error(transparent)]
    Delivery(#[from] DeliveryError<ApiError>),

    /// Realtime channel error.
    #[error("realtime error: {0}")]
    Channel(#[from] ChannelError),

    /// The client was built without a realtime channel.
    #[error("realtime channel is not enabled for this client")]
    RealtimeDisabled,
}

/// Result type for sync client operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Result of [`SyncClient::send_batch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub delivered: usize,
    pub queued: usize,
}

type Channel = RealtimeChannel<Arc<dyn Connector>>;

struct Inner {
    api: Arc<dyn MemoryApi>,
    retry: RetryingTransport,
    queue: DurableQueue,
    channel: Option<Channel>,
    /// `connect_realtime()` was called and `disconnect_realtime()` was not.
    realtime_started: AtomicBool,
    online: AtomicBool,
    bus: Arc<EventBus<SyncEvent>>,
    /// Handlers forwarding channel events onto `bus`.
    forwarders: Mutex<Vec<(SyncEventKind, ListenerId)>>,
}

/// Entry point for capture agents.
#[derive(Clone)]
pub struct SyncClient {
    inner: Arc<Inner>,
}

/// Builds a [`SyncClient`], optionally replacing its collaborators.
pub struct SyncClientBuilder {
    config: SyncConfig,
    api: Option<Arc<dyn MemoryApi>>,
    storage: Option<Arc<dyn Storage>>,
    connector: Option<Arc<dyn Connector>>,
    realtime: bool,
}

impl SyncClientBuilder {
    pub fn api(mut self, api: Arc<dyn MemoryApi>) -> Self {
        self.api = Some(api);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Build without a realtime channel.
    pub fn without_realtime(mut self) -> Self {
        self.realtime = false;
        self
    }

    pub fn build(self) -> SyncResult<SyncClient> {
        let config = self.config;
        let api: Arc<dyn MemoryApi> = match self.api {
            Some(api) => api,
            None => Arc::new(HttpApi::new(
                &config.api.endpoint,
                &config.api.api_key,
                config.http_timeout(),
            )?),
        };
        let storage: Arc<dyn Storage> = match self.storage {
            Some(storage) => storage,
            None => Arc::new(FileStorage::new(config.storage_dir())),
        };
        let queue = DurableQueue::open(storage, config.queue_config()?)?;

        let channel = if self.realtime {
            let connector: Arc<dyn Connector> = match self.connector {
                Some(connector) => connector,
                None => Arc::new(WebSocketConnector),
            };
            Some(RealtimeChannel::with_connector(
                config.channel_config()?,
                connector,
            ))
        } else {
            None
        };

        let bus = Arc::new(EventBus::new());
        let mut forwarders = Vec::new();
        if let Some(channel) = &channel {
            for kind in SyncEventKind::CHANNEL {
                let bus = Arc::clone(&bus);
                let id = channel.on(kind, move |event: &SyncEvent| {
                    bus.emit(event);
                });
                forwarders.push((kind, id));
            }
        }

        debug!(queue_len = queue.len(), realtime = channel.is_some(), "sync client ready");
        Ok(SyncClient {
            inner: Arc::new(Inner {
                api,
                retry: RetryingTransport::new(config.retry_policy()),
                queue,
                channel,
                realtime_started: AtomicBool::new(false),
                online: AtomicBool::new(true),
                bus,
                forwarders: Mutex::new(forwarders),
            }),
        })
    }
}

impl SyncClient {
    /// Client with the production HTTP, file storage and WebSocket stack.
    pub fn new(config: SyncConfig) -> SyncResult<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: SyncConfig) -> SyncClientBuilder {
        SyncClientBuilder {
            config,
            api: None,
            storage: None,
            connector: None,
            realtime: true,
        }
    }

    /// Delivers an event, or queues it when offline or when every attempt
    /// fails. Delivery problems never surface as errors.
    pub async fn send_context(&self, event: ContextEvent) -> DeliveryStatus {
        if !self.is_online() {
            debug!("offline, queueing context without delivery attempt");
            return self.enqueue(event);
        }

        match self.deliver(&event).await {
            Ok(response) => {
                debug!(source = %event.source(), "context delivered");
                self.inner.bus.emit(&SyncEvent::ContextDelivered(response));
                DeliveryStatus::Delivered
            }
            Err(e) => {
                warn!(attempts = e.attempts, error = %e.last, "delivery failed, queueing context");
                self.enqueue(event)
            }
        }
    }

    async fn deliver(&self, event: &ContextEvent) -> Result<Value, DeliveryError<ApiError>> {
        let api = self.inner.api.as_ref();
        self.inner
            .retry
            .execute(move || api.create_memory(event))
            .await
    }

    fn enqueue(&self, event: ContextEvent) -> DeliveryStatus {
        let enqueued = self.inner.queue.add(event);
        if let Some(evicted) = enqueued.evicted {
            self.inner.bus.emit(&SyncEvent::QueueOverflow { evicted });
        }
        self.inner.bus.emit(&SyncEvent::ContextQueued {
            item_id: enqueued.item_id,
        });
        DeliveryStatus::Queued
    }

    /// Delivers events in chunks of at most 100; chunks that still fail
    /// after retries are queued event by event.
    pub async fn send_batch(&self, events: Vec<ContextEvent>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for chunk in events.chunks(BATCH_LIMIT) {
            let delivered = if self.is_online() {
                let api = self.inner.api.as_ref();
                match self.inner.retry.execute(move || api.create_batch(chunk)).await {
                    Ok(_) => true,
                    Err(e) => {
                        warn!(size = chunk.len(), error = %e, "batch delivery failed, queueing events");
                        false
                    }
                }
            } else {
                false
            };

            if delivered {
                outcome.delivered += chunk.len();
            } else {
                for event in chunk {
                    self.enqueue(event.clone());
                    outcome.queued += 1;
                }
            }
        }
        outcome
    }

    /// Runs one drain pass over the queue.
    pub async fn process_queue(&self) -> DrainReport {
        let report = self
            .inner
            .queue
            .process(|event| async move { self.deliver(&event).await.map(|_| ()) })
            .await;
        if !report.skipped && !report.outcomes.is_empty() {
            self.inner.bus.emit(&SyncEvent::QueueDrained(report.clone()));
        }
        report
    }

    /// Most recent memories, newest first.
    pub async fn recent(&self, limit: usize) -> SyncResult<Value> {
        let api = self.inner.api.as_ref();
        Ok(self.inner.retry.execute(move || api.list_recent(limit)).await?)
    }

    pub async fn search(&self, query: &str) -> SyncResult<Value> {
        let api = self.inner.api.as_ref();
        Ok(self.inner.retry.execute(move || api.search(query)).await?)
    }

    fn channel(&self) -> SyncResult<&Channel> {
        self.inner.channel.as_ref().ok_or(SyncError::RealtimeDisabled)
    }

    /// Opens the realtime channel. Reconnects are automatic until
    /// [`SyncClient::disconnect_realtime`] is called.
    pub async fn connect_realtime(&self) -> SyncResult<()> {
        let channel = self.channel()?;
        self.inner.realtime_started.store(true, Ordering::SeqCst);
        channel.connect().await?;
        Ok(())
    }

    pub async fn disconnect_realtime(&self) {
        self.inner.realtime_started.store(false, Ordering::SeqCst);
        if let Some(channel) = &self.inner.channel {
            channel.disconnect().await;
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner
            .channel
            .as_ref()
            .map_or(ConnectionState::Disconnected, |channel| channel.state())
    }

    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    /// Records a connectivity change.
    ///
    /// Going online drains the queue and, if the realtime channel was
    /// started but is not connected, reconnects it. Going offline leaves an
    /// open realtime connection alone.
    pub async fn set_online(&self, online: bool) {
        let was_online = self.inner.online.swap(online, Ordering::SeqCst);
        if was_online == online {
            return;
        }
        if !online {
            info!("connectivity lost, new context will be queued");
            return;
        }

        info!(queue_len = self.inner.queue.len(), "connectivity restored");
        self.process_queue().await;

        if let Some(channel) = &self.inner.channel {
            if self.inner.realtime_started.load(Ordering::SeqCst) && !channel.is_connected() {
                if let Err(e) = channel.connect().await {
                    warn!(error = %e, "realtime reconnect after connectivity change failed");
                }
            }
        }
    }

    /// Feeds connectivity signals into [`SyncClient::set_online`] until the
    /// sender is dropped.
    pub fn watch_connectivity(&self, mut signal: watch::Receiver<bool>) -> JoinHandle<()> {
        let client = self.clone();
        tokio::spawn(async move {
            let initial = *signal.borrow_and_update();
            client.set_online(initial).await;
            while signal.changed().await.is_ok() {
                let online = *signal.borrow_and_update();
                client.set_online(online).await;
            }
            debug!("connectivity watcher stopped");
        })
    }

    pub fn on<F>(&self, kind: SyncEventKind, handler: F) -> ListenerId
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        self.inner.bus.on(kind, handler)
    }

    pub fn off(&self, kind: SyncEventKind, id: ListenerId) -> bool {
        self.inner.bus.off(kind, id)
    }

    pub fn pending_count(&self) -> usize {
        self.inner.queue.len()
    }

    pub fn queued_items(&self) -> Vec<QueuedItem> {
        self.inner.queue.items()
    }

    /// Discards every queued event. Returns how many were removed.
    pub fn clear_queue(&self) -> usize {
        self.inner.queue.clear()
    }

    /// Closes the realtime channel and drops every subscription.
    pub async fn shutdown(&self) {
        self.disconnect_realtime().await;
        if let Some(channel) = &self.inner.channel {
            let forwarders = std::mem::take(
                &mut *self.inner.forwarders.lock().unwrap_or_else(|e| e.into_inner()),
            );
            for (kind, id) in forwarders {
                channel.off(kind, id);
            }
        }
        self.inner.bus.remove_all_listeners(None);
        info!(pending = self.pending_count(), "sync client shut down");
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
