// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Realtime push channel with heartbeat and automatic reconnection.
//!
//! State machine:
//!
//! ```text
//! Disconnected ──connect()──► Connecting ──ok──► Connected
//!       ▲                         │ fail             │ closed / error
//!       │                         ▼                  ▼
//!       └──── exhausted ──── Reconnecting { attempt } ◄┘
//! ```
//!
//! Each connection gets an epoch number. Reader, heartbeat and reconnect
//! tasks carry the epoch they were started for and do nothing once the
//! channel has moved on to a newer one. `disconnect()` bumps the epoch and
//! cancels every task, so no reconnect can fire after it returns.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use cairn_core::{ClientFrame, RawFrame, ServerFrame};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::bus::{EventBus, ListenerId};
use crate::events::{ChannelFault, SyncEvent, SyncEventKind};
use crate::transport::{
    Connection, Connector, FrameSink, FrameSource, TransportError, WebSocketConnector,
};

/// Default interval between liveness probes.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// Default delay before the first reconnect.
pub const DEFAULT_RECONNECT_BASE_DELAY: Duration = Duration::from_millis(1000);
/// Default number of reconnects before giving up.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
/// Longest `disconnect()` waits for the close handshake.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection state of the realtime channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected.
    Disconnected,
    /// Attempting to connect.
    Connecting,
    /// Connected to the server.
    Connected,
    /// Waiting for, or dialing, reconnect number `attempt`.
    Reconnecting { attempt: u32 },
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("disconnected"),
            ConnectionState::Connecting => f.write_str("connecting"),
            ConnectionState::Connected => f.write_str("connected"),
            ConnectionState::Reconnecting { attempt } => {
                write!(f, "reconnecting (attempt {attempt})")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Full URL, including the token query parameter.
    pub url: String,
    /// Zero disables the heartbeat.
    pub heartbeat_interval: Duration,
    /// Silence tolerated past one heartbeat interval before the connection
    /// is declared dead. `None` never declares it dead.
    pub heartbeat_timeout: Option<Duration>,
    pub reconnect_base_delay: Duration,
    pub max_reconnect_attempts: u32,
}

impl ChannelConfig {
    pub fn new(url: impl Into<String>) -> Self {
        ChannelConfig {
            url: url.into(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            heartbeat_timeout: None,
            reconnect_base_delay: DEFAULT_RECONNECT_BASE_DELAY,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }

    /// Delay before the next reconnect when `attempts` have already been
    /// scheduled since the last successful connection.
    pub fn reconnect_delay(&self, attempts: u32) -> Duration {
        self.reconnect_base_delay
            .saturating_mul(2u32.saturating_pow(attempts))
    }

    /// URL without its query string, for logs.
    fn redacted_url(&self) -> &str {
        self.url.split('?').next().unwrap_or_default()
    }
}

/// Error type for channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The dial failed; a reconnect has been scheduled.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// `disconnect()` was called while the dial was in flight.
    #[error("connection attempt cancelled by disconnect")]
    Cancelled,
}

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Time of the last inbound frame on a connection.
#[derive(Clone)]
struct LastSeen(Arc<Mutex<Instant>>);

impl LastSeen {
    fn now() -> Self {
        LastSeen(Arc::new(Mutex::new(Instant::now())))
    }

    fn touch(&self) {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    fn elapsed(&self) -> Duration {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).elapsed()
    }
}

type SharedSink = Arc<AsyncMutex<Box<dyn FrameSink>>>;

struct Session {
    sink: SharedSink,
    cancel: CancellationToken,
}

struct Shared {
    state: ConnectionState,
    /// Reconnects scheduled since the last successful connection.
    reconnect_attempts: u32,
    intentionally_closed: bool,
    epoch: u64,
    dialing: bool,
    session: Option<Session>,
    reconnect_timer: Option<CancellationToken>,
}

struct Inner<C> {
    config: ChannelConfig,
    connector: C,
    bus: EventBus<SyncEvent>,
    shared: Mutex<Shared>,
}

/// Realtime push channel.
///
/// Cloning yields another handle to the same channel.
pub struct RealtimeChannel<C: Connector = WebSocketConnector> {
    inner: Arc<Inner<C>>,
}

impl<C: Connector> Clone for RealtimeChannel<C> {
    fn clone(&self) -> Self {
        RealtimeChannel {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl RealtimeChannel<WebSocketConnector> {
    pub fn new(config: ChannelConfig) -> Self {
        Self::with_connector(config, WebSocketConnector)
    }
}

impl<C: Connector> RealtimeChannel<C> {
    pub fn with_connector(config: ChannelConfig, connector: C) -> Self {
        RealtimeChannel {
            inner: Arc::new(Inner {
                config,
                connector,
                bus: EventBus::new(),
                shared: Mutex::new(Shared {
                    state: ConnectionState::Disconnected,
                    reconnect_attempts: 0,
                    intentionally_closed: false,
                    epoch: 0,
                    dialing: false,
                    session: None,
                    reconnect_timer: None,
                }),
            }),
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.lock().reconnect_attempts
    }

    /// Bus carrying this channel's events.
    pub fn events(&self) -> &EventBus<SyncEvent> {
        &self.inner.bus
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

    /// Opens the connection.
    ///
    /// Does nothing if already connected or a dial is in progress. A failed
    /// dial schedules a reconnect and is also returned here.
    ///
    /// `Ok(())` does not mean connected: when a reconnect dial is already in
    /// flight this returns at once and the state stays `Reconnecting`. Use
    /// [`state`](Self::state) or the `Connected` event to know when the
    /// connection is up.
    pub async fn connect(&self) -> ChannelResult<()> {
        let (epoch, transition) = {
            let mut shared = self.inner.lock();
            if shared.state == ConnectionState::Connected || shared.dialing {
                return Ok(());
            }
            shared.intentionally_closed = false;
            if let Some(timer) = shared.reconnect_timer.take() {
                timer.cancel();
            }
            shared.dialing = true;
            shared.epoch += 1;
            let transition = if shared.state == ConnectionState::Disconnected {
                shared.reconnect_attempts = 0;
                shared.state = ConnectionState::Connecting;
                true
            } else {
                false
            };
            (shared.epoch, transition)
        };
        if transition {
            self.inner
                .bus
                .emit(&SyncEvent::StateChanged(ConnectionState::Connecting));
        }

        self.inner.dial(epoch).await
    }

    /// Closes the connection and cancels any pending reconnect.
    pub async fn disconnect(&self) {
        let (session, previous) = {
            let mut shared = self.inner.lock();
            shared.intentionally_closed = true;
            shared.epoch += 1;
            shared.dialing = false;
            if let Some(timer) = shared.reconnect_timer.take() {
                timer.cancel();
            }
            let session = shared.session.take();
            let previous = std::mem::replace(&mut shared.state, ConnectionState::Disconnected);
            (session, previous)
        };

        if let Some(session) = session {
            session.cancel.cancel();
            let close = async { session.sink.lock().await.close().await };
            match tokio::time::timeout(CLOSE_TIMEOUT, close).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(error = %e, "error closing realtime connection"),
                Err(_) => warn!("realtime close handshake timed out"),
            }
        }

        if previous != ConnectionState::Disconnected {
            info!("realtime channel disconnected");
            self.inner
                .bus
                .emit(&SyncEvent::StateChanged(ConnectionState::Disconnected));
            self.inner.bus.emit(&SyncEvent::Disconnected);
        }
    }
}

impl<C: Connector> Inner<C> {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit_all(&self, events: Vec<SyncEvent>) {
        for event in &events {
            self.bus.emit(event);
        }
    }

    async fn dial(self: &Arc<Self>, epoch: u64) -> ChannelResult<()> {
        debug!(url = %self.config.redacted_url(), "dialing realtime channel");
        match self.connector.connect(&self.config.url).await {
            Ok(Connection { sink, source }) => {
                let sink: SharedSink = Arc::new(AsyncMutex::new(sink));
                let cancel = CancellationToken::new();
                let accepted = {
                    let mut shared = self.lock();
                    if shared.epoch == epoch {
                        shared.dialing = false;
                    }
                    if shared.intentionally_closed || shared.epoch != epoch {
                        false
                    } else {
                        shared.reconnect_attempts = 0;
                        shared.state = ConnectionState::Connected;
                        shared.session = Some(Session {
                            sink: Arc::clone(&sink),
                            cancel: cancel.clone(),
                        });
                        true
                    }
                };

                if !accepted {
                    debug!("discarding connection opened after disconnect");
                    let _ = sink.lock().await.close().await;
                    return Err(ChannelError::Cancelled);
                }

                info!(url = %self.config.redacted_url(), "realtime channel connected");
                let last_seen = LastSeen::now();
                self.spawn_reader(epoch, source, cancel.clone(), last_seen.clone());
                if !self.config.heartbeat_interval.is_zero() {
                    self.spawn_heartbeat(epoch, sink, cancel, last_seen);
                }
                self.emit_all(vec![
                    SyncEvent::StateChanged(ConnectionState::Connected),
                    SyncEvent::Connected,
                ]);
                Ok(())
            }
            Err(e) => {
                let current = {
                    let mut shared = self.lock();
                    if shared.epoch == epoch {
                        shared.dialing = false;
                    }
                    !shared.intentionally_closed && shared.epoch == epoch
                };
                if !current {
                    debug!(error = %e, "ignoring failed dial after disconnect");
                    return Err(ChannelError::Cancelled);
                }
                warn!(url = %self.config.redacted_url(), error = %e, "realtime connection failed");
                self.bus
                    .emit(&SyncEvent::Error(ChannelFault::Transport(e.to_string())));
                self.connection_lost(epoch);
                Err(e.into())
            }
        }
    }

    /// Handles a close, error or failed dial for `epoch`: schedules the next
    /// reconnect or gives up.
    fn connection_lost(self: &Arc<Self>, epoch: u64) {
        let mut events = Vec::new();
        let schedule = {
            let mut shared = self.lock();
            if shared.intentionally_closed || shared.epoch != epoch {
                return;
            }
            // Later reports for the same connection are stale.
            shared.epoch += 1;
            if let Some(session) = shared.session.take() {
                session.cancel.cancel();
            }

            if shared.reconnect_attempts >= self.config.max_reconnect_attempts {
                shared.state = ConnectionState::Disconnected;
                events.push(SyncEvent::StateChanged(ConnectionState::Disconnected));
                events.push(SyncEvent::Error(ChannelFault::ReconnectExhausted {
                    attempts: shared.reconnect_attempts,
                }));
                error!(
                    attempts = shared.reconnect_attempts,
                    "realtime reconnection exhausted, giving up"
                );
                None
            } else {
                let delay = self.config.reconnect_delay(shared.reconnect_attempts);
                shared.reconnect_attempts += 1;
                let attempt = shared.reconnect_attempts;
                shared.state = ConnectionState::Reconnecting { attempt };
                let timer = CancellationToken::new();
                if let Some(old) = shared.reconnect_timer.replace(timer.clone()) {
                    old.cancel();
                }
                events.push(SyncEvent::StateChanged(ConnectionState::Reconnecting {
                    attempt,
                }));
                Some((delay, timer, attempt))
            }
        };
        self.emit_all(events);

        if let Some((delay, timer, attempt)) = schedule {
            info!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "scheduling realtime reconnect"
            );
            let inner = Arc::clone(self);
            let cancelled = timer.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = cancelled.cancelled() => {}
                    _ = tokio::time::sleep(delay) => inner.reconnect(timer).await,
                }
            });
        }
    }

    async fn reconnect(self: Arc<Self>, timer: CancellationToken) {
        let epoch = {
            let mut shared = self.lock();
            // The flag is checked again here: disconnect() may have run
            // between the timer firing and this task being polled.
            if timer.is_cancelled()
                || shared.intentionally_closed
                || shared.dialing
                || shared.state == ConnectionState::Connected
            {
                return;
            }
            shared.reconnect_timer = None;
            shared.dialing = true;
            shared.epoch += 1;
            shared.epoch
        };
        // Failures reschedule from inside dial().
        let _ = self.dial(epoch).await;
    }

    fn spawn_reader(
        self: &Arc<Self>,
        epoch: u64,
        mut source: Box<dyn FrameSource>,
        cancel: CancellationToken,
        last_seen: LastSeen,
    ) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    _ = cancel.cancelled() => return,
                    next = source.recv() => next,
                };
                match next {
                    Ok(Some(text)) => {
                        last_seen.touch();
                        inner.dispatch(&text);
                    }
                    Ok(None) => {
                        info!("realtime connection closed by server");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "realtime connection error");
                        inner
                            .bus
                            .emit(&SyncEvent::Error(ChannelFault::Transport(e.to_string())));
                        break;
                    }
                }
            }
            inner.connection_lost(epoch);
        });
    }

    fn spawn_heartbeat(
        self: &Arc<Self>,
        epoch: u64,
        sink: SharedSink,
        cancel: CancellationToken,
        last_seen: LastSeen,
    ) {
        let inner = Arc::clone(self);
        let interval = self.config.heartbeat_interval;
        let timeout = self.config.heartbeat_timeout;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => {}
                }

                if let Some(timeout) = timeout {
                    let silent = last_seen.elapsed();
                    if silent > interval + timeout {
                        warn!(
                            silent_ms = silent.as_millis() as u64,
                            "no inbound traffic, declaring realtime connection dead"
                        );
                        tokio::select! {
                            _ = cancel.cancelled() => return,
                            _ = async { sink.lock().await.close().await } => {}
                        }
                        break;
                    }
                }

                let frame = match ClientFrame::ping().to_json() {
                    Ok(frame) => frame,
                    Err(e) => {
                        error!(error = %e, "failed to encode liveness probe");
                        continue;
                    }
                };
                trace!("sending liveness probe");
                // A dead peer can stall the send; the guard must not outlive
                // cancellation or disconnect() would wait on it.
                let result = tokio::select! {
                    _ = cancel.cancelled() => return,
                    result = async { sink.lock().await.send(frame).await } => result,
                };
                if let Err(e) = result {
                    warn!(error = %e, "liveness probe failed");
                    break;
                }
            }
            inner.connection_lost(epoch);
        });
    }

    /// Routes one inbound frame onto the bus.
    fn dispatch(&self, text: &str) {
        let raw = match RawFrame::from_json(text) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "dropping malformed realtime frame");
                return;
            }
        };
        let kind = raw.kind.clone();
        match ServerFrame::from_raw(raw) {
            Some(ServerFrame::MemoryUpdate(payload)) => {
                self.bus.emit(&SyncEvent::MemoryUpdate(payload));
            }
            Some(ServerFrame::Sync(payload)) => {
                self.bus.emit(&SyncEvent::SyncSignal(payload));
            }
            Some(ServerFrame::Error { message }) => {
                warn!(message = %message, "server reported error");
                self.bus
                    .emit(&SyncEvent::Error(ChannelFault::Server(message)));
            }
            Some(ServerFrame::Pong) => trace!("liveness response"),
            None => warn!(frame_type = %kind, "dropping unrecognized realtime frame"),
        }
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
