// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::test_helpers::{record, MockConnector};
use serde_json::json;
use yare::parameterized;

type TestChannel = RealtimeChannel<Arc<MockConnector>>;

const URL: &str = "ws://memory.test/v1/ws?token=secret";

fn channel(connector: &Arc<MockConnector>) -> TestChannel {
    RealtimeChannel::with_connector(ChannelConfig::new(URL), Arc::clone(connector))
}

fn all_kinds() -> [SyncEventKind; 6] {
    SyncEventKind::CHANNEL
}

/// Let spawned tasks run without moving the paused clock far.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

fn states(events: &[SyncEvent]) -> Vec<ConnectionState> {
    events
        .iter()
        .filter_map(|e| match e {
            SyncEvent::StateChanged(s) => Some(*s),
            _ => None,
        })
        .collect()
}

#[parameterized(
    zero = { 0, 1000 },
    one = { 1, 2000 },
    two = { 2, 4000 },
    three = { 3, 8000 },
    four = { 4, 16000 },
)]
fn reconnect_delay_doubles(attempts: u32, expected_ms: u64) {
    let config = ChannelConfig::new(URL);
    assert_eq!(config.reconnect_delay(attempts), Duration::from_millis(expected_ms));
}

#[test]
fn redacted_url_hides_token() {
    assert_eq!(ChannelConfig::new(URL).redacted_url(), "ws://memory.test/v1/ws");
}

#[test]
fn state_display() {
    assert_eq!(ConnectionState::Connected.to_string(), "connected");
    assert_eq!(
        ConnectionState::Reconnecting { attempt: 3 }.to_string(),
        "reconnecting (attempt 3)"
    );
}

#[tokio::test(start_paused = true)]
async fn connect_transitions_to_connected() {
    let connector = MockConnector::new();
    let channel = channel(&connector);
    let seen = record(channel.events(), &all_kinds());

    channel.connect().await.unwrap();

    assert_eq!(channel.state(), ConnectionState::Connected);
    assert_eq!(connector.urls(), vec![URL.to_string()]);
    let seen = seen.lock().unwrap();
    assert_eq!(
        states(&seen),
        vec![ConnectionState::Connecting, ConnectionState::Connected]
    );
    assert!(seen.contains(&SyncEvent::Connected));
}

#[tokio::test(start_paused = true)]
async fn connect_when_connected_is_noop() {
    let connector = MockConnector::new();
    let channel = channel(&connector);

    channel.connect().await.unwrap();
    channel.connect().await.unwrap();

    assert_eq!(connector.dial_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_connect_returns_error_and_schedules_reconnect() {
    let connector = MockConnector::new();
    connector.refuse_next(1);
    let channel = channel(&connector);

    let err = channel.connect().await.unwrap_err();

    assert!(matches!(err, ChannelError::Transport(_)));
    assert_eq!(channel.state(), ConnectionState::Reconnecting { attempt: 1 });

    tokio::time::sleep(Duration::from_millis(1100)).await;

    assert_eq!(connector.dial_count(), 2);
    assert_eq!(channel.state(), ConnectionState::Connected);
    assert_eq!(channel.reconnect_attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn reconnect_delays_double_then_give_up() {
    let connector = MockConnector::refusing();
    let channel = channel(&connector);
    let seen = record(channel.events(), &all_kinds());

    assert!(channel.connect().await.is_err());
    tokio::time::sleep(Duration::from_secs(120)).await;

    let dials = connector.dial_times();
    assert_eq!(dials.len(), 6, "initial dial plus five reconnects");
    let gaps: Vec<u128> = dials
        .windows(2)
        .map(|w| (w[1] - w[0]).as_millis())
        .collect();
    for (gap, expected) in gaps.iter().zip([1000u128, 2000, 4000, 8000, 16000]) {
        assert!(
            *gap >= expected && *gap <= expected + 5,
            "gaps {gaps:?}"
        );
    }

    assert_eq!(channel.state(), ConnectionState::Disconnected);
    let seen = seen.lock().unwrap();
    let exhausted: Vec<_> = seen
        .iter()
        .filter(|e| matches!(e, SyncEvent::Error(ChannelFault::ReconnectExhausted { .. })))
        .collect();
    assert_eq!(
        exhausted,
        vec![&SyncEvent::Error(ChannelFault::ReconnectExhausted { attempts: 5 })]
    );
    assert_eq!(
        states(&seen).last(),
        Some(&ConnectionState::Disconnected)
    );
}

#[tokio::test(start_paused = true)]
async fn connect_after_exhaustion_starts_over() {
    let connector = MockConnector::refusing();
    let channel = channel(&connector);
    let _ = channel.connect().await;
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(channel.state(), ConnectionState::Disconnected);

    connector.set_refuse(false);
    channel.connect().await.unwrap();

    assert_eq!(channel.state(), ConnectionState::Connected);
    assert_eq!(channel.reconnect_attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn disconnect_cancels_pending_reconnect() {
    let connector = MockConnector::refusing();
    let channel = channel(&connector);
    let seen = record(channel.events(), &[SyncEventKind::Disconnected]);

    let _ = channel.connect().await;
    assert_eq!(channel.state(), ConnectionState::Reconnecting { attempt: 1 });

    channel.disconnect().await;
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(connector.dial_count(), 1);
    assert_eq!(channel.state(), ConnectionState::Disconnected);
    assert_eq!(*seen.lock().unwrap(), vec![SyncEvent::Disconnected]);
}

#[tokio::test(start_paused = true)]
async fn disconnect_closes_connection_without_reconnect() {
    let connector = MockConnector::new();
    let channel = channel(&connector);
    channel.connect().await.unwrap();
    let peer = connector.peer();

    channel.disconnect().await;
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert!(peer.client_closed());
    assert_eq!(connector.dial_count(), 1);
    assert_eq!(channel.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn disconnect_when_idle_emits_nothing() {
    let connector = MockConnector::new();
    let channel = channel(&connector);
    let seen = record(channel.events(), &all_kinds());

    channel.disconnect().await;

    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn server_close_triggers_reconnect() {
    let connector = MockConnector::new();
    let channel = channel(&connector);
    channel.connect().await.unwrap();

    connector.peer().close();
    settle().await;
    assert_eq!(channel.state(), ConnectionState::Reconnecting { attempt: 1 });

    tokio::time::sleep(Duration::from_millis(1100)).await;

    assert_eq!(connector.dial_count(), 2);
    assert_eq!(channel.state(), ConnectionState::Connected);
    assert_eq!(channel.reconnect_attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn heartbeat_sends_ping_every_interval() {
    let connector = MockConnector::new();
    let channel = channel(&connector);
    channel.connect().await.unwrap();
    let peer = connector.peer();

    tokio::time::sleep(Duration::from_secs(29)).await;
    assert!(peer.sent().is_empty());

    tokio::time::sleep(Duration::from_secs(62)).await;
    assert_eq!(peer.sent(), vec![r#"{"type":"ping"}"#; 3]);
}

#[tokio::test(start_paused = true)]
async fn heartbeat_stops_after_disconnect() {
    let connector = MockConnector::new();
    let channel = channel(&connector);
    channel.connect().await.unwrap();
    let peer = connector.peer();

    channel.disconnect().await;
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert!(peer.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn zero_interval_disables_heartbeat() {
    let connector = MockConnector::new();
    let config = ChannelConfig {
        heartbeat_interval: Duration::ZERO,
        ..ChannelConfig::new(URL)
    };
    let channel = RealtimeChannel::with_connector(config, Arc::clone(&connector));
    channel.connect().await.unwrap();

    tokio::time::sleep(Duration::from_secs(120)).await;

    assert!(connector.peer().sent().is_empty());
    assert!(channel.is_connected());
}

#[tokio::test(start_paused = true)]
async fn silent_connection_is_declared_dead() {
    let connector = MockConnector::new();
    let config = ChannelConfig {
        heartbeat_timeout: Some(Duration::from_secs(10)),
        ..ChannelConfig::new(URL)
    };
    let channel = RealtimeChannel::with_connector(config, Arc::clone(&connector));
    channel.connect().await.unwrap();
    let first = connector.peer();

    // The tick at 60s finds 60s of silence, over the 40s allowance, and the
    // reconnect follows one second later.
    tokio::time::sleep(Duration::from_millis(61_500)).await;

    assert!(first.client_closed());
    assert_eq!(connector.dial_count(), 2);
    assert!(channel.is_connected());
}

#[tokio::test(start_paused = true)]
async fn pong_keeps_connection_alive() {
    let connector = MockConnector::new();
    let config = ChannelConfig {
        heartbeat_timeout: Some(Duration::from_secs(10)),
        ..ChannelConfig::new(URL)
    };
    let channel = RealtimeChannel::with_connector(config, Arc::clone(&connector));
    let seen = record(channel.events(), &all_kinds());
    channel.connect().await.unwrap();
    let peer = connector.peer();

    for _ in 0..4 {
        tokio::time::sleep(Duration::from_secs(25)).await;
        peer.push(r#"{"type":"pong"}"#);
    }
    settle().await;

    assert_eq!(connector.dial_count(), 1);
    assert!(!peer.client_closed());
    // Only the connect transitions; pong is consumed without an event.
    assert_eq!(seen.lock().unwrap().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn inbound_frames_are_demultiplexed() {
    let connector = MockConnector::new();
    let channel = channel(&connector);
    channel.connect().await.unwrap();
    let seen = record(
        channel.events(),
        &[
            SyncEventKind::MemoryUpdate,
            SyncEventKind::SyncSignal,
            SyncEventKind::Error,
        ],
    );
    let peer = connector.peer();

    peer.push(r#"{"type":"memory_update","payload":{"id":"m1"}}"#);
    peer.push("not json");
    peer.push(r#"{"type":"billing","payload":{}}"#);
    peer.push(r#"{"type":"pong"}"#);
    peer.push(r#"{"type":"sync","payload":{"since":"2026-01-01"}}"#);
    peer.push(r#"{"type":"error","payload":{"message":"quota exceeded"}}"#);
    settle().await;

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            SyncEvent::MemoryUpdate(json!({"id": "m1"})),
            SyncEvent::SyncSignal(json!({"since": "2026-01-01"})),
            SyncEvent::Error(ChannelFault::Server("quota exceeded".into())),
        ]
    );
    assert!(channel.is_connected());
}

#[tokio::test(start_paused = true)]
async fn stale_connection_close_is_ignored() {
    let connector = MockConnector::new();
    let channel = channel(&connector);
    channel.connect().await.unwrap();
    let old = connector.peer();

    channel.disconnect().await;
    channel.connect().await.unwrap();
    assert_eq!(connector.peer_count(), 2);

    // The old connection ending must not disturb the new one.
    old.close();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(connector.dial_count(), 2);
    assert!(channel.is_connected());
}

#[tokio::test(start_paused = true)]
async fn disconnect_returns_while_heartbeat_send_hangs() {
    let connector = MockConnector::new();
    let channel = channel(&connector);
    channel.connect().await.unwrap();
    connector.stall_sends(true);

    // The first probe is now stuck inside the sink.
    tokio::time::sleep(DEFAULT_HEARTBEAT_INTERVAL + Duration::from_millis(1)).await;
    tokio::time::timeout(Duration::from_secs(1), channel.disconnect())
        .await
        .unwrap();

    assert!(connector.peer().client_closed());
    assert_eq!(channel.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn dial_failing_after_disconnect_is_silent() {
    let connector = MockConnector::refusing();
    connector.set_dial_delay(Duration::from_millis(100));
    let channel = channel(&connector);
    let seen = record(channel.events(), &all_kinds());

    let dialing = tokio::spawn({
        let channel = channel.clone();
        async move { channel.connect().await }
    });
    settle().await;
    channel.disconnect().await;
    let result = dialing.await.unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert!(matches!(result, Err(ChannelError::Cancelled)));
    assert_eq!(connector.dial_count(), 1);
    assert_eq!(channel.state(), ConnectionState::Disconnected);
    let seen = seen.lock().unwrap();
    assert!(!seen.iter().any(|e| matches!(e, SyncEvent::Error(_))));
}

#[tokio::test(start_paused = true)]
async fn connect_during_reconnect_dial_returns_without_waiting() {
    let connector = MockConnector::new();
    connector.refuse_next(1);
    connector.set_dial_delay(Duration::from_millis(100));
    let channel = channel(&connector);

    channel.connect().await.unwrap_err();
    // Reconnect fires 1000ms after the failure and dials for 100ms.
    tokio::time::sleep(Duration::from_millis(1050)).await;
    assert_eq!(connector.dial_count(), 2);

    channel.connect().await.unwrap();
    assert_eq!(channel.state(), ConnectionState::Reconnecting { attempt: 1 });
    assert_eq!(connector.dial_count(), 2);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(channel.is_connected());
}

#[tokio::test(start_paused = true)]
async fn handlers_can_be_removed() {
    let connector = MockConnector::new();
    let channel = channel(&connector);
    let seen = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&seen);
    let id = channel.on(SyncEventKind::Connected, move |_| {
        *counter.lock().unwrap() += 1;
    });

    assert!(channel.off(SyncEventKind::Connected, id));
    channel.connect().await.unwrap();

    assert_eq!(*seen.lock().unwrap(), 0);
}
