// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for the WebSocket connector against a local server.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Single-connection WebSocket server that sends `greeting`, answers one
/// protocol ping, then reports what the client sent before closing.
async fn start_server(greeting: &'static str) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        ws.send(Message::Ping(Vec::new().into())).await.unwrap();
        ws.send(Message::Text(greeting.into())).await.unwrap();

        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                tx.send(text.as_str().to_string()).unwrap();
                ws.close(None).await.unwrap();
                break;
            }
        }
    });

    (addr, rx)
}

#[tokio::test]
async fn websocket_connector_exchanges_text_frames() {
    let (addr, mut from_client) = start_server(r#"{"type":"sync","payload":{}}"#).await;

    let mut conn = WebSocketConnector
        .connect(&format!("ws://{addr}/v1/ws?token=secret"))
        .await
        .unwrap();

    let first = conn.source.recv().await.unwrap();
    assert_eq!(first.as_deref(), Some(r#"{"type":"sync","payload":{}}"#));

    conn.sink.send(r#"{"type":"ping"}"#.to_string()).await.unwrap();
    assert_eq!(from_client.recv().await.unwrap(), r#"{"type":"ping"}"#);

    assert_eq!(conn.source.recv().await.unwrap(), None);
}

#[tokio::test]
async fn websocket_connector_reports_refused_connection() {
    // Bind then drop to get a port with nothing listening.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = WebSocketConnector.connect(&format!("ws://{addr}")).await;

    assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
}

#[tokio::test]
async fn arc_connector_delegates() {
    let connector: Arc<dyn Connector> = Arc::new(WebSocketConnector);
    let result = connector.connect("not a url").await;
    assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
}
