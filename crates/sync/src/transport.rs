// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Transport abstraction for the realtime channel.
//!
//! A [`Connector`] dials a URL and hands back the two halves of a text-frame
//! connection. Splitting the halves lets the channel read on one task while
//! the heartbeat writes on another. Tests plug in scripted connectors; the
//! production implementation is [`WebSocketConnector`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Error type for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed unexpectedly.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Boxed future returned by transport methods.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = TransportResult<T>> + Send + 'a>>;

/// Outbound half of a connection.
pub trait FrameSink: Send {
    fn send(&mut self, text: String) -> TransportFuture<'_, ()>;

    fn close(&mut self) -> TransportFuture<'_, ()>;
}

/// Inbound half of a connection.
pub trait FrameSource: Send {
    /// Next text frame, or `None` once the peer has closed.
    fn recv(&mut self) -> TransportFuture<'_, Option<String>>;
}

/// An open connection.
pub struct Connection {
    pub sink: Box<dyn FrameSink>,
    pub source: Box<dyn FrameSource>,
}

/// Opens connections.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, url: &str) -> TransportFuture<'_, Connection>;
}

impl<T: Connector + ?Sized> Connector for Arc<T> {
    fn connect(&self, url: &str) -> TransportFuture<'_, Connection> {
        (**self).connect(url)
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket connector using tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
    fn connect(&self, url: &str) -> TransportFuture<'_, Connection> {
        let url = url.to_string();
        Box::pin(async move {
            let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

            let (sink, stream) = ws_stream.split();
            Ok(Connection {
                sink: Box::new(WsSink(sink)),
                source: Box::new(WsSource(stream)),
            })
        })
    }
}

struct WsSink(SplitSink<WsStream, Message>);

impl FrameSink for WsSink {
    fn send(&mut self, text: String) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.0
                .send(Message::Text(text.into()))
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;
            // Flush so a broken connection shows up on this send.
            self.0
                .flush()
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))
        })
    }

    fn close(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.0
                .close()
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))
        })
    }
}

struct WsSource(SplitStream<WsStream>);

impl FrameSource for WsSource {
    fn recv(&mut self) -> TransportFuture<'_, Option<String>> {
        Box::pin(async move {
            loop {
                match self.0.next().await {
                    Some(Ok(Message::Text(text))) => return Ok(Some(text.as_str().to_string())),
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => return Ok(Some(text)),
                        Err(_) => continue,
                    },
                    Some(Ok(Message::Close(_))) | None => return Ok(None),
                    // Protocol-level ping/pong is answered by tungstenite.
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(TransportError::ReceiveFailed(e.to_string())),
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
