// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Streams realtime events as lines until stopped.

use std::future::Future;
use std::io::Write;

use cairn_sync::{ChannelFault, SyncClient, SyncError, SyncEvent, SyncEventKind};
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::{Error, Result};

/// Print every channel event until `stop` resolves.
///
/// Fails with [`Error::RealtimeLost`] once the channel gives up reconnecting.
pub async fn run<W, S>(client: &SyncClient, out: &mut W, stop: S) -> Result<()>
where
    W: Write,
    S: Future<Output = ()>,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscriptions: Vec<_> = SyncEventKind::CHANNEL
        .into_iter()
        .map(|kind| {
            let tx = tx.clone();
            let id = client.on(kind, move |event: &SyncEvent| {
                let _ = tx.send(event.clone());
            });
            (kind, id)
        })
        .collect();
    drop(tx);

    let result = stream(client, out, &mut rx, stop).await;

    for (kind, id) in subscriptions {
        client.off(kind, id);
    }
    client.disconnect_realtime().await;
    result
}

async fn stream<W, S>(
    client: &SyncClient,
    out: &mut W,
    rx: &mut mpsc::UnboundedReceiver<SyncEvent>,
    stop: S,
) -> Result<()>
where
    W: Write,
    S: Future<Output = ()>,
{
    match client.connect_realtime().await {
        Ok(()) => {}
        // The channel keeps retrying on its own.
        Err(SyncError::Channel(e)) => warn!(error = %e, "initial realtime connect failed"),
        Err(e) => return Err(e.into()),
    }

    tokio::pin!(stop);
    loop {
        tokio::select! {
            _ = &mut stop => return Ok(()),
            event = rx.recv() => {
                let Some(event) = event else {
                    return Ok(());
                };
                writeln!(out, "{event}")?;
                out.flush()?;
                if let SyncEvent::Error(ChannelFault::ReconnectExhausted { attempts }) = event {
                    return Err(Error::RealtimeLost { attempts });
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
