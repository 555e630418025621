//! Feed-side tasks: chunk reader, reply writer, keep-alive, the reply sink
//! handed to the dispatcher, and the dispatch loop itself.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use feedbridge_agent::{Dispatcher, ReplySink};
use feedbridge_channels::FeedChannel;
use feedbridge_core::BridgeError;

use crate::app::AppState;

pub const CHUNK_QUEUE: usize = 256;
pub const REPLY_QUEUE: usize = 256;

/// Queues reply lines for the writer task.
#[derive(Clone)]
pub struct FeedSink {
    tx: mpsc::Sender<String>,
}

impl FeedSink {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl ReplySink for FeedSink {
    async fn send(&self, text: &str) -> feedbridge_core::Result<()> {
        for line in text.lines() {
            self.tx
                .send(line.to_string())
                .await
                .map_err(|_| BridgeError::Transport("reply writer stopped".into()))?;
        }
        Ok(())
    }
}

/// Forward raw chunks into `tx` until EOF, a receive error, or the
/// receiver is dropped.
pub fn spawn_reader(feed: Arc<dyn FeedChannel>, tx: mpsc::Sender<Vec<u8>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match feed.recv().await {
                Ok(Some(chunk)) => {
                    if tx.send(chunk).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    info!(feed = feed.name(), "feed closed by peer");
                    break;
                }
                Err(e) => {
                    warn!(feed = feed.name(), error = %e, "feed receive failed");
                    break;
                }
            }
        }
    })
}

/// Write queued lines to the feed until every sender is dropped.
pub fn spawn_writer(feed: Arc<dyn FeedChannel>, mut rx: mpsc::Receiver<String>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if let Err(e) = feed.send_line(&line).await {
                warn!(feed = feed.name(), error = %e, "reply write failed");
            }
        }
        debug!("reply writer drained");
    })
}

/// Queue an empty line every `every` to keep the upstream session open.
pub fn spawn_keepalive(tx: mpsc::Sender<String>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(every);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // first tick completes immediately
        tick.tick().await;
        loop {
            tick.tick().await;
            if tx.send(String::new()).await.is_err() {
                break;
            }
        }
    })
}

/// Backfill the cache, then dispatch queued chunks until the feed ends,
/// `stop` resolves, or a fatal error occurs.
///
/// Every exit, a failed backfill included, returns here so the caller can run
/// the same shutdown sequence.
pub async fn drive(
    dispatcher: &mut Dispatcher,
    chunks: &mut mpsc::Receiver<Vec<u8>>,
    state: &AppState,
    backfill_limit: Option<usize>,
    stop: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    if let Err(e) = dispatcher.load_history(backfill_limit) {
        error!(code = e.code(), error = %e, "history load failed, shutting down");
        return Err(e.into());
    }

    tokio::pin!(stop);
    loop {
        tokio::select! {
            chunk = chunks.recv() => {
                let Some(chunk) = chunk else {
                    info!("feed ended, shutting down");
                    return Ok(());
                };
                match dispatcher.handle_chunk(&chunk).await {
                    Ok(0) => {}
                    Ok(n) => state.record_handled(n),
                    Err(e) if e.is_fatal() => {
                        error!(code = e.code(), error = %e, "dispatch failed, shutting down");
                        return Err(e.into());
                    }
                    Err(e) => warn!(code = e.code(), error = %e, "chunk dropped"),
                }
            }
            _ = &mut stop => {
                info!("interrupt received, shutting down");
                return Ok(());
            }
        }
    }
}
