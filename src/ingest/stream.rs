// src/ingest/stream.rs
//! Background polling of one [`ItemSource`].
//!
//! Each stream owns a tokio task that ticks on its own schedule and pushes items
//! and transport errors into two unbounded channels. Nothing is dropped when the
//! consumer lags; nothing is filtered here either.

use crate::ingest::types::{ItemSource, RawItem};
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Receiving half of a running stream.
pub struct ItemStream {
    pub name: &'static str,
    pub items: mpsc::UnboundedReceiver<RawItem>,
    pub errors: mpsc::UnboundedReceiver<anyhow::Error>,
    pub handle: JoinHandle<()>,
}

/// Start polling `source` every `poll_interval`. The first poll happens right away.
pub fn spawn_stream(source: Arc<dyn ItemSource>, poll_interval: Duration) -> ItemStream {
    crate::metrics::ensure_described();
    let (item_tx, items) = mpsc::unbounded_channel();
    let (err_tx, errors) = mpsc::unbounded_channel();
    let name = source.name();
    let handle = tokio::spawn(poll_loop(source, poll_interval, item_tx, err_tx));
    ItemStream {
        name,
        items,
        errors,
        handle,
    }
}

async fn poll_loop(
    source: Arc<dyn ItemSource>,
    poll_interval: Duration,
    item_tx: mpsc::UnboundedSender<RawItem>,
    err_tx: mpsc::UnboundedSender<anyhow::Error>,
) {
    let name = source.name();

    if let Err(e) = source.connect().await {
        counter!("stream_connect_errors_total", "stream" => name).increment(1);
        tracing::error!(target: "stream", stream = name, error = ?e, "initial connection failed; stream disabled");
        let _ = err_tx.send(e.context(format!("{name}: initial connection failed")));
        return;
    }
    tracing::info!(target: "stream", stream = name, every_ms = poll_interval.as_millis() as u64, "polling started");

    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        counter!("stream_polls_total", "stream" => name).increment(1);

        match source.fetch_latest().await {
            Ok(batch) => {
                counter!("stream_items_total", "stream" => name).increment(batch.len() as u64);
                for item in batch {
                    if item_tx.send(item).is_err() {
                        tracing::debug!(target: "stream", stream = name, "consumer gone; stopping");
                        return;
                    }
                }
            }
            Err(e) => {
                counter!("stream_poll_errors_total", "stream" => name).increment(1);
                tracing::debug!(target: "stream", stream = name, error = ?e, "poll failed; retrying next tick");
                if err_tx.send(e).is_err() {
                    tracing::warn!(target: "stream", stream = name, "poll failed and nobody is listening for errors");
                }
            }
        }

        if item_tx.is_closed() {
            tracing::debug!(target: "stream", stream = name, "consumer gone; stopping");
            return;
        }
    }
}
