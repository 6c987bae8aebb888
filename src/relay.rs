//! Pipeline orchestrator: streams → ingest filter → fanout.
//!
//! Every stream is forwarded into one channel and a single loop runs the filter,
//! so items from the comment and post streams are processed one at a time.
//! Each accepted payload is dispatched on its own task; a slow destination
//! never holds up the next item.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::ingest::dedup::SeenCache;
use crate::ingest::stream::ItemStream;
use crate::ingest::types::RawItem;
use crate::ingest::{IngestFilter, Rejection};
use crate::notify::{DispatchReport, Dispatcher};

#[derive(Debug, Default)]
pub struct RelayStats {
    received: AtomicU64,
    malformed: AtomicU64,
    unknown_author: AtomicU64,
    duplicate: AtomicU64,
    accepted: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    stream_errors: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub received: u64,
    pub malformed: u64,
    pub unknown_author: u64,
    pub duplicate: u64,
    pub accepted: u64,
    pub delivered: u64,
    pub failed: u64,
    pub stream_errors: u64,
    pub seen_ids: usize,
}

impl RelayStats {
    fn record_rejection(&self, r: Rejection) {
        let slot = match r {
            Rejection::Malformed => &self.malformed,
            Rejection::UnknownAuthor => &self.unknown_author,
            Rejection::Duplicate => &self.duplicate,
        };
        slot.fetch_add(1, Ordering::Relaxed);
    }

    fn record_dispatch(&self, report: &DispatchReport) {
        self.delivered
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.failed.fetch_add(report.failed as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self, seen_ids: usize) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            unknown_author: self.unknown_author.load(Ordering::Relaxed),
            duplicate: self.duplicate.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            stream_errors: self.stream_errors.load(Ordering::Relaxed),
            seen_ids,
        }
    }
}

enum RelayEvent {
    Item(RawItem),
    StreamError {
        stream: &'static str,
        error: anyhow::Error,
    },
}

pub struct Relay {
    filter: IngestFilter,
    dispatcher: Arc<Dispatcher>,
    stats: Arc<RelayStats>,
}

impl Relay {
    pub fn new(filter: IngestFilter, dispatcher: Dispatcher) -> Self {
        Self {
            filter,
            dispatcher: Arc::new(dispatcher),
            stats: Arc::new(RelayStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<RelayStats> {
        Arc::clone(&self.stats)
    }

    pub fn seen_cache(&self) -> Arc<SeenCache> {
        Arc::clone(self.filter.seen_cache())
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot(self.filter.seen_cache().len())
    }

    /// Filter one item; if accepted, start its fanout and return the handle.
    pub fn ingest(&self, item: RawItem) -> Option<JoinHandle<DispatchReport>> {
        self.stats.received.fetch_add(1, Ordering::Relaxed);
        match self.filter.process(item) {
            Ok(payload) => {
                self.stats.accepted.fetch_add(1, Ordering::Relaxed);
                let dispatcher = Arc::clone(&self.dispatcher);
                let stats = Arc::clone(&self.stats);
                Some(tokio::spawn(async move {
                    let report = dispatcher.dispatch(&payload).await;
                    stats.record_dispatch(&report);
                    report
                }))
            }
            Err(rejection) => {
                self.stats.record_rejection(rejection);
                None
            }
        }
    }

    /// Consume every stream until all of them have closed. In-flight fanouts
    /// are left running.
    pub async fn run(&self, streams: Vec<ItemStream>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        for stream in streams {
            tokio::spawn(forward(stream, tx.clone()));
        }
        drop(tx);

        while let Some(event) = rx.recv().await {
            match event {
                RelayEvent::Item(item) => {
                    self.ingest(item);
                }
                RelayEvent::StreamError { stream, error } => {
                    self.stats.stream_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(target: "relay", stream, error = format!("{error:#}"), "stream error");
                }
            }
        }
        tracing::info!(target: "relay", "all streams closed; relay stopped");
    }
}

async fn forward(mut stream: ItemStream, tx: mpsc::UnboundedSender<RelayEvent>) {
    let name = stream.name;
    let mut items_open = true;
    let mut errors_open = true;

    while items_open || errors_open {
        tokio::select! {
            item = stream.items.recv(), if items_open => match item {
                Some(item) => {
                    if tx.send(RelayEvent::Item(item)).is_err() {
                        return;
                    }
                }
                None => items_open = false,
            },
            error = stream.errors.recv(), if errors_open => match error {
                Some(error) => {
                    if tx.send(RelayEvent::StreamError { stream: name, error }).is_err() {
                        return;
                    }
                }
                None => errors_open = false,
            },
        }
    }
    tracing::info!(target: "relay", stream = name, "stream closed");
}
