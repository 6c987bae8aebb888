use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if a recorder is already installed.
    pub fn install() -> Result<Self> {
        // Use default buckets to avoid API differences across crate versions.
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_described();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("stream_polls_total", "Poll cycles started, per stream.");
        describe_counter!("stream_items_total", "Raw items fetched, per stream.");
        describe_counter!(
            "stream_poll_errors_total",
            "Poll cycles that failed with a transport error."
        );
        describe_counter!(
            "stream_connect_errors_total",
            "Streams disabled because the initial connection failed."
        );
        describe_histogram!("stream_fetch_ms", "Listing fetch + parse time in milliseconds.");
        describe_counter!(
            "ingest_items_total",
            "Items seen by the ingest filter, labelled by verdict."
        );
        describe_gauge!("ingest_seen_ids", "Identifiers currently held by the dedup cache.");
        describe_counter!(
            "relay_deliveries_total",
            "Per-tenant delivery attempts, labelled by outcome."
        );
        describe_histogram!("relay_dispatch_ms", "Fanout time per payload in milliseconds.");
    });
}
