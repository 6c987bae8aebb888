use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};

use crate::ingest::dedup::SeenCache;
use crate::relay::{Relay, RelayStats, StatsSnapshot};

#[derive(Clone)]
pub struct AppState {
    stats: Arc<RelayStats>,
    seen: Arc<SeenCache>,
}

impl AppState {
    pub fn from_relay(relay: &Relay) -> Self {
        Self {
            stats: relay.stats(),
            seen: relay.seen_cache(),
        }
    }

    /// State for a process where the relay is disabled: all counters stay at zero.
    pub fn idle() -> Self {
        Self {
            stats: Arc::new(RelayStats::default()),
            seen: Arc::new(SeenCache::unbounded()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/stats", get(stats))
        .with_state(state)
}

async fn stats(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.stats.snapshot(state.seen.len()))
}
