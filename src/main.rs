//! reddit-relay binary entrypoint.
//! Serves health/stats/metrics over Axum and, in production, runs the
//! subreddit → Discord relay in the background.

use reddit_relay::api::{self, AppState};
use reddit_relay::bootstrap::RelayRuntime;
use reddit_relay::metrics::Metrics;
use reddit_relay::RelayConfig;
use shuttle_axum::ShuttleAxum;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs filtered by RUST_LOG. No-op if the runtime already installed a subscriber.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("reddit_relay=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = RelayConfig::load_default()?;
    let metrics = Metrics::install()?;

    let state = if cfg.production {
        match RelayRuntime::from_env(&cfg)? {
            Some(runtime) => {
                let state = AppState::from_relay(&runtime.relay);
                runtime.spawn();
                info!(subreddit = %cfg.reddit.subreddit, "reddit relay started");
                state
            }
            None => AppState::idle(),
        }
    } else {
        info!("non-production runtime; reddit relay disabled");
        AppState::idle()
    };

    let router = api::router(state).merge(metrics.router());
    Ok(router.into())
}
