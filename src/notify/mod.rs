//! Fanout of one payload to every tenant's configured destination.
//!
//! Tenant lookup and the actual send are injected ([`TenantDirectory`],
//! [`DestinationSender`]) so the dispatch rules can be exercised without a
//! chat platform:
//! - every tenant gets at most one attempt per payload, no retries;
//! - a failure (lookup, send, timeout, even a panic) stays with that tenant;
//! - failures are logged and counted, never returned to the caller.

pub mod discord;
pub mod format;
pub mod recording;

use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::ingest::types::NotificationPayload;
use format::RenderedMessage;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantId(pub String);

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque per-tenant output location (a Discord channel id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination(pub String);

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("missing permission to post in {0}")]
    Forbidden(Destination),

    #[error("destination {0} is invalid or no longer exists")]
    InvalidDestination(Destination),

    #[error("destination rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
}

impl DeliveryError {
    pub fn label(&self) -> &'static str {
        match self {
            DeliveryError::Forbidden(_) => "forbidden",
            DeliveryError::InvalidDestination(_) => "invalid_destination",
            DeliveryError::Rejected { .. } => "rejected",
            DeliveryError::Transport(_) => "transport",
            DeliveryError::Timeout(_) => "timeout",
        }
    }
}

#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn tenants(&self) -> anyhow::Result<Vec<TenantId>>;

    /// `Ok(None)` means the tenant has nothing configured.
    async fn destination_for(&self, tenant: &TenantId) -> anyhow::Result<Option<Destination>>;
}

#[async_trait]
pub trait DestinationSender: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(
        &self,
        destination: &Destination,
        message: &RenderedMessage,
    ) -> Result<(), DeliveryError>;
}

/// What happened to one payload. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub tenants: usize,
    pub skipped: usize,
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TenantOutcome {
    Skipped,
    Delivered,
    Failed,
}

pub struct Dispatcher {
    directory: Arc<dyn TenantDirectory>,
    sender: Arc<dyn DestinationSender>,
    timeout: Duration,
    max_concurrent: usize,
}

impl Dispatcher {
    pub fn new(directory: Arc<dyn TenantDirectory>, sender: Arc<dyn DestinationSender>) -> Self {
        crate::metrics::ensure_described();
        Self {
            directory,
            sender,
            timeout: Duration::from_secs(10),
            max_concurrent: 16,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Values below 1 are treated as 1 (serial delivery).
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n.max(1);
        self
    }

    pub async fn dispatch(&self, payload: &NotificationPayload) -> DispatchReport {
        let t0 = Instant::now();
        let message = Arc::new(format::render(payload));

        let tenants = match self.directory.tenants().await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(target: "fanout", error = ?e, url = %payload.url, "tenant enumeration failed; payload dropped");
                return DispatchReport::default();
            }
        };

        let mut report = DispatchReport {
            tenants: tenants.len(),
            ..Default::default()
        };
        let permits = Arc::new(Semaphore::new(self.max_concurrent));
        let mut set = JoinSet::new();

        for tenant in tenants {
            let directory = Arc::clone(&self.directory);
            let sender = Arc::clone(&self.sender);
            let message = Arc::clone(&message);
            let permits = Arc::clone(&permits);
            let timeout = self.timeout;
            set.spawn(async move {
                let _permit = permits.acquire_owned().await;
                deliver_to_tenant(&*directory, &*sender, &tenant, &message, timeout).await
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(TenantOutcome::Skipped) => report.skipped += 1,
                Ok(TenantOutcome::Delivered) => report.delivered += 1,
                Ok(TenantOutcome::Failed) => report.failed += 1,
                Err(e) => {
                    tracing::error!(target: "fanout", error = %e, "delivery task aborted");
                    counter!("relay_deliveries_total", "outcome" => "panicked").increment(1);
                    report.failed += 1;
                }
            }
        }

        histogram!("relay_dispatch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        tracing::info!(
            target: "fanout",
            url = %payload.url,
            tenants = report.tenants,
            delivered = report.delivered,
            failed = report.failed,
            skipped = report.skipped,
            "payload dispatched"
        );
        report
    }
}

async fn deliver_to_tenant(
    directory: &dyn TenantDirectory,
    sender: &dyn DestinationSender,
    tenant: &TenantId,
    message: &RenderedMessage,
    timeout: Duration,
) -> TenantOutcome {
    // The lookup is bounded by the same timeout as the send.
    let lookup = match tokio::time::timeout(timeout, directory.destination_for(tenant)).await {
        Ok(r) => r,
        Err(_) => {
            tracing::warn!(target: "fanout", %tenant, ?timeout, "destination lookup timed out");
            counter!("relay_deliveries_total", "outcome" => "lookup_timeout").increment(1);
            return TenantOutcome::Failed;
        }
    };
    let destination = match lookup {
        Ok(Some(d)) => d,
        Ok(None) => {
            counter!("relay_deliveries_total", "outcome" => "skipped").increment(1);
            return TenantOutcome::Skipped;
        }
        Err(e) => {
            tracing::warn!(target: "fanout", %tenant, error = ?e, "destination lookup failed");
            counter!("relay_deliveries_total", "outcome" => "lookup_failed").increment(1);
            return TenantOutcome::Failed;
        }
    };

    let result = match tokio::time::timeout(timeout, sender.send(&destination, message)).await {
        Ok(r) => r,
        Err(_) => Err(DeliveryError::Timeout(timeout)),
    };

    match result {
        Ok(()) => {
            tracing::debug!(target: "fanout", %tenant, %destination, sender = sender.name(), "delivered");
            counter!("relay_deliveries_total", "outcome" => "delivered").increment(1);
            TenantOutcome::Delivered
        }
        Err(e) => {
            tracing::warn!(
                target: "fanout",
                %tenant,
                %destination,
                kind = e.label(),
                error = %e,
                "delivery failed"
            );
            counter!("relay_deliveries_total", "outcome" => e.label()).increment(1);
            TenantOutcome::Failed
        }
    }
}
