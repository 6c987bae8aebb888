// src/lib.rs
// Public library surface for integration tests and the binaries.

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod relay;
pub mod tenants;

// ---- Re-exports for stable public API ----
pub use crate::config::RelayConfig;
pub use crate::ingest::allowlist::{Allowlist, KnownAuthor};
pub use crate::ingest::dedup::SeenCache;
pub use crate::ingest::types::{NotificationPayload, RawItem};
pub use crate::ingest::IngestFilter;
pub use crate::notify::{Destination, Dispatcher, TenantId};
pub use crate::relay::Relay;
