//! In-memory tenant directory: guild id → optional channel id.
//!
//! Seeded from the `[[tenants]]` config tables and mutable at runtime; every
//! lookup reads the current value, nothing is cached by the dispatcher.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use crate::config::relay::TenantCfg;
use crate::notify::{Destination, TenantDirectory, TenantId};

#[derive(Debug, Default)]
pub struct StaticTenants {
    inner: RwLock<BTreeMap<TenantId, Option<Destination>>>,
}

impl StaticTenants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(tenants: &[TenantCfg]) -> Self {
        let map = tenants
            .iter()
            .filter(|t| !t.id.trim().is_empty())
            .map(|t| {
                let dest = t
                    .channel_id
                    .as_deref()
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(|c| Destination(c.to_string()));
                (TenantId(t.id.trim().to_string()), dest)
            })
            .collect();
        Self {
            inner: RwLock::new(map),
        }
    }

    /// Insert or update a tenant. `None` keeps the tenant but unsubscribes it.
    pub fn set_destination(&self, tenant: TenantId, destination: Option<Destination>) {
        self.inner.write().insert(tenant, destination);
    }

    pub fn remove(&self, tenant: &TenantId) -> bool {
        self.inner.write().remove(tenant).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn configured(&self) -> usize {
        self.inner.read().values().filter(|d| d.is_some()).count()
    }
}

#[async_trait]
impl TenantDirectory for StaticTenants {
    async fn tenants(&self) -> anyhow::Result<Vec<TenantId>> {
        Ok(self.inner.read().keys().cloned().collect())
    }

    async fn destination_for(&self, tenant: &TenantId) -> anyhow::Result<Option<Destination>> {
        Ok(self.inner.read().get(tenant).cloned().flatten())
    }
}
