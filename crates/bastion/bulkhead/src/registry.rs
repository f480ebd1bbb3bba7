//! Tenant bulkhead registry.
//!
//! One semaphore per (tenant, resource), created on first use and evicted
//! once idle. Rejections are published on the event bus before the caller
//! sees them.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bastion_observability::EventBus;
use bastion_types::{BulkheadRejection, GuardEvent, GuardEventEnvelope, TenantId};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::{BulkheadConfig, BulkheadSettings};
use crate::error::{BulkheadError, RejectionReason, Result};
use crate::semaphore::{AcquireError, BulkheadState, Semaphore};

/// Who is calling, for what, and how to correlate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkheadContext {
    pub tenant_id: TenantId,
    pub resource: String,
    pub correlation_id: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl BulkheadContext {
    pub fn new(tenant_id: impl Into<TenantId>, resource: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            resource: resource.into(),
            correlation_id: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Every live bulkhead of one tenant, keyed by resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantBulkheadState {
    pub tenant_id: TenantId,
    pub resources: BTreeMap<String, BulkheadState>,
}

type BulkheadKey = (TenantId, String);

/// Registry of per-tenant, per-resource bulkheads.
pub struct TenantBulkhead {
    settings: BulkheadSettings,
    semaphores: DashMap<BulkheadKey, Arc<Semaphore>>,
    bus: EventBus,
}

impl TenantBulkhead {
    /// Build a registry; every configured limit is validated up front.
    pub fn new(settings: BulkheadSettings, bus: EventBus) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            semaphores: DashMap::new(),
            bus,
        })
    }

    pub fn settings(&self) -> &BulkheadSettings {
        &self.settings
    }

    pub fn config_for(&self, resource: &str) -> BulkheadConfig {
        self.settings.config_for(resource)
    }

    /// Run `operation` once a slot is available.
    ///
    /// The operation's own output, including any error it returns, comes
    /// back inside `Ok`. `Err` always means admission was refused and the
    /// operation never ran. The slot is released when the operation
    /// finishes, panics, or is dropped.
    pub async fn execute<F, Fut, T>(&self, context: &BulkheadContext, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let permit = loop {
            let semaphore = self.semaphore(&context.tenant_id, &context.resource);
            match semaphore.acquire().await {
                Ok(permit) => break permit,
                Err(AcquireError::Retired) => continue,
                Err(AcquireError::Rejected(reason)) => {
                    return Err(self.reject(context, &semaphore, reason));
                }
            }
        };

        let output = operation().await;
        drop(permit);
        Ok(output)
    }

    /// State of every live bulkhead for `tenant_id`.
    pub fn get_state(&self, tenant_id: &TenantId) -> TenantBulkheadState {
        let resources = self
            .semaphores
            .iter()
            .filter(|entry| &entry.key().0 == tenant_id)
            .map(|entry| (entry.key().1.clone(), entry.value().state()))
            .collect();

        TenantBulkheadState {
            tenant_id: tenant_id.clone(),
            resources,
        }
    }

    /// State of one bulkhead, if it exists.
    pub fn state(&self, tenant_id: &TenantId, resource: &str) -> Option<BulkheadState> {
        self.semaphores
            .get(&(tenant_id.clone(), resource.to_string()))
            .map(|s| s.state())
    }

    /// Tenants with at least one live bulkhead.
    pub fn tenants(&self) -> Vec<TenantId> {
        let mut tenants: Vec<TenantId> = self.semaphores.iter().map(|e| e.key().0.clone()).collect();
        tenants.sort();
        tenants.dedup();
        tenants
    }

    pub fn len(&self) -> usize {
        self.semaphores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.semaphores.is_empty()
    }

    /// Drop bulkheads with nothing running, nothing queued and no use for
    /// `ttl`. Returns how many were evicted.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let before = self.semaphores.len();
        self.semaphores
            .retain(|_, semaphore| !semaphore.retire_if_idle(ttl, now));
        let evicted = before.saturating_sub(self.semaphores.len());
        if evicted > 0 {
            debug!(evicted, "Evicted idle bulkheads");
        }
        evicted
    }

    fn semaphore(&self, tenant_id: &TenantId, resource: &str) -> Arc<Semaphore> {
        self.semaphores
            .entry((tenant_id.clone(), resource.to_string()))
            .or_insert_with(|| Arc::new(Semaphore::new(self.settings.config_for(resource))))
            .value()
            .clone()
    }

    fn reject(
        &self,
        context: &BulkheadContext,
        semaphore: &Semaphore,
        reason: RejectionReason,
    ) -> BulkheadError {
        let state = semaphore.state();

        warn!(
            tenant_id = %context.tenant_id,
            resource = %context.resource,
            reason = %reason,
            in_flight = state.in_flight,
            queue_depth = state.queue_depth,
            correlation_id = context.correlation_id.as_deref().unwrap_or("-"),
            "Bulkhead rejected request"
        );

        let metadata = context
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();

        self.bus.publish(
            GuardEventEnvelope::new(GuardEvent::BulkheadRejected(BulkheadRejection {
                tenant_id: context.tenant_id.clone(),
                resource: context.resource.clone(),
                reason: reason.to_string(),
                in_flight: state.in_flight,
                queue_depth: state.queue_depth,
                max_concurrent: state.max_concurrent,
                queue_max_depth: state.queue_max_depth,
            }))
            .with_tenant(context.tenant_id.clone())
            .with_correlation_id(context.correlation_id.clone())
            .with_metadata(metadata),
        );

        BulkheadError::Rejected {
            tenant_id: context.tenant_id.clone(),
            resource: context.resource.clone(),
            reason,
            retry_after: semaphore.config().acquire_timeout.max(Duration::from_millis(100)),
        }
    }
}
