//! Pull-based metric collection.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bastion_types::{ComponentId, MetricSnapshot};
use parking_lot::RwLock;

use crate::error::{DegradationError, Result};

/// Something that can report a component's current metrics.
#[async_trait]
pub trait MetricSource: Send + Sync {
    async fn collect(&self, component: ComponentId) -> Result<MetricSnapshot>;
}

type MetricReader = dyn Fn(ComponentId) -> Result<MetricSnapshot> + Send + Sync;

/// Source backed by a closure, for wiring in an existing collector.
pub struct FnMetricSource {
    reader: Arc<MetricReader>,
}

impl FnMetricSource {
    pub fn new<F>(reader: F) -> Self
    where
        F: Fn(ComponentId) -> Result<MetricSnapshot> + Send + Sync + 'static,
    {
        Self {
            reader: Arc::new(reader),
        }
    }
}

#[async_trait]
impl MetricSource for FnMetricSource {
    async fn collect(&self, component: ComponentId) -> Result<MetricSnapshot> {
        (self.reader)(component)
    }
}

/// Source returning whatever reading was last set per component.
#[derive(Debug, Default)]
pub struct StaticMetricSource {
    readings: RwLock<HashMap<ComponentId, MetricSnapshot>>,
}

impl StaticMetricSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, component: ComponentId, metrics: MetricSnapshot) {
        self.readings.write().insert(component, metrics);
    }

    pub fn clear(&self, component: ComponentId) {
        self.readings.write().remove(&component);
    }
}

#[async_trait]
impl MetricSource for StaticMetricSource {
    async fn collect(&self, component: ComponentId) -> Result<MetricSnapshot> {
        self.readings
            .read()
            .get(&component)
            .copied()
            .ok_or(DegradationError::SourceUnavailable(component))
    }
}
