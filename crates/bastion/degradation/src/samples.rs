//! Bounded per-component metric history.

use std::collections::VecDeque;

use bastion_types::{ComponentId, MetricSample, MetricSnapshot};
use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Ring buffer of samples per component.
///
/// Writers for different components never contend; each series is guarded
/// by its own map shard.
#[derive(Debug)]
pub struct SampleStore {
    capacity: usize,
    series: DashMap<ComponentId, VecDeque<MetricSample>>,
}

impl SampleStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            series: DashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a sample, dropping the oldest once at capacity.
    pub fn record(&self, component: ComponentId, sample: MetricSample) {
        let mut series = self.series.entry(component).or_default();
        if series.len() == self.capacity {
            series.pop_front();
        }
        series.push_back(sample);
    }

    /// Up to `n` most recent readings, oldest first.
    pub fn recent(&self, component: ComponentId, n: usize) -> Vec<MetricSnapshot> {
        self.series
            .get(&component)
            .map(|series| {
                let skip = series.len().saturating_sub(n);
                series.iter().skip(skip).map(|s| s.metrics).collect()
            })
            .unwrap_or_default()
    }

    pub fn latest(&self, component: ComponentId) -> Option<MetricSample> {
        self.series
            .get(&component)
            .and_then(|series| series.back().copied())
    }

    pub fn len(&self, component: ComponentId) -> usize {
        self.series.get(&component).map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, component: ComponentId) -> bool {
        self.len(component) == 0
    }

    /// Drop samples recorded before `cutoff`; returns how many went.
    pub fn prune_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut removed = 0;
        for mut series in self.series.iter_mut() {
            let before = series.len();
            series.retain(|s| s.recorded_at >= cutoff);
            removed += before - series.len();
        }
        removed
    }
}
