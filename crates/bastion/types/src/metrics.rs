//! Metric readings consumed by the degradation engine.
//!
//! Values arrive in comparable units from an external collector; no unit
//! conversion happens here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the five monitored signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricDimension {
    ErrorRate,
    ResponseTime,
    Memory,
    Cpu,
    QueueDepth,
}

impl MetricDimension {
    pub const ALL: [MetricDimension; 5] = [
        MetricDimension::ErrorRate,
        MetricDimension::ResponseTime,
        MetricDimension::Memory,
        MetricDimension::Cpu,
        MetricDimension::QueueDepth,
    ];
}

impl fmt::Display for MetricDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricDimension::ErrorRate => "error_rate",
            MetricDimension::ResponseTime => "response_time_ms",
            MetricDimension::Memory => "memory_percent",
            MetricDimension::Cpu => "cpu_percent",
            MetricDimension::QueueDepth => "queue_depth",
        };
        f.write_str(name)
    }
}

/// A single reading of all five dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricSnapshot {
    /// Failed requests as a percentage (0-100).
    pub error_rate: f64,
    /// Mean response time in milliseconds.
    pub response_time_ms: f64,
    /// Memory utilisation percentage.
    pub memory_percent: f64,
    /// CPU utilisation percentage.
    pub cpu_percent: f64,
    /// Pending items in the component's work queue.
    pub queue_depth: f64,
}

impl MetricSnapshot {
    /// All-zero reading, used when nothing has been collected yet.
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn with_error_rate(mut self, value: f64) -> Self {
        self.error_rate = value;
        self
    }

    pub fn with_response_time_ms(mut self, value: f64) -> Self {
        self.response_time_ms = value;
        self
    }

    pub fn with_memory_percent(mut self, value: f64) -> Self {
        self.memory_percent = value;
        self
    }

    pub fn with_cpu_percent(mut self, value: f64) -> Self {
        self.cpu_percent = value;
        self
    }

    pub fn with_queue_depth(mut self, value: f64) -> Self {
        self.queue_depth = value;
        self
    }

    pub fn get(&self, dimension: MetricDimension) -> f64 {
        match dimension {
            MetricDimension::ErrorRate => self.error_rate,
            MetricDimension::ResponseTime => self.response_time_ms,
            MetricDimension::Memory => self.memory_percent,
            MetricDimension::Cpu => self.cpu_percent,
            MetricDimension::QueueDepth => self.queue_depth,
        }
    }

    pub fn set(&mut self, dimension: MetricDimension, value: f64) {
        match dimension {
            MetricDimension::ErrorRate => self.error_rate = value,
            MetricDimension::ResponseTime => self.response_time_ms = value,
            MetricDimension::Memory => self.memory_percent = value,
            MetricDimension::Cpu => self.cpu_percent = value,
            MetricDimension::QueueDepth => self.queue_depth = value,
        }
    }

    /// Arithmetic mean of the given readings; zero when empty.
    pub fn average<'a, I>(snapshots: I) -> Self
    where
        I: IntoIterator<Item = &'a MetricSnapshot>,
    {
        let mut sum = MetricSnapshot::zero();
        let mut count = 0usize;

        for snapshot in snapshots {
            for dimension in MetricDimension::ALL {
                sum.set(dimension, sum.get(dimension) + snapshot.get(dimension));
            }
            count += 1;
        }

        if count == 0 {
            return sum;
        }

        for dimension in MetricDimension::ALL {
            sum.set(dimension, sum.get(dimension) / count as f64);
        }
        sum
    }
}

/// A reading stamped with its collection time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub metrics: MetricSnapshot,
    pub recorded_at: DateTime<Utc>,
}

impl MetricSample {
    pub fn now(metrics: MetricSnapshot) -> Self {
        Self {
            metrics,
            recorded_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_of_nothing_is_zero() {
        let empty: Vec<MetricSnapshot> = Vec::new();
        assert_eq!(MetricSnapshot::average(&empty), MetricSnapshot::zero());
    }

    #[test]
    fn test_average_is_per_dimension() {
        let samples = vec![
            MetricSnapshot::zero().with_error_rate(10.0).with_cpu_percent(40.0),
            MetricSnapshot::zero().with_error_rate(20.0).with_cpu_percent(60.0),
        ];
        let avg = MetricSnapshot::average(&samples);
        assert_eq!(avg.error_rate, 15.0);
        assert_eq!(avg.cpu_percent, 50.0);
        assert_eq!(avg.response_time_ms, 0.0);
    }
}
