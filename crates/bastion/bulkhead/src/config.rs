//! Bulkhead sizing.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BulkheadError, Result};

/// Limits for one (tenant, resource) bulkhead.
///
/// Negative sizes and timeouts are unrepresentable; `validate` rejects the
/// remaining impossible case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkheadConfig {
    /// Operations allowed to run at once; at least 1.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Callers allowed to wait; 0 means accept-or-reject.
    #[serde(default = "default_queue_max_depth")]
    pub queue_max_depth: usize,

    /// How long a queued caller waits for a slot.
    #[serde(
        default = "default_acquire_timeout",
        rename = "acquire_timeout_ms",
        with = "bastion_types::duration_ms"
    )]
    pub acquire_timeout: Duration,
}

fn default_max_concurrent() -> usize {
    10
}

fn default_queue_max_depth() -> usize {
    50
}

fn default_acquire_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            queue_max_depth: default_queue_max_depth(),
            acquire_timeout: default_acquire_timeout(),
        }
    }
}

impl BulkheadConfig {
    /// Build a validated config.
    pub fn new(
        max_concurrent: usize,
        queue_max_depth: usize,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let config = Self {
            max_concurrent,
            queue_max_depth,
            acquire_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            return Err(BulkheadError::InvalidConfig(
                "max_concurrent must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Registry-wide settings: a default plus per-resource overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkheadSettings {
    #[serde(default)]
    pub default: BulkheadConfig,

    #[serde(default)]
    pub resources: HashMap<String, BulkheadConfig>,
}

impl BulkheadSettings {
    pub fn new(default: BulkheadConfig) -> Self {
        Self {
            default,
            resources: HashMap::new(),
        }
    }

    pub fn with_resource(mut self, resource: impl Into<String>, config: BulkheadConfig) -> Self {
        self.resources.insert(resource.into(), config);
        self
    }

    pub fn config_for(&self, resource: &str) -> BulkheadConfig {
        self.resources.get(resource).copied().unwrap_or(self.default)
    }

    pub fn validate(&self) -> Result<()> {
        self.default.validate()?;
        for (resource, config) in &self.resources {
            config.validate().map_err(|e| match e {
                BulkheadError::InvalidConfig(reason) => {
                    BulkheadError::InvalidConfig(format!("resource {}: {}", resource, reason))
                }
                other => other,
            })?;
        }
        Ok(())
    }
}
