//! Engine-wide configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DegradationError, Result};

/// Sizing and retention for the degradation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradationConfig {
    /// Samples averaged per assessment.
    #[serde(default = "default_assessment_window")]
    pub assessment_window: usize,

    /// Samples kept per component before the oldest is dropped.
    #[serde(default = "default_sample_capacity")]
    pub sample_capacity: usize,

    /// Age after which `prune_samples` discards a sample.
    #[serde(
        default = "default_sample_retention",
        rename = "sample_retention_ms",
        with = "bastion_types::duration_ms"
    )]
    pub sample_retention: Duration,

    /// Transition records kept per component.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

fn default_assessment_window() -> usize {
    10
}

fn default_sample_capacity() -> usize {
    120
}

fn default_sample_retention() -> Duration {
    Duration::from_secs(3600)
}

fn default_history_capacity() -> usize {
    50
}

impl Default for DegradationConfig {
    fn default() -> Self {
        Self {
            assessment_window: default_assessment_window(),
            sample_capacity: default_sample_capacity(),
            sample_retention: default_sample_retention(),
            history_capacity: default_history_capacity(),
        }
    }
}

impl DegradationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.assessment_window == 0 {
            return Err(DegradationError::Configuration(
                "assessment_window must be at least 1".into(),
            ));
        }
        if self.sample_capacity < self.assessment_window {
            return Err(DegradationError::Configuration(format!(
                "sample_capacity ({}) must cover assessment_window ({})",
                self.sample_capacity, self.assessment_window
            )));
        }
        Ok(())
    }
}
