//! Error types for the degradation engine.

use bastion_types::ComponentId;
use thiserror::Error;

/// Errors raised by metric sources, mitigation handlers and configuration.
///
/// Assessment itself never fails; these surface from collaborators and are
/// logged by the orchestrator.
#[derive(Debug, Error)]
pub enum DegradationError {
    /// Metric source could not produce a reading.
    #[error("metric collection failed for {component}: {reason}")]
    MetricCollection {
        component: ComponentId,
        reason: String,
    },

    /// Metric source has nothing for this component.
    #[error("no metric source for {0}")]
    SourceUnavailable(ComponentId),

    /// A mitigation could not be applied or lifted.
    #[error("mitigation {mitigation} failed for {component}: {reason}")]
    MitigationFailed {
        component: ComponentId,
        mitigation: String,
        reason: String,
    },

    /// Engine configuration rejected.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type for degradation operations.
pub type Result<T, E = DegradationError> = std::result::Result<T, E>;
