//! Side effects applied when a component changes rung.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bastion_types::{ComponentId, DegradationLevel};
use parking_lot::Mutex;

use crate::error::{DegradationError, Result};
use crate::policy::Mitigation;

/// Applies and lifts mitigations on behalf of the orchestrator.
///
/// Called after the level change is committed; a failure is logged and
/// reported as an event but never rolls the level back.
#[async_trait]
pub trait MitigationHandler: Send + Sync {
    /// Activate mitigations newly required at `level`.
    async fn apply(
        &self,
        component: ComponentId,
        level: DegradationLevel,
        mitigations: &[Mitigation],
    ) -> Result<()>;

    /// Deactivate mitigations no longer required.
    async fn lift(&self, component: ComponentId, mitigations: &[Mitigation]) -> Result<()>;
}

/// Handler that only logs.
#[derive(Debug, Default)]
pub struct LoggingMitigationHandler;

#[async_trait]
impl MitigationHandler for LoggingMitigationHandler {
    async fn apply(
        &self,
        component: ComponentId,
        level: DegradationLevel,
        mitigations: &[Mitigation],
    ) -> Result<()> {
        for mitigation in mitigations {
            tracing::info!(
                component = %component,
                level = %level,
                mitigation = %mitigation,
                "Mitigation applied"
            );
        }
        Ok(())
    }

    async fn lift(&self, component: ComponentId, mitigations: &[Mitigation]) -> Result<()> {
        for mitigation in mitigations {
            tracing::info!(component = %component, mitigation = %mitigation, "Mitigation lifted");
        }
        Ok(())
    }
}

/// One call observed by [`RecordingMitigationHandler`].
#[derive(Debug, Clone, PartialEq)]
pub enum MitigationCall {
    Apply {
        component: ComponentId,
        level: DegradationLevel,
        mitigations: Vec<Mitigation>,
    },
    Lift {
        component: ComponentId,
        mitigations: Vec<Mitigation>,
    },
}

/// Handler that remembers every call (for testing).
#[derive(Debug, Default)]
pub struct RecordingMitigationHandler {
    calls: Mutex<Vec<MitigationCall>>,
}

impl RecordingMitigationHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<MitigationCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl MitigationHandler for RecordingMitigationHandler {
    async fn apply(
        &self,
        component: ComponentId,
        level: DegradationLevel,
        mitigations: &[Mitigation],
    ) -> Result<()> {
        self.calls.lock().push(MitigationCall::Apply {
            component,
            level,
            mitigations: mitigations.to_vec(),
        });
        Ok(())
    }

    async fn lift(&self, component: ComponentId, mitigations: &[Mitigation]) -> Result<()> {
        self.calls.lock().push(MitigationCall::Lift {
            component,
            mitigations: mitigations.to_vec(),
        });
        Ok(())
    }
}

/// Handler that always fails (for testing).
#[derive(Debug, Default)]
pub struct FailingMitigationHandler {
    attempts: AtomicU64,
}

impl FailingMitigationHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MitigationHandler for FailingMitigationHandler {
    async fn apply(
        &self,
        component: ComponentId,
        _level: DegradationLevel,
        mitigations: &[Mitigation],
    ) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        Err(DegradationError::MitigationFailed {
            component,
            mitigation: mitigations
                .first()
                .map(ToString::to_string)
                .unwrap_or_default(),
            reason: "handler unavailable".into(),
        })
    }

    async fn lift(&self, component: ComponentId, mitigations: &[Mitigation]) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        Err(DegradationError::MitigationFailed {
            component,
            mitigation: mitigations
                .first()
                .map(ToString::to_string)
                .unwrap_or_default(),
            reason: "handler unavailable".into(),
        })
    }
}
