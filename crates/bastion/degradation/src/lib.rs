//! Bastion Degradation - component health ladder
//!
//! Turns per-component metric windows into a degradation level, applies the
//! level's mitigations and decides when a component may recover.
//!
//! ## Flow
//!
//! 1. Samples arrive by push (`record_sample`) or pull (`collect_metrics`).
//! 2. `assess` averages the recent window and evaluates the component's
//!    [`TriggerThresholds`]; the highest breached rung wins.
//! 3. Escalation and step-down happen immediately. Returning to `None`
//!    requires the recovery timeout (with backoff) and a run of healthy
//!    samples.
//! 4. Operators may pin a component with `force_degradation`; pinned
//!    components are never lowered by assessment nor touched by sweeps.
//!
//! Every transition is published on the [`EventBus`](bastion_observability::EventBus)
//! for audit and alerting subscribers.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod mitigation;
pub mod orchestrator;
pub mod policy;
pub mod samples;
pub mod source;
pub mod state;

pub use config::DegradationConfig;
pub use error::{DegradationError, Result};
pub use mitigation::{
    FailingMitigationHandler, LoggingMitigationHandler, MitigationCall, MitigationHandler,
    RecordingMitigationHandler,
};
pub use orchestrator::{DegradationOrchestrator, DegradationResult, RecoveryCheck};
pub use policy::{
    Breach, ComponentPolicy, Fallback, FallbackPolicy, LevelActions, LevelDecision, Mitigation,
    NotificationPolicy, PolicyPatch, RecoveryPolicy, ThresholdLadder, TriggerThresholds,
};
pub use samples::SampleStore;
pub use source::{FnMetricSource, MetricSource, StaticMetricSource};
pub use state::{
    Alert, ComponentMetrics, ComponentState, SystemMetrics, SystemState, TransitionRecord,
    TransitionTrigger,
};
