//! Degradation policy table.
//!
//! Each component carries its own thresholds, mitigations, fallbacks and
//! recovery rules. Level selection reads nothing but this table.

use std::time::Duration;

use bastion_types::{ComponentId, DegradationLevel, MetricDimension, MetricSnapshot};
use serde::{Deserialize, Serialize};

/// Entry thresholds for one metric dimension, one per degraded rung.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdLadder {
    pub read_only: f64,
    pub partial: f64,
    pub minimal: f64,
    pub emergency: f64,
}

impl ThresholdLadder {
    pub const fn new(read_only: f64, partial: f64, minimal: f64, emergency: f64) -> Self {
        Self {
            read_only,
            partial,
            minimal,
            emergency,
        }
    }

    /// Entry threshold of a rung; `None` for the healthy rung.
    pub fn threshold(&self, level: DegradationLevel) -> Option<f64> {
        match level {
            DegradationLevel::None => None,
            DegradationLevel::ReadOnly => Some(self.read_only),
            DegradationLevel::Partial => Some(self.partial),
            DegradationLevel::Minimal => Some(self.minimal),
            DegradationLevel::Emergency => Some(self.emergency),
        }
    }

    /// Highest rung whose threshold `value` meets or exceeds.
    ///
    /// Monotone in `value` for any ladder, ordered or not. NaN breaches
    /// nothing.
    pub fn level_for(&self, value: f64) -> DegradationLevel {
        if value.is_nan() {
            return DegradationLevel::None;
        }

        DegradationLevel::ALL
            .into_iter()
            .filter(|level| {
                self.threshold(*level)
                    .is_some_and(|threshold| value >= threshold)
            })
            .max()
            .unwrap_or(DegradationLevel::None)
    }
}

/// A single threshold crossing found during evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Breach {
    pub dimension: MetricDimension,
    pub value: f64,
    pub threshold: f64,
    pub level: DegradationLevel,
}

/// Candidate level and the crossings that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelDecision {
    pub level: DegradationLevel,
    pub breaches: Vec<Breach>,
}

impl LevelDecision {
    /// Human-readable summary, e.g. `error_rate=15.00>=10.00`.
    pub fn reason(&self) -> String {
        if self.breaches.is_empty() {
            return "all metrics within thresholds".to_string();
        }
        self.breaches
            .iter()
            .map(|b| format!("{}={:.2}>={:.2}", b.dimension, b.value, b.threshold))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Trigger thresholds for the five metric dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerThresholds {
    pub error_rate: ThresholdLadder,
    pub response_time_ms: ThresholdLadder,
    pub memory_percent: ThresholdLadder,
    pub cpu_percent: ThresholdLadder,
    /// Only components with a work queue carry this ladder.
    #[serde(default)]
    pub queue_depth: Option<ThresholdLadder>,
}

impl Default for TriggerThresholds {
    fn default() -> Self {
        Self {
            error_rate: ThresholdLadder::new(5.0, 10.0, 25.0, 50.0),
            response_time_ms: ThresholdLadder::new(500.0, 1000.0, 2000.0, 5000.0),
            memory_percent: ThresholdLadder::new(25.0, 50.0, 75.0, 90.0),
            cpu_percent: ThresholdLadder::new(25.0, 50.0, 75.0, 90.0),
            queue_depth: None,
        }
    }
}

impl TriggerThresholds {
    pub fn ladder(&self, dimension: MetricDimension) -> Option<&ThresholdLadder> {
        match dimension {
            MetricDimension::ErrorRate => Some(&self.error_rate),
            MetricDimension::ResponseTime => Some(&self.response_time_ms),
            MetricDimension::Memory => Some(&self.memory_percent),
            MetricDimension::Cpu => Some(&self.cpu_percent),
            MetricDimension::QueueDepth => self.queue_depth.as_ref(),
        }
    }

    /// Evaluate every dimension independently; the highest rung wins.
    pub fn evaluate(&self, metrics: &MetricSnapshot) -> LevelDecision {
        let mut breaches = Vec::new();

        for dimension in MetricDimension::ALL {
            let Some(ladder) = self.ladder(dimension) else {
                continue;
            };
            let value = metrics.get(dimension);
            let level = ladder.level_for(value);
            if let Some(threshold) = ladder.threshold(level) {
                breaches.push(Breach {
                    dimension,
                    value,
                    threshold,
                    level,
                });
            }
        }

        let level = breaches
            .iter()
            .map(|b| b.level)
            .max()
            .unwrap_or(DegradationLevel::None);

        LevelDecision { level, breaches }
    }
}

/// A mitigation toggled while a component is degraded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mitigation {
    /// Reject writes, keep serving reads.
    ReadOnlyMode,
    /// Switch off a named feature.
    DisableFeature { feature: String },
    /// Cap request throughput.
    RateLimit { requests_per_second: u32 },
    /// Postpone batch and background work.
    DeferBackgroundJobs,
    /// Drop traffic not marked critical.
    ShedNonCriticalTraffic,
}

impl Mitigation {
    pub fn disable(feature: impl Into<String>) -> Self {
        Mitigation::DisableFeature {
            feature: feature.into(),
        }
    }
}

impl std::fmt::Display for Mitigation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mitigation::ReadOnlyMode => write!(f, "read_only_mode"),
            Mitigation::DisableFeature { feature } => write!(f, "disable_feature:{}", feature),
            Mitigation::RateLimit {
                requests_per_second,
            } => write!(f, "rate_limit:{}rps", requests_per_second),
            Mitigation::DeferBackgroundJobs => write!(f, "defer_background_jobs"),
            Mitigation::ShedNonCriticalTraffic => write!(f, "shed_non_critical_traffic"),
        }
    }
}

/// Mitigations introduced at each rung.
///
/// A level activates its own list plus those of every lower rung.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelActions {
    #[serde(default)]
    pub read_only: Vec<Mitigation>,
    #[serde(default)]
    pub partial: Vec<Mitigation>,
    #[serde(default)]
    pub minimal: Vec<Mitigation>,
    #[serde(default)]
    pub emergency: Vec<Mitigation>,
}

impl LevelActions {
    pub fn rung(&self, level: DegradationLevel) -> &[Mitigation] {
        match level {
            DegradationLevel::None => &[],
            DegradationLevel::ReadOnly => &self.read_only,
            DegradationLevel::Partial => &self.partial,
            DegradationLevel::Minimal => &self.minimal,
            DegradationLevel::Emergency => &self.emergency,
        }
    }

    /// Cumulative, de-duplicated mitigations active at `level`.
    pub fn active_at(&self, level: DegradationLevel) -> Vec<Mitigation> {
        let mut active: Vec<Mitigation> = Vec::new();
        for rung in DegradationLevel::ALL.into_iter().filter(|l| *l <= level) {
            for mitigation in self.rung(rung) {
                if !active.contains(mitigation) {
                    active.push(mitigation.clone());
                }
            }
        }
        active
    }
}

/// A fallback path callers may take while a component is degraded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fallback {
    UseCache,
    SimplifyResponses,
    ServeStatic,
    AlternateProvider { provider: String },
}

/// Fallback flags for a component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FallbackPolicy {
    #[serde(default)]
    pub use_cache: bool,
    #[serde(default)]
    pub simplify_responses: bool,
    #[serde(default)]
    pub serve_static: bool,
    #[serde(default)]
    pub alternate_provider: Option<String>,
}

impl FallbackPolicy {
    pub fn active(&self) -> Vec<Fallback> {
        let mut fallbacks = Vec::new();
        if self.use_cache {
            fallbacks.push(Fallback::UseCache);
        }
        if self.simplify_responses {
            fallbacks.push(Fallback::SimplifyResponses);
        }
        if self.serve_static {
            fallbacks.push(Fallback::ServeStatic);
        }
        if let Some(provider) = &self.alternate_provider {
            fallbacks.push(Fallback::AlternateProvider {
                provider: provider.clone(),
            });
        }
        fallbacks
    }
}

/// Rules for returning a component to `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryPolicy {
    /// Whether the component may be recovered without operator input.
    pub auto_recovery: bool,

    /// Minimum time spent degraded before recovery is considered.
    #[serde(rename = "recovery_timeout_ms", with = "bastion_types::duration_ms")]
    pub recovery_timeout: Duration,

    /// Failed recovery checks tolerated before sweeps stop trying.
    pub max_retries: u32,

    /// Growth factor of the timeout per failed check.
    pub backoff_multiplier: f64,

    /// Exit threshold for error rate (strictly below).
    pub healthy_error_rate: f64,

    /// Exit threshold for response time (strictly below).
    pub healthy_response_time_ms: f64,

    /// Number of most recent samples that must all be healthy.
    pub healthy_window: usize,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            auto_recovery: true,
            recovery_timeout: Duration::from_secs(60),
            max_retries: 5,
            backoff_multiplier: 1.5,
            healthy_error_rate: 5.0,
            healthy_response_time_ms: 1000.0,
            healthy_window: 5,
        }
    }
}

impl RecoveryPolicy {
    /// Time a component must stay degraded after `attempts` failed checks.
    pub fn required_wait(&self, attempts: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(attempts as i32);
        Duration::try_from_secs_f64(self.recovery_timeout.as_secs_f64() * factor)
            .unwrap_or(Duration::MAX)
    }

    /// Whether every sample sits below the exit thresholds.
    ///
    /// An empty slice counts as healthy.
    pub fn samples_are_healthy(&self, samples: &[MetricSnapshot]) -> bool {
        samples.iter().all(|s| {
            s.error_rate < self.healthy_error_rate
                && s.response_time_ms < self.healthy_response_time_ms
        })
    }
}

/// Who hears about a degradation, and from which rung on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPolicy {
    pub enabled: bool,
    pub min_level: DegradationLevel,
    #[serde(default)]
    pub channels: Vec<String>,
}

impl Default for NotificationPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            min_level: DegradationLevel::Partial,
            channels: vec!["ops".to_string()],
        }
    }
}

impl NotificationPolicy {
    pub fn should_alert(&self, level: DegradationLevel) -> bool {
        self.enabled && level.is_degraded() && level >= self.min_level
    }
}

/// Complete policy for one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentPolicy {
    pub component: ComponentId,
    pub triggers: TriggerThresholds,
    pub actions: LevelActions,
    pub fallbacks: FallbackPolicy,
    pub recovery: RecoveryPolicy,
    pub notification: NotificationPolicy,
}

impl ComponentPolicy {
    /// Built-in policy table entry for a component.
    pub fn default_for(component: ComponentId) -> Self {
        let mut policy = Self {
            component,
            triggers: TriggerThresholds::default(),
            actions: LevelActions::default(),
            fallbacks: FallbackPolicy::default(),
            recovery: RecoveryPolicy::default(),
            notification: NotificationPolicy::default(),
        };

        match component {
            ComponentId::Database => {
                policy.actions = LevelActions {
                    read_only: vec![Mitigation::ReadOnlyMode],
                    partial: vec![Mitigation::disable("reports"), Mitigation::DeferBackgroundJobs],
                    minimal: vec![Mitigation::RateLimit {
                        requests_per_second: 200,
                    }],
                    emergency: vec![Mitigation::ShedNonCriticalTraffic],
                };
                policy.fallbacks.use_cache = true;
                policy.fallbacks.simplify_responses = true;
            }
            ComponentId::Auth => {
                policy.actions = LevelActions {
                    read_only: vec![Mitigation::disable("signup")],
                    partial: vec![Mitigation::disable("password_reset")],
                    minimal: vec![Mitigation::RateLimit {
                        requests_per_second: 50,
                    }],
                    emergency: vec![Mitigation::ShedNonCriticalTraffic],
                };
                policy.fallbacks.use_cache = true;
                policy.recovery.recovery_timeout = Duration::from_secs(120);
                policy.recovery.max_retries = 3;
                policy.notification.min_level = DegradationLevel::ReadOnly;
            }
            ComponentId::Billing => {
                policy.actions = LevelActions {
                    read_only: vec![Mitigation::disable("plan_changes")],
                    partial: vec![Mitigation::DeferBackgroundJobs],
                    minimal: vec![Mitigation::disable("invoicing")],
                    emergency: vec![Mitigation::ReadOnlyMode],
                };
                policy.fallbacks.serve_static = true;
                policy.recovery.recovery_timeout = Duration::from_secs(300);
            }
            ComponentId::Audit => {
                policy.actions = LevelActions {
                    read_only: vec![Mitigation::DeferBackgroundJobs],
                    partial: vec![Mitigation::disable("audit_export")],
                    minimal: vec![Mitigation::disable("audit_search")],
                    emergency: vec![Mitigation::ShedNonCriticalTraffic],
                };
            }
            ComponentId::Api => {
                policy.actions = LevelActions {
                    read_only: vec![Mitigation::RateLimit {
                        requests_per_second: 1000,
                    }],
                    partial: vec![Mitigation::disable("search")],
                    minimal: vec![Mitigation::RateLimit {
                        requests_per_second: 200,
                    }],
                    emergency: vec![Mitigation::ShedNonCriticalTraffic],
                };
                policy.fallbacks.use_cache = true;
                policy.fallbacks.simplify_responses = true;
            }
            ComponentId::Queue => {
                policy.triggers.queue_depth =
                    Some(ThresholdLadder::new(500.0, 1000.0, 5000.0, 10000.0));
                policy.actions = LevelActions {
                    read_only: vec![Mitigation::DeferBackgroundJobs],
                    partial: vec![Mitigation::RateLimit {
                        requests_per_second: 500,
                    }],
                    minimal: vec![Mitigation::disable("bulk_import")],
                    emergency: vec![Mitigation::ShedNonCriticalTraffic],
                };
            }
            ComponentId::Cache => {
                policy.actions = LevelActions {
                    read_only: vec![],
                    partial: vec![Mitigation::disable("cache_warming")],
                    minimal: vec![Mitigation::DeferBackgroundJobs],
                    emergency: vec![Mitigation::ShedNonCriticalTraffic],
                };
                policy.recovery.recovery_timeout = Duration::from_secs(30);
            }
            ComponentId::External => {
                policy.actions = LevelActions {
                    read_only: vec![],
                    partial: vec![Mitigation::disable("third_party_enrichment")],
                    minimal: vec![Mitigation::disable("webhooks")],
                    emergency: vec![Mitigation::ShedNonCriticalTraffic],
                };
                policy.fallbacks.serve_static = true;
                policy.fallbacks.alternate_provider = Some("secondary".to_string());
            }
        }

        policy
    }

    /// Merge an operator patch; returns the names of fields that changed.
    pub fn apply_patch(&mut self, patch: &PolicyPatch) -> Vec<String> {
        let mut changed = Vec::new();

        macro_rules! merge {
            ($field:expr, $value:expr, $name:literal) => {
                if let Some(value) = $value {
                    if $field != *value {
                        $field = value.clone();
                        changed.push($name.to_string());
                    }
                }
            };
        }

        merge!(self.triggers.error_rate, &patch.error_rate, "error_rate");
        merge!(
            self.triggers.response_time_ms,
            &patch.response_time_ms,
            "response_time_ms"
        );
        merge!(
            self.triggers.memory_percent,
            &patch.memory_percent,
            "memory_percent"
        );
        merge!(self.triggers.cpu_percent, &patch.cpu_percent, "cpu_percent");
        if let Some(ladder) = &patch.queue_depth {
            if self.triggers.queue_depth.as_ref() != Some(ladder) {
                self.triggers.queue_depth = Some(*ladder);
                changed.push("queue_depth".to_string());
            }
        }
        merge!(self.actions, &patch.actions, "actions");
        merge!(self.fallbacks, &patch.fallbacks, "fallbacks");
        merge!(
            self.recovery.auto_recovery,
            &patch.auto_recovery,
            "auto_recovery"
        );
        if let Some(ms) = patch.recovery_timeout_ms {
            let timeout = Duration::from_millis(ms);
            if self.recovery.recovery_timeout != timeout {
                self.recovery.recovery_timeout = timeout;
                changed.push("recovery_timeout_ms".to_string());
            }
        }
        merge!(self.recovery.max_retries, &patch.max_retries, "max_retries");
        merge!(
            self.recovery.backoff_multiplier,
            &patch.backoff_multiplier,
            "backoff_multiplier"
        );
        merge!(self.notification, &patch.notification, "notification");

        changed
    }
}

/// Partial policy accepted by `configure`; absent fields stay untouched.
///
/// Threshold values are taken as given, without bounds checks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyPatch {
    pub error_rate: Option<ThresholdLadder>,
    pub response_time_ms: Option<ThresholdLadder>,
    pub memory_percent: Option<ThresholdLadder>,
    pub cpu_percent: Option<ThresholdLadder>,
    pub queue_depth: Option<ThresholdLadder>,
    pub actions: Option<LevelActions>,
    pub fallbacks: Option<FallbackPolicy>,
    pub auto_recovery: Option<bool>,
    pub recovery_timeout_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub backoff_multiplier: Option<f64>,
    pub notification: Option<NotificationPolicy>,
}

impl PolicyPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error_rate(mut self, ladder: ThresholdLadder) -> Self {
        self.error_rate = Some(ladder);
        self
    }

    pub fn response_time_ms(mut self, ladder: ThresholdLadder) -> Self {
        self.response_time_ms = Some(ladder);
        self
    }

    pub fn memory_percent(mut self, ladder: ThresholdLadder) -> Self {
        self.memory_percent = Some(ladder);
        self
    }

    pub fn cpu_percent(mut self, ladder: ThresholdLadder) -> Self {
        self.cpu_percent = Some(ladder);
        self
    }

    pub fn queue_depth(mut self, ladder: ThresholdLadder) -> Self {
        self.queue_depth = Some(ladder);
        self
    }

    pub fn actions(mut self, actions: LevelActions) -> Self {
        self.actions = Some(actions);
        self
    }

    pub fn fallbacks(mut self, fallbacks: FallbackPolicy) -> Self {
        self.fallbacks = Some(fallbacks);
        self
    }

    pub fn auto_recovery(mut self, enabled: bool) -> Self {
        self.auto_recovery = Some(enabled);
        self
    }

    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = Some(multiplier);
        self
    }

    pub fn notification(mut self, notification: NotificationPolicy) -> Self {
        self.notification = Some(notification);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_ladder_reproduces_reference_table() {
        let triggers = TriggerThresholds::default();
        let cases = [
            (MetricSnapshot::zero().with_error_rate(4.9), DegradationLevel::None),
            (MetricSnapshot::zero().with_error_rate(5.0), DegradationLevel::ReadOnly),
            (MetricSnapshot::zero().with_error_rate(15.0), DegradationLevel::Partial),
            (MetricSnapshot::zero().with_response_time_ms(2000.0), DegradationLevel::Minimal),
            (MetricSnapshot::zero().with_memory_percent(90.0), DegradationLevel::Emergency),
            (MetricSnapshot::zero().with_cpu_percent(74.9), DegradationLevel::Partial),
        ];

        for (metrics, expected) in cases {
            assert_eq!(triggers.evaluate(&metrics).level, expected, "{:?}", metrics);
        }
    }

    #[test]
    fn test_highest_dimension_wins() {
        let metrics = MetricSnapshot::zero()
            .with_error_rate(6.0)
            .with_cpu_percent(80.0);
        let decision = TriggerThresholds::default().evaluate(&metrics);

        assert_eq!(decision.level, DegradationLevel::Minimal);
        assert_eq!(decision.breaches.len(), 2);
        assert!(decision.reason().contains("cpu_percent=80.00>=75.00"));
    }

    #[test]
    fn test_queue_depth_only_counts_for_queue() {
        let metrics = MetricSnapshot::zero().with_queue_depth(20_000.0);
        let api = ComponentPolicy::default_for(ComponentId::Api);
        let queue = ComponentPolicy::default_for(ComponentId::Queue);

        assert_eq!(api.triggers.evaluate(&metrics).level, DegradationLevel::None);
        assert_eq!(
            queue.triggers.evaluate(&metrics).level,
            DegradationLevel::Emergency
        );
    }

    #[test]
    fn test_actions_accumulate_up_the_ladder() {
        let policy = ComponentPolicy::default_for(ComponentId::Database);
        let partial = policy.actions.active_at(DegradationLevel::Partial);

        assert_eq!(partial.len(), 3);
        assert_eq!(partial[0], Mitigation::ReadOnlyMode);
        assert!(policy.actions.active_at(DegradationLevel::None).is_empty());
    }

    #[test]
    fn test_patch_merges_only_given_fields() {
        let mut policy = ComponentPolicy::default_for(ComponentId::Database);
        let before = policy.clone();

        let changed = policy.apply_patch(
            &PolicyPatch::new()
                .error_rate(ThresholdLadder::new(2.0, 10.0, 20.0, 40.0))
                .auto_recovery(false),
        );

        assert_eq!(changed, vec!["error_rate", "auto_recovery"]);
        assert_eq!(policy.triggers.error_rate.read_only, 2.0);
        assert!(!policy.recovery.auto_recovery);
        assert_eq!(policy.triggers.cpu_percent, before.triggers.cpu_percent);
        assert_eq!(policy.actions, before.actions);
    }

    #[test]
    fn test_required_wait_backs_off() {
        let recovery = RecoveryPolicy {
            recovery_timeout: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            ..Default::default()
        };
        assert_eq!(recovery.required_wait(0), Duration::from_secs(10));
        assert_eq!(recovery.required_wait(2), Duration::from_secs(40));
    }

    #[test]
    fn test_exit_thresholds_are_strict() {
        let recovery = RecoveryPolicy::default();
        let healthy = MetricSnapshot::zero().with_error_rate(4.9).with_response_time_ms(999.0);
        let borderline = MetricSnapshot::zero().with_error_rate(5.0);

        assert!(recovery.samples_are_healthy(&[healthy]));
        assert!(!recovery.samples_are_healthy(&[healthy, borderline]));
        assert!(recovery.samples_are_healthy(&[]));
    }

    fn arb_ladder() -> impl Strategy<Value = ThresholdLadder> {
        (0.0..10_000.0f64, 0.0..10_000.0f64, 0.0..10_000.0f64, 0.0..10_000.0f64)
            .prop_map(|(a, b, c, d)| ThresholdLadder::new(a, b, c, d))
    }

    proptest! {
        #[test]
        fn prop_level_is_monotone_per_dimension(
            ladder in arb_ladder(),
            low in 0.0..20_000.0f64,
            delta in 0.0..20_000.0f64,
        ) {
            prop_assert!(ladder.level_for(low) <= ladder.level_for(low + delta));
        }

        #[test]
        fn prop_evaluation_is_monotone_in_each_dimension(
            base in (0.0..100.0f64, 0.0..6000.0f64, 0.0..100.0f64, 0.0..100.0f64, 0.0..12_000.0f64),
            dim_index in 0usize..5,
            delta in 0.0..10_000.0f64,
        ) {
            let policy = ComponentPolicy::default_for(ComponentId::Queue);
            let metrics = MetricSnapshot {
                error_rate: base.0,
                response_time_ms: base.1,
                memory_percent: base.2,
                cpu_percent: base.3,
                queue_depth: base.4,
            };
            let dimension = MetricDimension::ALL[dim_index];
            let mut raised = metrics;
            raised.set(dimension, metrics.get(dimension) + delta);

            prop_assert!(
                policy.triggers.evaluate(&metrics).level
                    <= policy.triggers.evaluate(&raised).level
            );
        }
    }
}
