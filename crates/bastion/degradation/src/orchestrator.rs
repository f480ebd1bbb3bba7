//! Degradation orchestrator.
//!
//! Owns the policy table, the sample store and per-component state, and
//! turns metric windows into level transitions.
//!
//! Every state change is decided while holding the component's map entry
//! and carried out (mitigations, events, alerts) after the entry is
//! released. Two concurrent `assess` calls for one component therefore
//! never interleave their read-modify-write, and a slow mitigation handler
//! never blocks other components.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bastion_observability::EventBus;
use bastion_types::{
    ComponentId, DegradationLevel, GuardEvent, GuardEventEnvelope, MetricSample, MetricSnapshot,
};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::DegradationConfig;
use crate::error::{DegradationError, Result};
use crate::mitigation::MitigationHandler;
use crate::policy::{ComponentPolicy, Fallback, Mitigation, PolicyPatch, RecoveryPolicy};
use crate::samples::SampleStore;
use crate::source::MetricSource;
use crate::state::{
    Alert, ComponentMetrics, ComponentState, SystemMetrics, SystemState, TransitionRecord,
    TransitionTrigger,
};

/// Outcome of an assessment, a forced degradation or a recovery attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DegradationResult {
    pub component: ComponentId,
    pub degraded: bool,
    pub level: DegradationLevel,
    pub previous_level: DegradationLevel,
    pub changed: bool,
    /// Mitigations active at `level`.
    pub actions: Vec<Mitigation>,
    /// Fallback paths callers may take; empty when healthy.
    pub fallbacks: Vec<Fallback>,
    pub auto_recovery: bool,
    pub reason: String,
    /// Window average the decision was based on.
    pub metrics: MetricSnapshot,
    pub assessed_at: DateTime<Utc>,
}

/// Why a degraded component may or may not return to `None`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecoveryCheck {
    Eligible,
    Disabled,
    Cooling { remaining: Duration },
    Unhealthy,
}

impl RecoveryCheck {
    pub fn evaluate(
        policy: &RecoveryPolicy,
        state: &ComponentState,
        recent: &[MetricSnapshot],
        now: Instant,
    ) -> Self {
        if !policy.auto_recovery {
            return RecoveryCheck::Disabled;
        }

        let required = policy.required_wait(state.recovery_attempts);
        let elapsed = state.degraded_for(now).unwrap_or_default();
        if elapsed < required {
            return RecoveryCheck::Cooling {
                remaining: required - elapsed,
            };
        }

        if !policy.samples_are_healthy(recent) {
            return RecoveryCheck::Unhealthy;
        }

        RecoveryCheck::Eligible
    }
}

impl std::fmt::Display for RecoveryCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoveryCheck::Eligible => write!(f, "recovery conditions met"),
            RecoveryCheck::Disabled => write!(f, "auto recovery disabled"),
            RecoveryCheck::Cooling { remaining } => {
                write!(f, "recovery timeout not elapsed ({}ms remaining)", remaining.as_millis())
            }
            RecoveryCheck::Unhealthy => write!(f, "recent samples above exit thresholds"),
        }
    }
}

/// Decided under the entry lock, executed after it is dropped.
struct PendingTransition {
    record: TransitionRecord,
    active: Vec<Mitigation>,
    applied: Vec<Mitigation>,
    lifted: Vec<Mitigation>,
}

/// Component degradation engine.
pub struct DegradationOrchestrator {
    config: DegradationConfig,
    policies: DashMap<ComponentId, ComponentPolicy>,
    samples: SampleStore,
    states: DashMap<ComponentId, ComponentState>,
    alerts: DashMap<ComponentId, Alert>,
    system: RwLock<SystemState>,
    total_transitions: AtomicU64,
    mitigations: Arc<dyn MitigationHandler>,
    bus: EventBus,
}

impl DegradationOrchestrator {
    pub fn new(
        config: DegradationConfig,
        mitigations: Arc<dyn MitigationHandler>,
        bus: EventBus,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            samples: SampleStore::new(config.sample_capacity),
            config,
            policies: DashMap::new(),
            states: DashMap::new(),
            alerts: DashMap::new(),
            system: RwLock::new(SystemState::default()),
            total_transitions: AtomicU64::new(0),
            mitigations,
            bus,
        })
    }

    pub fn config(&self) -> &DegradationConfig {
        &self.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    // ─────────────────────────────────────────────────────────────────────
    // Policy table
    // ─────────────────────────────────────────────────────────────────────

    /// Install a complete policy, replacing any previous one.
    pub fn register(&self, policy: ComponentPolicy) {
        let component = policy.component;
        self.policies.insert(component, policy);
        self.states
            .entry(component)
            .or_insert_with(|| ComponentState::new(component));
        debug!(component = %component, "Component registered");
    }

    /// Merge a partial policy into the component's current one.
    ///
    /// Unconfigured components start from their built-in defaults.
    pub fn configure(
        &self,
        component: ComponentId,
        patch: &PolicyPatch,
        actor: &str,
    ) -> ComponentPolicy {
        let (policy, changed_fields) = {
            let mut entry = self
                .policies
                .entry(component)
                .or_insert_with(|| ComponentPolicy::default_for(component));
            let changed = entry.apply_patch(patch);
            (entry.value().clone(), changed)
        };

        self.states
            .entry(component)
            .or_insert_with(|| ComponentState::new(component));

        info!(
            component = %component,
            actor = %actor,
            changed = ?changed_fields,
            "Component policy configured"
        );

        self.bus.publish(
            GuardEventEnvelope::new(GuardEvent::PolicyConfigured {
                component,
                changed_fields,
            })
            .with_actor(actor),
        );

        policy
    }

    pub fn policy(&self, component: ComponentId) -> Option<ComponentPolicy> {
        self.policies.get(&component).map(|p| p.value().clone())
    }

    /// Configured components in ladder order.
    pub fn configured_components(&self) -> Vec<ComponentId> {
        let mut components: Vec<_> = self.policies.iter().map(|p| *p.key()).collect();
        components.sort();
        components
    }

    /// Current policy, or the built-in one for an unconfigured component.
    /// Never registers the component.
    fn policy_or_default(&self, component: ComponentId) -> ComponentPolicy {
        self.policies
            .get(&component)
            .map(|p| p.value().clone())
            .unwrap_or_else(|| ComponentPolicy::default_for(component))
    }

    /// Like `policy_or_default`, but registers the built-in policy.
    fn policy_or_register(&self, component: ComponentId) -> ComponentPolicy {
        self.policies
            .entry(component)
            .or_insert_with(|| ComponentPolicy::default_for(component))
            .value()
            .clone()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Samples
    // ─────────────────────────────────────────────────────────────────────

    pub fn record_sample(&self, component: ComponentId, metrics: MetricSnapshot) {
        self.samples.record(component, MetricSample::now(metrics));
    }

    pub fn record(&self, component: ComponentId, sample: MetricSample) {
        self.samples.record(component, sample);
    }

    pub fn samples(&self) -> &SampleStore {
        &self.samples
    }

    /// Pull one reading per configured component from `source`.
    ///
    /// A failing source is logged and skipped; no placeholder sample is
    /// stored. Returns the number of samples recorded.
    pub async fn collect_metrics(&self, source: &dyn MetricSource) -> usize {
        let mut collected = 0;
        for component in self.configured_components() {
            match source.collect(component).await {
                Ok(metrics) => {
                    self.record_sample(component, metrics);
                    collected += 1;
                }
                Err(e) => {
                    warn!(component = %component, error = %e, "Metric collection failed; skipping");
                }
            }
        }
        collected
    }

    /// Discard samples older than the configured retention.
    pub fn prune_samples(&self) -> usize {
        let Ok(retention) = chrono::Duration::from_std(self.config.sample_retention) else {
            return 0;
        };
        let Some(cutoff) = Utc::now().checked_sub_signed(retention) else {
            return 0;
        };

        let removed = self.samples.prune_before(cutoff);
        if removed > 0 {
            debug!(removed, "Pruned expired metric samples");
        }
        removed
    }

    // ─────────────────────────────────────────────────────────────────────
    // Assessment
    // ─────────────────────────────────────────────────────────────────────

    /// Evaluate the component's recent window and apply any transition.
    ///
    /// With no samples the window averages to zero, so the candidate level
    /// is `None`.
    pub async fn assess(&self, component: ComponentId) -> DegradationResult {
        let policy = self.policy_or_default(component);
        let window = self
            .samples
            .recent(component, self.config.assessment_window);
        let metrics = MetricSnapshot::average(&window);
        let decision = policy.triggers.evaluate(&metrics);
        let recent = self
            .samples
            .recent(component, policy.recovery.healthy_window);
        let now = Instant::now();

        let (result, pending) = {
            let mut state = self
                .states
                .entry(component)
                .or_insert_with(|| ComponentState::new(component));
            state.latest_metrics = MetricSnapshot::average(&recent);
            let current = state.level;

            let (target, trigger, reason) = if decision.level.is_degraded() {
                if state.forced && decision.level < current {
                    (
                        current,
                        TransitionTrigger::Assessment,
                        format!("held at {} by operator ({})", current, decision.reason()),
                    )
                } else {
                    (decision.level, TransitionTrigger::Assessment, decision.reason())
                }
            } else if !current.is_degraded() {
                (current, TransitionTrigger::Assessment, decision.reason())
            } else if state.forced {
                (
                    current,
                    TransitionTrigger::Assessment,
                    format!("held at {} by operator", current),
                )
            } else {
                match RecoveryCheck::evaluate(&policy.recovery, &state, &recent, now) {
                    RecoveryCheck::Eligible => (
                        DegradationLevel::None,
                        TransitionTrigger::Recovery,
                        RecoveryCheck::Eligible.to_string(),
                    ),
                    refused => (current, TransitionTrigger::Assessment, refused.to_string()),
                }
            };

            let pending = (target != current)
                .then(|| self.begin_transition(&mut state, &policy, target, trigger, &reason, now));
            let result = self.result_for(&state, &policy, current, pending.is_some(), reason, metrics);
            (result, pending)
        };

        if let Some(pending) = pending {
            self.complete_transition(component, &policy, pending, None)
                .await;
        }

        debug!(
            component = %component,
            level = %result.level,
            changed = result.changed,
            error_rate = metrics.error_rate,
            response_time_ms = metrics.response_time_ms,
            "Component assessed"
        );

        result
    }

    /// Assess every configured component and recompute the system view.
    pub async fn assess_system_health(&self) -> SystemState {
        let mut components = BTreeMap::new();
        for component in self.configured_components() {
            let result = self.assess(component).await;
            components.insert(component, result.level);
        }

        let overall_level = components
            .values()
            .copied()
            .max()
            .unwrap_or(DegradationLevel::None);

        let state = SystemState {
            overall_level,
            components,
            total_transitions: self.total_transitions.load(Ordering::Relaxed),
            active_alerts: self.active_alerts(),
            assessed_at: Some(Utc::now()),
        };

        let previous = std::mem::replace(&mut *self.system.write(), state.clone());
        if previous.overall_level != overall_level {
            info!(
                from = %previous.overall_level,
                to = %overall_level,
                "Overall degradation level changed"
            );
        }

        state
    }

    // ─────────────────────────────────────────────────────────────────────
    // Operator actions
    // ─────────────────────────────────────────────────────────────────────

    /// Pin a component to `level` regardless of metrics.
    ///
    /// The component is excluded from automatic recovery until
    /// `recover_component` succeeds. Forcing `None` clears the pin.
    pub async fn force_degradation(
        &self,
        component: ComponentId,
        level: DegradationLevel,
        reason: &str,
        actor: &str,
    ) -> DegradationResult {
        // A pinned component counts towards the overall level.
        let policy = self.policy_or_register(component);
        let now = Instant::now();

        let (result, pending, previous) = {
            let mut state = self
                .states
                .entry(component)
                .or_insert_with(|| ComponentState::new(component));
            let current = state.level;
            let metrics = state.latest_metrics;

            let pending = (level != current).then(|| {
                self.begin_transition(
                    &mut state,
                    &policy,
                    level,
                    TransitionTrigger::Forced,
                    reason,
                    now,
                )
            });
            state.forced = level.is_degraded();

            let result =
                self.result_for(&state, &policy, current, pending.is_some(), reason.to_string(), metrics);
            (result, pending, current)
        };

        warn!(
            component = %component,
            from = %previous,
            to = %level,
            actor = %actor,
            reason = %reason,
            "Degradation forced"
        );

        self.bus.publish(
            GuardEventEnvelope::new(GuardEvent::DegradationForced {
                component,
                from: previous,
                to: level,
                reason: reason.to_string(),
            })
            .with_actor(actor),
        );

        match pending {
            Some(pending) => {
                self.complete_transition(component, &policy, pending, Some(actor))
                    .await
            }
            None => self.update_alert(component, &policy, level),
        }

        result
    }

    /// Return a degraded component to `None` if recovery conditions hold.
    ///
    /// Healthy components are a no-op. A refusal once the timeout has
    /// elapsed counts as a failed attempt and lengthens the next wait.
    pub async fn recover_component(&self, component: ComponentId) -> DegradationResult {
        let policy = self.policy_or_default(component);
        let recent = self
            .samples
            .recent(component, policy.recovery.healthy_window);
        let now = Instant::now();

        let (result, pending) = {
            let Some(mut state) = self.states.get_mut(&component) else {
                let state = ComponentState::new(component);
                return self.result_for(
                    &state,
                    &policy,
                    state.level,
                    false,
                    "component not degraded".to_string(),
                    state.latest_metrics,
                );
            };
            let current = state.level;
            let metrics = state.latest_metrics;

            if !current.is_degraded() {
                let result = self.result_for(
                    &state,
                    &policy,
                    current,
                    false,
                    "component not degraded".to_string(),
                    metrics,
                );
                (result, None)
            } else {
                let check = RecoveryCheck::evaluate(&policy.recovery, &state, &recent, now);
                let reason = check.to_string();
                let pending = match check {
                    RecoveryCheck::Eligible => Some(self.begin_transition(
                        &mut state,
                        &policy,
                        DegradationLevel::None,
                        TransitionTrigger::Recovery,
                        &reason,
                        now,
                    )),
                    RecoveryCheck::Unhealthy => {
                        state.recovery_attempts = state.recovery_attempts.saturating_add(1);
                        None
                    }
                    RecoveryCheck::Disabled | RecoveryCheck::Cooling { .. } => None,
                };

                if pending.is_none() {
                    info!(
                        component = %component,
                        level = %current,
                        attempts = state.recovery_attempts,
                        reason = %reason,
                        "Recovery refused"
                    );
                }

                let result =
                    self.result_for(&state, &policy, current, pending.is_some(), reason, metrics);
                (result, pending)
            }
        };

        if let Some(pending) = pending {
            self.complete_transition(component, &policy, pending, None)
                .await;
        }

        result
    }

    /// Attempt recovery of every degraded, unforced component still within
    /// its retry budget.
    pub async fn recovery_sweep(&self) -> Vec<DegradationResult> {
        let mut candidates: Vec<ComponentId> = self
            .states
            .iter()
            .filter(|s| s.is_degraded() && !s.forced)
            .map(|s| (s.component, s.recovery_attempts))
            .collect::<Vec<_>>()
            .into_iter()
            .filter(|(component, attempts)| {
                self.policies
                    .get(component)
                    .map(|p| p.recovery.auto_recovery && *attempts < p.recovery.max_retries)
                    .unwrap_or(false)
            })
            .map(|(component, _)| component)
            .collect();
        candidates.sort();

        let mut results = Vec::with_capacity(candidates.len());
        for component in candidates {
            results.push(self.recover_component(component).await);
        }
        results
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    pub fn component_state(&self, component: ComponentId) -> Option<ComponentState> {
        self.states.get(&component).map(|s| s.value().clone())
    }

    /// System view as of the last `assess_system_health` pass.
    pub fn system_state(&self) -> SystemState {
        self.system.read().clone()
    }

    pub fn active_alerts(&self) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self.alerts.iter().map(|a| a.value().clone()).collect();
        alerts.sort_by_key(|a| a.component);
        alerts
    }

    pub fn total_transitions(&self) -> u64 {
        self.total_transitions.load(Ordering::Relaxed)
    }

    pub fn system_metrics(&self) -> SystemMetrics {
        let components = self
            .configured_components()
            .into_iter()
            .map(|component| {
                let window = self
                    .samples
                    .recent(component, self.config.assessment_window);
                let level = self
                    .states
                    .get(&component)
                    .map(|s| s.level)
                    .unwrap_or_default();
                let metrics = ComponentMetrics {
                    level,
                    sample_count: self.samples.len(component),
                    latest: self.samples.latest(component),
                    window_average: MetricSnapshot::average(&window),
                };
                (component, metrics)
            })
            .collect();

        SystemMetrics {
            components,
            collected_at: Utc::now(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Transition plumbing
    // ─────────────────────────────────────────────────────────────────────

    fn begin_transition(
        &self,
        state: &mut ComponentState,
        policy: &ComponentPolicy,
        to: DegradationLevel,
        trigger: TransitionTrigger,
        reason: &str,
        now: Instant,
    ) -> PendingTransition {
        let active = policy.actions.active_at(to);
        let applied = active
            .iter()
            .filter(|m| !state.active_mitigations.contains(m))
            .cloned()
            .collect();
        let lifted = state
            .active_mitigations
            .iter()
            .filter(|m| !active.contains(m))
            .cloned()
            .collect();

        let record = state.transition(
            to,
            trigger,
            reason.to_string(),
            active.clone(),
            now,
            self.config.history_capacity,
        );

        PendingTransition {
            record,
            active,
            applied,
            lifted,
        }
    }

    async fn complete_transition(
        &self,
        component: ComponentId,
        policy: &ComponentPolicy,
        pending: PendingTransition,
        actor: Option<&str>,
    ) {
        let PendingTransition {
            record,
            active,
            applied,
            lifted,
        } = pending;

        self.total_transitions.fetch_add(1, Ordering::Relaxed);

        if record.to > record.from {
            warn!(
                component = %component,
                from = %record.from,
                to = %record.to,
                trigger = ?record.trigger,
                reason = %record.reason,
                "Component degraded"
            );
        } else {
            info!(
                component = %component,
                from = %record.from,
                to = %record.to,
                trigger = ?record.trigger,
                reason = %record.reason,
                "Component degradation eased"
            );
        }

        if !lifted.is_empty() {
            if let Err(e) = self.mitigations.lift(component, &lifted).await {
                self.report_mitigation_failure(component, record.to, e);
            }
        }
        if !applied.is_empty() {
            if let Err(e) = self.mitigations.apply(component, record.to, &applied).await {
                self.report_mitigation_failure(component, record.to, e);
            }
        }

        let event = match record.trigger {
            TransitionTrigger::Forced => None,
            TransitionTrigger::Recovery => Some(GuardEvent::ComponentRecovered {
                component,
                from: record.from,
            }),
            TransitionTrigger::Assessment => Some(GuardEvent::LevelChanged {
                component,
                from: record.from,
                to: record.to,
                reason: record.reason.clone(),
                mitigations: active.iter().map(ToString::to_string).collect(),
            }),
        };
        if let Some(event) = event {
            let envelope = GuardEventEnvelope::new(event);
            self.bus.publish(match actor {
                Some(actor) => envelope.with_actor(actor),
                None => envelope,
            });
        }

        self.update_alert(component, policy, record.to);
    }

    fn report_mitigation_failure(
        &self,
        component: ComponentId,
        level: DegradationLevel,
        error: DegradationError,
    ) {
        warn!(
            component = %component,
            level = %level,
            error = %error,
            "Mitigation handler failed; level change stands"
        );
        self.bus.emit(GuardEvent::MitigationFailed {
            component,
            level,
            error: error.to_string(),
        });
    }

    fn update_alert(&self, component: ComponentId, policy: &ComponentPolicy, level: DegradationLevel) {
        let notification = &policy.notification;

        if !notification.should_alert(level) {
            if let Some((_, alert)) = self.alerts.remove(&component) {
                info!(component = %component, alert_id = %alert.id, "Alert cleared");
                self.bus.emit(GuardEvent::AlertCleared {
                    alert_id: alert.id,
                    component,
                });
            }
            return;
        }

        let raised = match self.alerts.entry(component) {
            Entry::Occupied(mut entry) => {
                let alert = entry.get_mut();
                let escalated = level > alert.level;
                alert.level = level;
                alert.message = Alert::message_for(component, level);
                escalated.then(|| alert.clone())
            }
            Entry::Vacant(entry) => {
                let alert = Alert {
                    id: bastion_types::AlertId::generate(),
                    component,
                    level,
                    message: Alert::message_for(component, level),
                    channels: notification.channels.clone(),
                    raised_at: Utc::now(),
                };
                entry.insert(alert.clone());
                Some(alert)
            }
        };

        if let Some(alert) = raised {
            warn!(
                component = %component,
                alert_id = %alert.id,
                level = %level,
                channels = ?alert.channels,
                "Alert raised"
            );
            self.bus.emit(GuardEvent::AlertRaised {
                alert_id: alert.id,
                component,
                level,
                channels: alert.channels,
            });
        }
    }

    fn result_for(
        &self,
        state: &ComponentState,
        policy: &ComponentPolicy,
        previous_level: DegradationLevel,
        changed: bool,
        reason: String,
        metrics: MetricSnapshot,
    ) -> DegradationResult {
        let degraded = state.level.is_degraded();
        DegradationResult {
            component: state.component,
            degraded,
            level: state.level,
            previous_level,
            changed,
            actions: state.active_mitigations.clone(),
            fallbacks: if degraded {
                policy.fallbacks.active()
            } else {
                Vec::new()
            },
            auto_recovery: policy.recovery.auto_recovery && !state.forced,
            reason,
            metrics,
            assessed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mitigation::{FailingMitigationHandler, MitigationCall, RecordingMitigationHandler};
    use crate::policy::ThresholdLadder;

    fn orchestrator_with(handler: Arc<dyn MitigationHandler>) -> DegradationOrchestrator {
        DegradationOrchestrator::new(DegradationConfig::default(), handler, EventBus::new())
            .unwrap()
    }

    fn orchestrator() -> DegradationOrchestrator {
        orchestrator_with(Arc::new(RecordingMitigationHandler::new()))
    }

    fn feed(orchestrator: &DegradationOrchestrator, component: ComponentId, metrics: MetricSnapshot, n: usize) {
        for _ in 0..n {
            orchestrator.record_sample(component, metrics);
        }
    }

    #[tokio::test]
    async fn test_assess_without_samples_is_healthy() {
        let orchestrator = orchestrator();
        let result = orchestrator.assess(ComponentId::Cache).await;

        assert!(!result.degraded);
        assert_eq!(result.level, DegradationLevel::None);
        assert_eq!(result.metrics, MetricSnapshot::zero());
        assert!(!result.changed);
    }

    #[tokio::test]
    async fn test_noop_recover_does_not_register_component() {
        let orchestrator = orchestrator();

        let result = orchestrator.recover_component(ComponentId::Cache).await;

        assert!(!result.degraded);
        assert!(!result.changed);
        assert!(orchestrator.configured_components().is_empty());
        assert!(orchestrator.component_state(ComponentId::Cache).is_none());
        assert!(orchestrator.assess_system_health().await.components.is_empty());
    }

    #[tokio::test]
    async fn test_assess_does_not_register_component() {
        let orchestrator = orchestrator();
        orchestrator.register(ComponentPolicy::default_for(ComponentId::Api));

        orchestrator.assess(ComponentId::Cache).await;

        assert_eq!(orchestrator.configured_components(), vec![ComponentId::Api]);
    }

    #[tokio::test]
    async fn test_forced_component_is_registered() {
        let orchestrator = orchestrator();

        orchestrator
            .force_degradation(ComponentId::Billing, DegradationLevel::Partial, "drill", "ops")
            .await;

        assert_eq!(orchestrator.configured_components(), vec![ComponentId::Billing]);
        assert_eq!(
            orchestrator.assess_system_health().await.overall_level,
            DegradationLevel::Partial
        );
    }

    #[tokio::test]
    async fn test_latest_metrics_average_recent_samples() {
        let orchestrator = orchestrator();
        feed(&orchestrator, ComponentId::Api, MetricSnapshot::zero().with_error_rate(1.0), 5);
        feed(&orchestrator, ComponentId::Api, MetricSnapshot::zero().with_error_rate(3.0), 5);

        let result = orchestrator.assess(ComponentId::Api).await;

        assert_eq!(result.metrics.error_rate, 2.0);
        let state = orchestrator.component_state(ComponentId::Api).unwrap();
        assert_eq!(state.latest_metrics.error_rate, 3.0);
    }

    #[tokio::test]
    async fn test_assess_averages_last_window_only() {
        let orchestrator = orchestrator();
        // Old spike outside the ten-sample window.
        feed(&orchestrator, ComponentId::Api, MetricSnapshot::zero().with_error_rate(90.0), 5);
        feed(&orchestrator, ComponentId::Api, MetricSnapshot::zero().with_error_rate(1.0), 10);

        let result = orchestrator.assess(ComponentId::Api).await;
        assert_eq!(result.level, DegradationLevel::None);
        assert_eq!(result.metrics.error_rate, 1.0);
    }

    #[tokio::test]
    async fn test_escalation_applies_cumulative_mitigations() {
        let handler = Arc::new(RecordingMitigationHandler::new());
        let orchestrator = orchestrator_with(handler.clone());
        feed(&orchestrator, ComponentId::Database, MetricSnapshot::zero().with_error_rate(30.0), 5);

        let result = orchestrator.assess(ComponentId::Database).await;

        assert_eq!(result.level, DegradationLevel::Minimal);
        assert_eq!(result.actions.len(), 4);
        assert!(result.fallbacks.contains(&Fallback::UseCache));
        assert!(matches!(
            handler.calls().as_slice(),
            [MitigationCall::Apply { level: DegradationLevel::Minimal, mitigations, .. }] if mitigations.len() == 4
        ));
    }

    #[tokio::test]
    async fn test_step_down_between_degraded_levels() {
        let handler = Arc::new(RecordingMitigationHandler::new());
        let orchestrator = orchestrator_with(handler.clone());
        feed(&orchestrator, ComponentId::Database, MetricSnapshot::zero().with_error_rate(30.0), 10);
        orchestrator.assess(ComponentId::Database).await;

        feed(&orchestrator, ComponentId::Database, MetricSnapshot::zero().with_error_rate(6.0), 10);
        let result = orchestrator.assess(ComponentId::Database).await;

        assert_eq!(result.previous_level, DegradationLevel::Minimal);
        assert_eq!(result.level, DegradationLevel::ReadOnly);
        assert_eq!(result.actions, vec![Mitigation::ReadOnlyMode]);
        assert!(matches!(
            handler.calls().last(),
            Some(MitigationCall::Lift { mitigations, .. }) if mitigations.len() == 3
        ));
    }

    #[tokio::test]
    async fn test_mitigation_failure_does_not_block_transition() {
        let handler = Arc::new(FailingMitigationHandler::new());
        let orchestrator = orchestrator_with(handler.clone());
        let mut rx = orchestrator.bus().subscribe();
        feed(&orchestrator, ComponentId::Billing, MetricSnapshot::zero().with_cpu_percent(60.0), 3);

        let result = orchestrator.assess(ComponentId::Billing).await;

        assert_eq!(result.level, DegradationLevel::Partial);
        assert_eq!(handler.attempts(), 1);
        assert_eq!(
            orchestrator.component_state(ComponentId::Billing).unwrap().level,
            DegradationLevel::Partial
        );

        let mut actions = Vec::new();
        while let Ok(envelope) = rx.try_recv() {
            actions.push(envelope.event.action());
        }
        assert!(actions.contains(&"degradation.mitigation_failed"));
        assert!(actions.contains(&"degradation.transition"));
    }

    #[tokio::test]
    async fn test_configure_merges_and_publishes() {
        let orchestrator = orchestrator();
        let mut rx = orchestrator.bus().subscribe();

        let policy = orchestrator.configure(
            ComponentId::Auth,
            &PolicyPatch::new().error_rate(ThresholdLadder::new(1.0, 2.0, 3.0, 4.0)),
            "operator-7",
        );

        assert_eq!(policy.triggers.error_rate.partial, 2.0);
        assert_eq!(orchestrator.configured_components(), vec![ComponentId::Auth]);

        let envelope = rx.try_recv().unwrap();
        assert_eq!(envelope.actor.as_deref(), Some("operator-7"));
        assert_eq!(envelope.event.action(), "degradation.configure");
    }

    #[tokio::test]
    async fn test_alert_raised_and_cleared() {
        let orchestrator = orchestrator();
        orchestrator.configure(
            ComponentId::Api,
            &PolicyPatch::new().recovery_timeout(Duration::ZERO),
            "operator",
        );
        feed(&orchestrator, ComponentId::Api, MetricSnapshot::zero().with_error_rate(12.0), 10);
        orchestrator.assess(ComponentId::Api).await;
        assert_eq!(orchestrator.active_alerts().len(), 1);

        feed(&orchestrator, ComponentId::Api, MetricSnapshot::zero(), 10);
        let result = orchestrator.assess(ComponentId::Api).await;

        assert_eq!(result.level, DegradationLevel::None);
        assert!(orchestrator.active_alerts().is_empty());
    }

    #[tokio::test]
    async fn test_read_only_below_alert_threshold() {
        let orchestrator = orchestrator();
        feed(&orchestrator, ComponentId::Cache, MetricSnapshot::zero().with_error_rate(6.0), 3);

        let result = orchestrator.assess(ComponentId::Cache).await;

        assert_eq!(result.level, DegradationLevel::ReadOnly);
        assert!(orchestrator.active_alerts().is_empty());
    }

    #[tokio::test]
    async fn test_system_metrics_reports_windows() {
        let orchestrator = orchestrator();
        orchestrator.register(ComponentPolicy::default_for(ComponentId::Queue));
        feed(&orchestrator, ComponentId::Queue, MetricSnapshot::zero().with_queue_depth(100.0), 3);

        let metrics = orchestrator.system_metrics();
        let queue = &metrics.components[&ComponentId::Queue];

        assert_eq!(queue.sample_count, 3);
        assert_eq!(queue.window_average.queue_depth, 100.0);
        assert!(queue.latest.is_some());
    }
}
