//! The explicit context object owning every long-lived piece of the guard.
//!
//! One [`GuardContext`] replaces process-wide singletons: it owns the event
//! bus, the audit subscriber, the orchestrator, the tenant bulkhead and the
//! scheduler, and is the operator surface over all of them.

use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use bastion_bulkhead::{BulkheadContext, TenantBulkhead, TenantBulkheadState};
use bastion_degradation::{
    ComponentPolicy, ComponentState, DegradationOrchestrator, DegradationResult,
    LoggingMitigationHandler, MetricSource, MitigationHandler, PolicyPatch, SystemMetrics,
    SystemState,
};
use bastion_observability::{
    AuditSink, AuditSubscriber, EventBus, FileAuditSink, MemoryAuditSink, TracingAuditSink,
};
use bastion_types::{DegradationLevel, MetricSnapshot, TenantId};

use crate::config::{parse_component, AuditConfig, GuardConfig};
use crate::error::{DaemonError, DaemonResult};
use crate::scheduler::{GuardScheduler, Tickers};

/// Pluggable collaborators. Anything left unset is built from configuration.
#[derive(Default)]
pub struct Collaborators {
    pub mitigations: Option<Arc<dyn MitigationHandler>>,
    pub metric_source: Option<Arc<dyn MetricSource>>,
    pub audit_sink: Option<Arc<dyn AuditSink>>,
    pub tickers: Option<Tickers>,
}

impl Collaborators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mitigations(mut self, handler: Arc<dyn MitigationHandler>) -> Self {
        self.mitigations = Some(handler);
        self
    }

    pub fn with_metric_source(mut self, source: Arc<dyn MetricSource>) -> Self {
        self.metric_source = Some(source);
        self
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = Some(sink);
        self
    }

    pub fn with_tickers(mut self, tickers: Tickers) -> Self {
        self.tickers = Some(tickers);
        self
    }
}

/// Running guard.
pub struct GuardContext {
    config: GuardConfig,
    bus: EventBus,
    orchestrator: Arc<DegradationOrchestrator>,
    bulkhead: Arc<TenantBulkhead>,
    audit_sink: Arc<dyn AuditSink>,
    audit: AuditSubscriber,
    scheduler: GuardScheduler,
}

impl GuardContext {
    /// Validate `config`, wire everything together and start the loops.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn start(config: GuardConfig, collaborators: Collaborators) -> DaemonResult<Self> {
        config.validate()?;
        let policies = config.components.policies()?;

        let bus = EventBus::new();

        let audit_sink = match collaborators.audit_sink {
            Some(sink) => sink,
            None => build_audit_sink(&config.audit).await?,
        };
        // Subscribe before anything can publish.
        let audit = AuditSubscriber::spawn(&bus, audit_sink.clone());

        let mitigations = collaborators
            .mitigations
            .unwrap_or_else(|| Arc::new(LoggingMitigationHandler));
        let orchestrator = Arc::new(DegradationOrchestrator::new(
            config.degradation.clone(),
            mitigations,
            bus.clone(),
        )?);
        for policy in policies {
            orchestrator.register(policy);
        }

        let bulkhead = Arc::new(TenantBulkhead::new(config.bulkhead.settings(), bus.clone())?);

        let tickers = collaborators
            .tickers
            .unwrap_or_else(|| Tickers::from_config(&config.scheduler));
        let scheduler = GuardScheduler::start(
            orchestrator.clone(),
            bulkhead.clone(),
            collaborators.metric_source,
            tickers,
            config.bulkhead.idle_ttl(),
        );

        tracing::info!(
            components = orchestrator.configured_components().len(),
            "Guard started"
        );

        Ok(Self {
            config,
            bus,
            orchestrator,
            bulkhead,
            audit_sink,
            audit,
            scheduler,
        })
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn orchestrator(&self) -> &Arc<DegradationOrchestrator> {
        &self.orchestrator
    }

    pub fn bulkhead(&self) -> &Arc<TenantBulkhead> {
        &self.bulkhead
    }

    pub fn audit_sink(&self) -> &Arc<dyn AuditSink> {
        &self.audit_sink
    }

    // Operator surface

    /// Merge `patch` into the named component's policy.
    pub fn configure_component(
        &self,
        component: &str,
        patch: &PolicyPatch,
        actor: &str,
    ) -> DaemonResult<ComponentPolicy> {
        let component = parse_component(component)?;
        Ok(self.orchestrator.configure(component, patch, actor))
    }

    /// Pin the named component to `level`.
    pub async fn force_degrade(
        &self,
        component: &str,
        level: &str,
        reason: &str,
        actor: &str,
    ) -> DaemonResult<DegradationResult> {
        let component = parse_component(component)?;
        let level = DegradationLevel::from_str(level)
            .map_err(|_| DaemonError::UnknownLevel(level.to_string()))?;
        Ok(self
            .orchestrator
            .force_degradation(component, level, reason, actor)
            .await)
    }

    pub async fn recover_component(&self, component: &str) -> DaemonResult<DegradationResult> {
        let component = parse_component(component)?;
        Ok(self.orchestrator.recover_component(component).await)
    }

    pub fn record_sample(&self, component: &str, metrics: MetricSnapshot) -> DaemonResult<()> {
        let component = parse_component(component)?;
        self.orchestrator.record_sample(component, metrics);
        Ok(())
    }

    /// Latest system state, as of the last assessment pass.
    pub fn system_state(&self) -> SystemState {
        self.orchestrator.system_state()
    }

    pub fn component_state(&self, component: &str) -> DaemonResult<Option<ComponentState>> {
        let component = parse_component(component)?;
        Ok(self.orchestrator.component_state(component))
    }

    pub fn system_metrics(&self) -> SystemMetrics {
        self.orchestrator.system_metrics()
    }

    pub fn bulkhead_state(&self, tenant_id: &TenantId) -> TenantBulkheadState {
        self.bulkhead.get_state(tenant_id)
    }

    /// Run `operation` inside the caller's tenant bulkhead.
    pub async fn execute<F, Fut, T>(&self, context: &BulkheadContext, operation: F) -> DaemonResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        Ok(self.bulkhead.execute(context, operation).await?)
    }

    /// Stop the loops, then drain and flush the audit trail.
    ///
    /// Returns the number of audit records written.
    pub async fn shutdown(self) -> u64 {
        self.scheduler.shutdown().await;
        let written = self.audit.shutdown().await;
        tracing::info!(audit_records = written, "Guard stopped");
        written
    }
}

async fn build_audit_sink(config: &AuditConfig) -> DaemonResult<Arc<dyn AuditSink>> {
    Ok(match config {
        AuditConfig::Tracing => Arc::new(TracingAuditSink::new()),
        AuditConfig::Memory => Arc::new(MemoryAuditSink::new()),
        AuditConfig::File { path } => Arc::new(FileAuditSink::new(path.clone()).await?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_names_are_rejected() {
        let (tickers, _handles) = Tickers::manual();
        let guard = GuardContext::start(
            GuardConfig::default(),
            Collaborators::new().with_tickers(tickers),
        )
        .await
        .unwrap();

        assert!(matches!(
            guard.recover_component("mainframe").await,
            Err(DaemonError::UnknownComponent(_))
        ));
        assert!(matches!(
            guard.force_degrade("api", "sideways", "drill", "ops").await,
            Err(DaemonError::UnknownLevel(_))
        ));

        guard.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_config_fails_start() {
        let mut config = GuardConfig::default();
        config.bulkhead.default.max_concurrent = 0;

        let result = GuardContext::start(config, Collaborators::new()).await;
        assert!(matches!(result, Err(DaemonError::Bulkhead(_))));
    }

    #[tokio::test]
    async fn test_file_audit_sink_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = GuardConfig::default();
        config.audit = AuditConfig::File {
            path: dir.path().join("audit/trail.jsonl"),
        };
        let (tickers, _handles) = Tickers::manual();

        let guard = GuardContext::start(config, Collaborators::new().with_tickers(tickers))
            .await
            .unwrap();
        guard
            .force_degrade("billing", "read_only", "migration", "ops")
            .await
            .unwrap();

        let written = guard.shutdown().await;
        assert!(written >= 1);
        assert!(dir.path().join("audit/trail.jsonl").exists());
    }
}
