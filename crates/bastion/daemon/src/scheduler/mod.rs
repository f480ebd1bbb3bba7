//! Background loops: metric collection and assessment, recovery sweeps,
//! sample pruning and idle bulkhead eviction.

mod ticker;

pub use ticker::{IntervalTicker, ManualTickHandle, ManualTicker, ManualTickers, Tick, Ticker, Tickers};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bastion_bulkhead::TenantBulkhead;
use bastion_degradation::{DegradationOrchestrator, MetricSource};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Running background loops.
pub struct GuardScheduler {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl GuardScheduler {
    /// Spawn one loop per ticker.
    ///
    /// Without a metric source the assessment loop still assesses, using
    /// whatever samples were recorded directly.
    pub fn start(
        orchestrator: Arc<DegradationOrchestrator>,
        bulkhead: Arc<TenantBulkhead>,
        metric_source: Option<Arc<dyn MetricSource>>,
        tickers: Tickers,
        idle_ttl: Duration,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut handles = Vec::with_capacity(4);

        let assess = orchestrator.clone();
        handles.push(spawn_loop(
            "assessment",
            tickers.assessment,
            shutdown_rx.clone(),
            move || {
                let orchestrator = assess.clone();
                let source = metric_source.clone();
                async move {
                    if let Some(source) = source {
                        orchestrator.collect_metrics(source.as_ref()).await;
                    }
                    let system = orchestrator.assess_system_health().await;
                    tracing::debug!(
                        overall_level = %system.overall_level,
                        degraded = system.degraded_components().len(),
                        "Assessment pass complete"
                    );
                }
            },
        ));

        let recover = orchestrator.clone();
        handles.push(spawn_loop(
            "recovery",
            tickers.recovery,
            shutdown_rx.clone(),
            move || {
                let orchestrator = recover.clone();
                async move {
                    let results = orchestrator.recovery_sweep().await;
                    let recovered = results.iter().filter(|r| r.changed && !r.degraded).count();
                    if !results.is_empty() {
                        tracing::debug!(
                            attempted = results.len(),
                            recovered = recovered,
                            "Recovery sweep complete"
                        );
                    }
                }
            },
        ));

        let prune = orchestrator;
        handles.push(spawn_loop(
            "prune",
            tickers.prune,
            shutdown_rx.clone(),
            move || {
                let orchestrator = prune.clone();
                async move {
                    let pruned = orchestrator.prune_samples();
                    if pruned > 0 {
                        tracing::debug!(pruned = pruned, "Pruned expired samples");
                    }
                }
            },
        ));

        handles.push(spawn_loop(
            "eviction",
            tickers.eviction,
            shutdown_rx,
            move || {
                let bulkhead = bulkhead.clone();
                async move {
                    bulkhead.evict_idle(idle_ttl);
                }
            },
        ));

        tracing::info!("Scheduler started");

        Self {
            shutdown_tx,
            handles,
        }
    }

    /// Stop every loop and wait for in-flight passes to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Scheduler loop terminated abnormally");
            }
        }
        tracing::info!("Scheduler stopped");
    }
}

fn spawn_loop<F, Fut>(
    name: &'static str,
    mut ticker: Box<dyn Ticker>,
    mut shutdown: watch::Receiver<bool>,
    mut pass: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                tick = ticker.tick() => match tick {
                    Some(tick) => {
                        pass().await;
                        drop(tick);
                    }
                    None => break,
                },
            }
        }
        tracing::debug!(task = name, "Scheduler loop exited");
    })
}
