//! Tick sources for the background loops.
//!
//! Production loops run on [`IntervalTicker`]; tests drive them with
//! [`ManualTicker`] and wait for each pass to finish.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::config::SchedulerConfig;

/// One scheduled pass. Dropping it marks the pass as finished.
#[derive(Debug, Default)]
pub struct Tick {
    ack: Option<oneshot::Sender<()>>,
}

impl Drop for Tick {
    fn drop(&mut self) {
        if let Some(ack) = self.ack.take() {
            let _ = ack.send(());
        }
    }
}

/// Source of ticks for one loop. `None` ends the loop.
#[async_trait]
pub trait Ticker: Send {
    async fn tick(&mut self) -> Option<Tick>;
}

/// Fires every `period`, first one `period` after creation.
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> Option<Tick> {
        self.interval.tick().await;
        Some(Tick::default())
    }
}

/// Ticks only when its handle says so.
pub struct ManualTicker {
    rx: mpsc::UnboundedReceiver<oneshot::Sender<()>>,
}

/// Drives a [`ManualTicker`].
#[derive(Debug, Clone)]
pub struct ManualTickHandle {
    tx: mpsc::UnboundedSender<oneshot::Sender<()>>,
}

impl ManualTicker {
    pub fn new() -> (Self, ManualTickHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, ManualTickHandle { tx })
    }
}

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) -> Option<Tick> {
        let ack = self.rx.recv().await?;
        Some(Tick { ack: Some(ack) })
    }
}

impl ManualTickHandle {
    /// Fire one tick and wait until the pass it triggered has completed.
    ///
    /// Returns `false` if the loop is no longer running.
    pub async fn tick(&self) -> bool {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(ack_tx).is_err() {
            return false;
        }
        ack_rx.await.is_ok()
    }
}

/// One ticker per background loop.
pub struct Tickers {
    pub assessment: Box<dyn Ticker>,
    pub recovery: Box<dyn Ticker>,
    pub prune: Box<dyn Ticker>,
    pub eviction: Box<dyn Ticker>,
}

/// Handles for [`Tickers::manual`].
#[derive(Debug, Clone)]
pub struct ManualTickers {
    pub assessment: ManualTickHandle,
    pub recovery: ManualTickHandle,
    pub prune: ManualTickHandle,
    pub eviction: ManualTickHandle,
}

impl Tickers {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        let every = |secs: u64| -> Box<dyn Ticker> {
            Box::new(IntervalTicker::new(Duration::from_secs(secs)))
        };
        Self {
            assessment: every(config.assessment_interval_secs),
            recovery: every(config.recovery_interval_secs),
            prune: every(config.prune_interval_secs),
            eviction: every(config.eviction_interval_secs),
        }
    }

    pub fn manual() -> (Self, ManualTickers) {
        let (assessment, assessment_handle) = ManualTicker::new();
        let (recovery, recovery_handle) = ManualTicker::new();
        let (prune, prune_handle) = ManualTicker::new();
        let (eviction, eviction_handle) = ManualTicker::new();
        (
            Self {
                assessment: Box::new(assessment),
                recovery: Box::new(recovery),
                prune: Box::new(prune),
                eviction: Box::new(eviction),
            },
            ManualTickers {
                assessment: assessment_handle,
                recovery: recovery_handle,
                prune: prune_handle,
                eviction: eviction_handle,
            },
        )
    }
}
