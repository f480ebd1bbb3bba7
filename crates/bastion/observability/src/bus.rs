//! Broadcast bus for domain events.
//!
//! Publishing never blocks and never fails the caller: with no subscribers
//! the event is dropped, and slow subscribers observe `Lagged` instead of
//! applying backpressure.

use bastion_types::{GuardEvent, GuardEventEnvelope};
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 1024;

/// Cloneable publisher handle shared by the orchestrator and the bulkheads.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<GuardEventEnvelope>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GuardEventEnvelope> {
        self.tx.subscribe()
    }

    /// Publish a bare event with default envelope fields.
    pub fn emit(&self, event: GuardEvent) {
        self.publish(GuardEventEnvelope::new(event));
    }

    pub fn publish(&self, envelope: GuardEventEnvelope) {
        if self.tx.send(envelope).is_err() {
            tracing::trace!("guard event dropped: no subscribers");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
