//! Background task persisting domain events as audit records.

use super::record::AuditRecord;
use super::sink::AuditSink;
use crate::bus::EventBus;
use bastion_types::GuardEventEnvelope;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Handle to a running audit subscriber
pub struct AuditSubscriber {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<u64>,
}

impl AuditSubscriber {
    /// Subscribe to `bus` and write every event to `sink` until shut down.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(bus: &EventBus, sink: Arc<dyn AuditSink>) -> Self {
        let rx = bus.subscribe();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run(rx, shutdown_rx, sink));

        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Drain already-published events, flush the sink and stop.
    ///
    /// Returns the number of records written over the subscriber's lifetime.
    pub async fn shutdown(self) -> u64 {
        let _ = self.shutdown_tx.send(true);
        match self.handle.await {
            Ok(written) => written,
            Err(e) => {
                tracing::error!(error = %e, "Audit subscriber task failed");
                0
            }
        }
    }
}

async fn run(
    mut rx: broadcast::Receiver<GuardEventEnvelope>,
    mut shutdown_rx: watch::Receiver<bool>,
    sink: Arc<dyn AuditSink>,
) -> u64 {
    let mut written = 0u64;

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Ok(envelope) => {
                    if persist(sink.as_ref(), &envelope).await {
                        written += 1;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Audit subscriber lagged; events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    // Drain whatever was published before shutdown.
    loop {
        match rx.try_recv() {
            Ok(envelope) => {
                if persist(sink.as_ref(), &envelope).await {
                    written += 1;
                }
            }
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Audit subscriber lagged during drain");
            }
            Err(_) => break,
        }
    }

    if let Err(e) = sink.flush().await {
        tracing::error!(error = %e, "Failed to flush audit sink");
    }

    tracing::debug!(written, "Audit subscriber stopped");
    written
}

async fn persist(sink: &dyn AuditSink, envelope: &GuardEventEnvelope) -> bool {
    let record = AuditRecord::from_envelope(envelope);
    match sink.write(record).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(
                error = %e,
                event_id = %envelope.id,
                action = envelope.event.action(),
                "Failed to write audit record"
            );
            false
        }
    }
}
