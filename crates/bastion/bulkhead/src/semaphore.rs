//! Counting semaphore with a bounded FIFO wait queue.
//!
//! The in-flight counter and the wait queue live under one mutex, so a
//! capacity check plus enqueue is atomic with respect to `release`. A
//! release with waiters hands its slot straight to the oldest live waiter;
//! the counter only drops when nobody is waiting.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::config::BulkheadConfig;
use crate::error::RejectionReason;

/// Point-in-time view of one semaphore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkheadState {
    pub in_flight: usize,
    pub queue_depth: usize,
    pub max_concurrent: usize,
    pub queue_max_depth: usize,
    /// Rejections since the semaphore was created.
    pub rejections: u64,
}

/// Why `acquire` returned without a permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireError {
    Rejected(RejectionReason),
    /// Semaphore evicted from its registry; look it up again.
    Retired,
}

struct Waiter {
    id: u64,
    tx: oneshot::Sender<()>,
}

struct Inner {
    in_flight: usize,
    waiters: VecDeque<Waiter>,
    next_waiter: u64,
    rejections: u64,
    last_used: Instant,
    retired: bool,
}

impl Inner {
    /// Give a freed slot to the oldest waiter still listening.
    fn release_slot(&mut self) {
        self.last_used = Instant::now();
        while let Some(waiter) = self.waiters.pop_front() {
            if waiter.tx.send(()).is_ok() {
                return;
            }
        }
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    fn remove_waiter(&mut self, id: u64) -> bool {
        match self.waiters.iter().position(|w| w.id == id) {
            Some(index) => {
                self.waiters.remove(index);
                true
            }
            None => false,
        }
    }
}

/// Semaphore guarding one (tenant, resource) pair.
pub struct Semaphore {
    config: BulkheadConfig,
    inner: Mutex<Inner>,
}

impl Semaphore {
    pub fn new(config: BulkheadConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                in_flight: 0,
                waiters: VecDeque::new(),
                next_waiter: 0,
                rejections: 0,
                last_used: Instant::now(),
                retired: false,
            }),
        }
    }

    pub fn config(&self) -> &BulkheadConfig {
        &self.config
    }

    /// Grant a slot now, queue for one, or refuse.
    ///
    /// Cancelling the returned future while queued removes the waiter; a
    /// slot granted concurrently with the cancellation is passed on.
    pub async fn acquire(self: &Arc<Self>) -> Result<BulkheadPermit, AcquireError> {
        let (id, mut rx) = {
            let mut inner = self.inner.lock();
            if inner.retired {
                return Err(AcquireError::Retired);
            }
            inner.last_used = Instant::now();

            if inner.in_flight < self.config.max_concurrent && inner.waiters.is_empty() {
                inner.in_flight += 1;
                return Ok(BulkheadPermit::new(self.clone()));
            }

            if inner.waiters.len() >= self.config.queue_max_depth {
                inner.rejections = inner.rejections.saturating_add(1);
                return Err(AcquireError::Rejected(RejectionReason::QueueFull));
            }

            let id = inner.next_waiter;
            inner.next_waiter = inner.next_waiter.wrapping_add(1);
            let (tx, rx) = oneshot::channel();
            inner.waiters.push_back(Waiter { id, tx });
            (id, rx)
        };

        let mut guard = WaiterGuard {
            semaphore: self,
            id,
            armed: true,
        };

        match tokio::time::timeout(self.config.acquire_timeout, &mut rx).await {
            Ok(Ok(())) => {
                guard.armed = false;
                Ok(BulkheadPermit::new(self.clone()))
            }
            Ok(Err(_)) => {
                // Only a release pops a live waiter, and it sends before
                // dropping the sender, so this arm is not expected. Count it
                // like any other rejection if it ever happens.
                guard.armed = false;
                let mut inner = self.inner.lock();
                inner.remove_waiter(id);
                inner.rejections = inner.rejections.saturating_add(1);
                Err(AcquireError::Rejected(RejectionReason::Timeout))
            }
            Err(_) => {
                guard.armed = false;
                let mut inner = self.inner.lock();
                if inner.remove_waiter(id) {
                    inner.rejections = inner.rejections.saturating_add(1);
                    return Err(AcquireError::Rejected(RejectionReason::Timeout));
                }
                drop(inner);

                // Popped by a release between the timer firing and the lock.
                match rx.try_recv() {
                    Ok(()) => Ok(BulkheadPermit::new(self.clone())),
                    Err(_) => Err(AcquireError::Rejected(RejectionReason::Timeout)),
                }
            }
        }
    }

    /// Return a slot. Extra releases never drive the counter below zero.
    pub(crate) fn release(&self) {
        self.inner.lock().release_slot();
    }

    pub fn state(&self) -> BulkheadState {
        let inner = self.inner.lock();
        BulkheadState {
            in_flight: inner.in_flight,
            queue_depth: inner.waiters.len(),
            max_concurrent: self.config.max_concurrent,
            queue_max_depth: self.config.queue_max_depth,
            rejections: inner.rejections,
        }
    }

    /// Retire the semaphore if it has been unused for `ttl`.
    ///
    /// Once retired, `acquire` answers `Retired` forever.
    pub(crate) fn retire_if_idle(&self, ttl: Duration, now: Instant) -> bool {
        let mut inner = self.inner.lock();
        if inner.retired {
            return true;
        }
        let idle = inner.in_flight == 0
            && inner.waiters.is_empty()
            && now.saturating_duration_since(inner.last_used) >= ttl;
        if idle {
            inner.retired = true;
        }
        idle
    }
}

struct WaiterGuard<'a> {
    semaphore: &'a Semaphore,
    id: u64,
    armed: bool,
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.semaphore.inner.lock();
        if !inner.remove_waiter(self.id) {
            // A release already handed us the slot; nobody will use it.
            inner.release_slot();
        }
    }
}

/// Held slot; returned to the semaphore on drop, including during unwind.
#[must_use = "dropping the permit releases the slot immediately"]
pub struct BulkheadPermit {
    semaphore: Arc<Semaphore>,
}

impl BulkheadPermit {
    fn new(semaphore: Arc<Semaphore>) -> Self {
        Self { semaphore }
    }

    /// Release explicitly; equivalent to dropping.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for BulkheadPermit {
    fn drop(&mut self) {
        self.semaphore.release();
    }
}

impl std::fmt::Debug for BulkheadPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkheadPermit")
            .field("state", &self.semaphore.state())
            .finish()
    }
}
