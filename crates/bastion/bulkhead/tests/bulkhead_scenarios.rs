//! Admission behaviour of tenant bulkheads under contention.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bastion_bulkhead::{
    BulkheadConfig, BulkheadContext, BulkheadError, BulkheadSettings, RejectionReason,
    TenantBulkhead,
};
use bastion_observability::{AuditOutcome, AuditSubscriber, EventBus, MemoryAuditSink};
use bastion_types::{EventSeverity, TenantId};

/// Lets a test decide when blocked operations may finish.
#[derive(Clone)]
struct Gate(Arc<tokio::sync::Semaphore>);

impl Gate {
    fn closed() -> Self {
        Self(Arc::new(tokio::sync::Semaphore::new(0)))
    }

    fn open(&self, n: usize) {
        self.0.add_permits(n);
    }

    async fn pass(&self) {
        if let Ok(permit) = self.0.acquire().await {
            permit.forget();
        }
    }
}

fn bulkhead(max: usize, queue: usize, timeout_ms: u64) -> Arc<TenantBulkhead> {
    bulkhead_on(max, queue, timeout_ms, EventBus::new())
}

fn bulkhead_on(max: usize, queue: usize, timeout_ms: u64, bus: EventBus) -> Arc<TenantBulkhead> {
    let config = BulkheadConfig::new(max, queue, Duration::from_millis(timeout_ms)).unwrap();
    Arc::new(TenantBulkhead::new(BulkheadSettings::new(config), bus).unwrap())
}

fn spawn_blocked(
    bulkhead: &Arc<TenantBulkhead>,
    ctx: &BulkheadContext,
    gate: &Gate,
    running: &Arc<AtomicUsize>,
    peak: &Arc<AtomicUsize>,
) -> tokio::task::JoinHandle<Result<(), BulkheadError>> {
    let bulkhead = bulkhead.clone();
    let ctx = ctx.clone();
    let gate = gate.clone();
    let running = running.clone();
    let peak = peak.clone();
    tokio::spawn(async move {
        bulkhead
            .execute(&ctx, || async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                gate.pass().await;
                running.fetch_sub(1, Ordering::SeqCst);
            })
            .await
    })
}

async fn wait_for(bulkhead: &TenantBulkhead, ctx: &BulkheadContext, in_flight: usize, queued: usize) {
    loop {
        if let Some(state) = bulkhead.state(&ctx.tenant_id, &ctx.resource) {
            if state.in_flight == in_flight && state.queue_depth == queued {
                return;
            }
        }
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn two_run_and_the_third_waits_for_a_slot() {
    let bulkhead = bulkhead(2, 10, 5_000);
    let ctx = BulkheadContext::new("t1", "db");
    let gate = Gate::closed();
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..3)
        .map(|_| spawn_blocked(&bulkhead, &ctx, &gate, &running, &peak))
        .collect();

    wait_for(&bulkhead, &ctx, 2, 1).await;
    assert_eq!(running.load(Ordering::SeqCst), 2);

    gate.open(1);
    wait_for(&bulkhead, &ctx, 2, 0).await;

    gate.open(2);
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(peak.load(Ordering::SeqCst), 2);
    assert_eq!(bulkhead.state(&ctx.tenant_id, "db").unwrap().in_flight, 0);
}

#[tokio::test]
async fn call_beyond_capacity_without_queue_is_rejected_immediately() {
    let bulkhead = bulkhead(3, 0, 1_000);
    let ctx = BulkheadContext::new("t1", "reports");
    let gate = Gate::closed();
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..3)
        .map(|_| spawn_blocked(&bulkhead, &ctx, &gate, &running, &peak))
        .collect();
    wait_for(&bulkhead, &ctx, 3, 0).await;

    let err = bulkhead.execute(&ctx, || async {}).await.unwrap_err();

    assert_eq!(err.rejection_reason(), Some(RejectionReason::QueueFull));
    assert_eq!(running.load(Ordering::SeqCst), 3);

    gate.open(3);
    for task in tasks {
        task.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn single_slot_single_queue_entry() {
    let bulkhead = bulkhead(1, 1, 1_000);
    let ctx = BulkheadContext::new("t2", "db");
    let gate = Gate::closed();
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let first = spawn_blocked(&bulkhead, &ctx, &gate, &running, &peak);
    wait_for(&bulkhead, &ctx, 1, 0).await;
    let second = spawn_blocked(&bulkhead, &ctx, &gate, &running, &peak);
    wait_for(&bulkhead, &ctx, 1, 1).await;

    let third = bulkhead.execute(&ctx, || async {}).await;
    assert!(matches!(
        third,
        Err(BulkheadError::Rejected {
            reason: RejectionReason::QueueFull,
            ..
        })
    ));

    gate.open(2);
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();
    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn queued_caller_times_out() {
    let bulkhead = bulkhead(1, 1, 1_000);
    let ctx = BulkheadContext::new("t3", "db");
    let gate = Gate::closed();
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let first = spawn_blocked(&bulkhead, &ctx, &gate, &running, &peak);
    wait_for(&bulkhead, &ctx, 1, 0).await;

    let err = bulkhead.execute(&ctx, || async {}).await.unwrap_err();

    assert_eq!(err.rejection_reason(), Some(RejectionReason::Timeout));
    assert!(err.is_retryable());
    let state = bulkhead.state(&ctx.tenant_id, "db").unwrap();
    assert_eq!(state.queue_depth, 0);
    assert_eq!(state.rejections, 1);

    gate.open(1);
    first.await.unwrap().unwrap();
}

#[tokio::test]
async fn panicking_operation_releases_its_slot() {
    let bulkhead = bulkhead(1, 0, 100);
    let ctx = BulkheadContext::new("t4", "db");

    let task = tokio::spawn({
        let bulkhead = bulkhead.clone();
        let ctx = ctx.clone();
        async move {
            bulkhead
                .execute(&ctx, || async {
                    panic!("operation failed");
                })
                .await
        }
    });
    assert!(task.await.unwrap_err().is_panic());

    assert_eq!(bulkhead.state(&ctx.tenant_id, "db").unwrap().in_flight, 0);
    assert!(bulkhead.execute(&ctx, || async {}).await.is_ok());
}

#[tokio::test]
async fn dropped_caller_releases_its_slot() {
    let bulkhead = bulkhead(1, 1, 60_000);
    let ctx = BulkheadContext::new("t5", "db");
    let gate = Gate::closed();
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let running_task = spawn_blocked(&bulkhead, &ctx, &gate, &running, &peak);
    wait_for(&bulkhead, &ctx, 1, 0).await;
    let queued_task = spawn_blocked(&bulkhead, &ctx, &gate, &running, &peak);
    wait_for(&bulkhead, &ctx, 1, 1).await;

    queued_task.abort();
    assert!(queued_task.await.unwrap_err().is_cancelled());
    wait_for(&bulkhead, &ctx, 1, 0).await;

    running_task.abort();
    assert!(running_task.await.unwrap_err().is_cancelled());
    wait_for(&bulkhead, &ctx, 0, 0).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn contended_bulkhead_never_exceeds_its_limit() {
    const CALLERS: usize = 10_000;
    let bulkhead = bulkhead(2, CALLERS, 60_000);
    let ctx = BulkheadContext::new("crowd", "db");
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(AtomicBool::new(false));

    let evictor = tokio::spawn({
        let bulkhead = bulkhead.clone();
        let done = done.clone();
        async move {
            let mut evicted = 0;
            while !done.load(Ordering::SeqCst) {
                evicted += bulkhead.evict_idle(Duration::ZERO);
                tokio::task::yield_now().await;
            }
            evicted
        }
    });

    let callers: Vec<_> = (0..CALLERS)
        .map(|_| {
            let bulkhead = bulkhead.clone();
            let ctx = ctx.clone();
            let running = running.clone();
            let peak = peak.clone();
            tokio::spawn(async move {
                bulkhead
                    .execute(&ctx, || async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        running.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
            })
        })
        .collect();

    let mut admitted = 0;
    for caller in callers {
        if caller.await.unwrap().is_ok() {
            admitted += 1;
        }
    }
    done.store(true, Ordering::SeqCst);
    evictor.await.unwrap();

    assert_eq!(admitted, CALLERS);
    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(running.load(Ordering::SeqCst), 0);
    if let Some(state) = bulkhead.state(&ctx.tenant_id, &ctx.resource) {
        assert_eq!(state.in_flight, 0);
        assert_eq!(state.queue_depth, 0);
    }
}

#[tokio::test]
async fn idle_bulkheads_are_evicted_and_recreated() {
    let bulkhead = bulkhead(1, 0, 100);
    let idle = BulkheadContext::new("idle", "db");
    let busy = BulkheadContext::new("busy", "db");
    let gate = Gate::closed();
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    bulkhead.execute(&idle, || async {}).await.unwrap();
    let task = spawn_blocked(&bulkhead, &busy, &gate, &running, &peak);
    wait_for(&bulkhead, &busy, 1, 0).await;

    assert_eq!(bulkhead.evict_idle(Duration::ZERO), 1);
    assert!(bulkhead.state(&TenantId::new("idle"), "db").is_none());
    assert!(bulkhead.state(&TenantId::new("busy"), "db").is_some());

    bulkhead.execute(&idle, || async {}).await.unwrap();
    assert_eq!(bulkhead.len(), 2);

    gate.open(1);
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn per_resource_limits_and_tenant_state() {
    let settings = BulkheadSettings::new(BulkheadConfig::default()).with_resource(
        "exports",
        BulkheadConfig::new(1, 0, Duration::from_millis(50)).unwrap(),
    );
    let bulkhead = TenantBulkhead::new(settings, EventBus::new()).unwrap();

    bulkhead
        .execute(&BulkheadContext::new("t6", "exports"), || async {})
        .await
        .unwrap();
    bulkhead
        .execute(&BulkheadContext::new("t6", "search"), || async {})
        .await
        .unwrap();

    let state = bulkhead.get_state(&TenantId::new("t6"));
    assert_eq!(state.resources.len(), 2);
    assert_eq!(state.resources["exports"].max_concurrent, 1);
    assert_eq!(
        state.resources["search"].max_concurrent,
        BulkheadConfig::default().max_concurrent
    );
    assert!(bulkhead.get_state(&TenantId::new("other")).resources.is_empty());
}

#[tokio::test]
async fn rejections_are_audited() {
    let bus = EventBus::new();
    let sink = Arc::new(MemoryAuditSink::new());
    let subscriber = AuditSubscriber::spawn(&bus, sink.clone());
    let bulkhead = bulkhead_on(1, 0, 100, bus);
    let ctx = BulkheadContext::new("t7", "db").with_correlation_id("req-7");
    let gate = Gate::closed();
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let task = spawn_blocked(&bulkhead, &ctx, &gate, &running, &peak);
    wait_for(&bulkhead, &ctx, 1, 0).await;
    assert!(bulkhead.execute(&ctx, || async {}).await.is_err());
    gate.open(1);
    task.await.unwrap().unwrap();

    subscriber.shutdown().await;

    let records = sink.records_for_action("bulkhead.reject");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].tenant_id.as_deref(), Some("t7"));
    assert_eq!(records[0].resource_id, "t7/db");
    assert_eq!(records[0].severity, EventSeverity::High);
    assert_eq!(records[0].correlation_id.as_deref(), Some("req-7"));
    assert!(matches!(records[0].outcome, AuditOutcome::Denied { .. }));
}
