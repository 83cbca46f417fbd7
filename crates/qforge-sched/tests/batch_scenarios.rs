//! End-to-end batch scenarios against the simulated backend.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use qforge_compile::{Optimizer, OptimizerConfig};
use qforge_hal::{FaultPoint, ProviderCapability, ProviderRegistry, SimulatedBackend};
use qforge_ir::{Circuit, QubitId};
use qforge_recovery::{ErrorKind, ErrorLedger, RecoveryEngine, StrategyRegistry};
use qforge_sched::{
    BatchScheduler, DEPENDENCY_FAILED, Dependency, DependencyKind, Job, JobStatus, Priority,
    ProviderLimits, SchedError, Scheduler, SchedulerConfig,
};

const WAIT: Duration = Duration::from_secs(120);

struct Harness {
    scheduler: BatchScheduler,
    optimizer: Arc<Optimizer>,
    backend: Arc<SimulatedBackend>,
}

fn harness_with(config: SchedulerConfig) -> Harness {
    harness_on(config, SimulatedBackend::new())
}

fn harness_on(config: SchedulerConfig, backend: SimulatedBackend) -> Harness {
    let registry = Arc::new(ProviderRegistry::with_defaults());
    let optimizer = Arc::new(Optimizer::new(registry.clone(), OptimizerConfig::default()));
    let backend = Arc::new(backend);
    let recovery = RecoveryEngine::new(
        Arc::new(StrategyRegistry::with_defaults()),
        Arc::new(ErrorLedger::new()),
    )
    .with_jitter(Duration::ZERO);
    let scheduler = BatchScheduler::new(
        registry,
        optimizer.clone(),
        recovery,
        backend.clone(),
        config,
    )
    .unwrap();
    Harness {
        scheduler,
        optimizer,
        backend,
    }
}

fn harness() -> Harness {
    harness_with(SchedulerConfig::default())
}

fn limited(provider: &str, cap: ProviderCapability, edit: impl FnOnce(&mut ProviderLimits)) -> SchedulerConfig {
    let mut limits = ProviderLimits::for_capability(&cap);
    edit(&mut limits);
    SchedulerConfig {
        limits: BTreeMap::from([(provider.to_string(), limits)]),
        ..SchedulerConfig::default()
    }
}

fn bell(name: &str, provider: &str) -> Job {
    Job::new(name, Circuit::bell().unwrap(), provider)
}

fn visited(job: &Job, status: JobStatus) -> bool {
    job.history().iter().any(|c| c.to == status)
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_cascade_before_any_round() {
    let h = harness();
    let batch = h
        .scheduler
        .submit_batch(vec![bell("bell", "A")], "fifo")
        .await
        .unwrap();

    assert!(h.scheduler.cancel_batch(&batch).await.unwrap());

    let snap = h.scheduler.get_batch_status(&batch).await.unwrap();
    assert_eq!(snap.batch.status, JobStatus::Cancelled);
    assert_eq!(snap.jobs[0].status(), JobStatus::Cancelled);

    let report = h.scheduler.process_pending().await.unwrap();
    assert_eq!(report.admitted, 0);
    assert_eq!(h.optimizer.invocations(), 0);
    assert_eq!(h.backend.submissions(), 0);

    // Nothing left to cancel.
    assert!(!h.scheduler.cancel_batch(&batch).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_retry_exhaustion_fails_with_timeout() {
    let h = harness();
    h.backend
        .inject_failures(FaultPoint::Submit, 4, "connection timed out");
    let job = bell("flaky", "A");
    let id = job.id;

    let batch = h.scheduler.submit_batch(vec![job], "fifo").await.unwrap();
    let snap = h.scheduler.wait_for_batch(&batch, WAIT).await.unwrap();
    assert_eq!(snap.batch.status, JobStatus::Failed);

    let job = h.scheduler.get_job(&id).await.unwrap();
    assert_eq!(job.status(), JobStatus::Failed);
    assert_eq!(job.retry_count(), 3);
    let error = job.error().unwrap();
    assert_eq!(error.kind(), ErrorKind::Timeout);
    assert!(!error.recoverable());
    assert!(visited(&job, JobStatus::Retrying));
    assert_eq!(h.backend.submissions(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_wait_time_cap_times_out_retries() {
    let h = harness_with(limited("A", ProviderCapability::provider_a(), |l| {
        l.max_wait_time_secs = 2;
    }));
    h.backend
        .inject_failures(FaultPoint::Submit, 10, "connection reset by peer");
    let job = bell("stuck", "A");
    let id = job.id;

    let batch = h.scheduler.submit_batch(vec![job], "fifo").await.unwrap();
    let snap = h.scheduler.wait_for_batch(&batch, WAIT).await.unwrap();
    assert_eq!(snap.batch.status, JobStatus::Failed);

    // Backoff of 1 s then 2 s overruns the 2 s budget after one retry.
    let job = h.scheduler.get_job(&id).await.unwrap();
    assert_eq!(job.status(), JobStatus::Failed);
    assert_eq!(job.error().unwrap().kind(), ErrorKind::Timeout);
    assert_eq!(job.retry_count(), 1);
    assert!(h.backend.submissions() < 10);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_running_job_releases_backend_execution() {
    let h = harness_on(SchedulerConfig::default(), SimulatedBackend::with_time_scale(1e6));
    let job = bell("long", "A");
    let id = job.id;
    let batch = h.scheduler.submit_batch(vec![job], "fifo").await.unwrap();

    let report = h.scheduler.process_pending().await.unwrap();
    assert_eq!(report.admitted, 1);
    // The simulated run lasts 5 s; everything below happens well before.
    let bound = Duration::from_secs(1);
    tokio::time::timeout(bound, async {
        while h.scheduler.get_job(&id).await.unwrap().status() != JobStatus::Running {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(h.backend.in_flight(), 1);

    assert!(h.scheduler.cancel_batch(&batch).await.unwrap());
    let snap = h.scheduler.wait_for_batch(&batch, WAIT).await.unwrap();
    assert_eq!(snap.batch.status, JobStatus::Cancelled);
    tokio::time::timeout(bound, async {
        while h.backend.in_flight() > 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(h.backend.submissions(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_recover() {
    let h = harness();
    h.backend
        .inject_failures(FaultPoint::Submit, 2, "connection reset by peer");
    let job = bell("flaky", "B");
    let id = job.id;

    let batch = h.scheduler.submit_batch(vec![job], "fifo").await.unwrap();
    let snap = h.scheduler.wait_for_batch(&batch, WAIT).await.unwrap();
    assert_eq!(snap.batch.status, JobStatus::Completed);

    let job = h.scheduler.get_job(&id).await.unwrap();
    assert_eq!(job.retry_count(), 2);
    assert!(job.error().is_none());
    assert_eq!(h.backend.submissions(), 3);
    assert_eq!(h.scheduler.recovery().ledger().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_unsatisfiable_qubit_cap_fails_synchronously() {
    let h = harness();
    let mut wide = Circuit::with_size("wide", 2000, 0);
    wide.h(QubitId(0)).unwrap();
    let job = Job::new("wide", wide, "C");
    let id = job.id;

    let err = h.scheduler.submit_batch(vec![job], "fifo").await.unwrap_err();
    assert!(err.is_validation());
    assert!(matches!(
        err,
        SchedError::LimitExceeded {
            required: 2000,
            limit: 1024,
            ..
        }
    ));
    assert!(matches!(
        h.scheduler.get_job(&id).await,
        Err(SchedError::JobNotFound(_))
    ));

    let ledger = h.scheduler.recovery().ledger();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger.recent(1)[0].kind(), ErrorKind::Validation);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_terminal_job_does_not_mutate() {
    let h = harness();
    let job = bell("done", "A");
    let id = job.id;
    let batch = h.scheduler.submit_batch(vec![job], "fifo").await.unwrap();
    h.scheduler.wait_for_batch(&batch, WAIT).await.unwrap();

    let before = h.scheduler.get_job(&id).await.unwrap();
    assert_eq!(before.status(), JobStatus::Completed);

    let err = h.scheduler.cancel_job(&id).await.unwrap_err();
    assert!(matches!(err, SchedError::AlreadyTerminal { .. }));

    let after = h.scheduler.get_job(&id).await.unwrap();
    assert_eq!(after.status(), JobStatus::Completed);
    assert_eq!(after.history().len(), before.history().len());
    assert_eq!(after.updated_at(), before.updated_at());
}

#[tokio::test(start_paused = true)]
async fn test_failed_dependency_blocks_dependents() {
    let h = harness();
    h.backend.inject_failures(FaultPoint::Wait, 1, "unauthorized");

    let root = bell("root", "A");
    let needs_success = bell("needs_success", "A")
        .depends_on(Dependency::required(root.id, DependencyKind::Success));
    let needs_completion = bell("needs_completion", "A")
        .depends_on(Dependency::required(root.id, DependencyKind::Completion));
    let ids = [root.id, needs_success.id, needs_completion.id];

    let batch = h
        .scheduler
        .submit_batch(vec![root, needs_success, needs_completion], "fifo")
        .await
        .unwrap();

    let report = h.scheduler.process_pending().await.unwrap();
    assert_eq!(report.promoted, 1);

    let snap = h.scheduler.wait_for_batch(&batch, WAIT).await.unwrap();
    assert_eq!(snap.batch.status, JobStatus::Failed);

    let root = h.scheduler.get_job(&ids[0]).await.unwrap();
    assert_eq!(root.status(), JobStatus::Failed);
    assert_eq!(root.error().unwrap().kind(), ErrorKind::Auth);

    let blocked = h.scheduler.get_job(&ids[1]).await.unwrap();
    assert_eq!(blocked.status(), JobStatus::Failed);
    assert_eq!(blocked.error().unwrap().code(), DEPENDENCY_FAILED);
    assert!(!visited(&blocked, JobStatus::Queued));
    assert!(!visited(&blocked, JobStatus::Running));

    let after_any = h.scheduler.get_job(&ids[2]).await.unwrap();
    assert_eq!(after_any.status(), JobStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_dependent_runs_after_dependency() {
    let h = harness();
    let first = bell("first", "B");
    let second = bell("second", "B").depends_on(Dependency::required(first.id, DependencyKind::Data));
    let (first_id, second_id) = (first.id, second.id);

    let batch = h
        .scheduler
        .submit_batch(vec![second, first], "priority")
        .await
        .unwrap();
    h.scheduler.wait_for_batch(&batch, WAIT).await.unwrap();

    let first = h.scheduler.get_job(&first_id).await.unwrap();
    let second = h.scheduler.get_job(&second_id).await.unwrap();
    assert_eq!(second.status(), JobStatus::Completed);

    let completed_at = first
        .history()
        .iter()
        .find(|c| c.to == JobStatus::Completed)
        .unwrap()
        .at;
    let queued_at = second
        .history()
        .iter()
        .find(|c| c.to == JobStatus::Queued)
        .unwrap()
        .at;
    assert!(queued_at >= completed_at);
}

#[tokio::test(start_paused = true)]
async fn test_optional_dependency_never_blocks() {
    let h = harness();
    let a = bell("a", "A");
    let b = bell("b", "A").depends_on(Dependency::optional(a.id, DependencyKind::Success));

    h.scheduler.submit_batch(vec![a, b], "dependency-aware").await.unwrap();
    let report = h.scheduler.process_pending().await.unwrap();
    assert_eq!(report.promoted, 2);
    assert_eq!(report.admitted, 2);
}

#[tokio::test(start_paused = true)]
async fn test_dependency_cycle_rejected() {
    let h = harness();
    let mut a = bell("a", "A");
    let b = bell("b", "A").depends_on(Dependency::required(a.id, DependencyKind::Success));
    a = a.depends_on(Dependency::required(b.id, DependencyKind::Success));
    let a_id = a.id;

    let err = h.scheduler.submit_batch(vec![a, b], "fifo").await.unwrap_err();
    assert!(matches!(err, SchedError::DependencyCycle(ref path) if path.len() == 3));
    assert!(err.is_validation());
    assert!(h.scheduler.get_job(&a_id).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_cap_keeps_jobs_queued() {
    let h = harness_with(limited("A", ProviderCapability::provider_a(), |l| {
        l.max_concurrent_jobs = 1;
    }));
    let jobs = vec![
        bell("low", "A").with_priority(Priority::Low),
        bell("high", "A").with_priority(Priority::High),
        bell("medium", "A").with_priority(Priority::Medium),
    ];
    let ids: Vec<_> = jobs.iter().map(|j| j.id).collect();
    let batch = h.scheduler.submit_batch(jobs, "priority").await.unwrap();

    let report = h.scheduler.process_pending().await.unwrap();
    assert_eq!(report.admitted, 1);
    assert_eq!(report.deferred, 2);

    let high = h.scheduler.get_job(&ids[1]).await.unwrap();
    assert_ne!(high.status(), JobStatus::Queued);
    for id in [ids[0], ids[2]] {
        assert_eq!(h.scheduler.get_job(&id).await.unwrap().status(), JobStatus::Queued);
    }

    let snap = h.scheduler.wait_for_batch(&batch, WAIT).await.unwrap();
    assert_eq!(snap.batch.status, JobStatus::Completed);
    assert_eq!(snap.status_counts()["completed"], 3);
}

#[tokio::test(start_paused = true)]
async fn test_depth_cap_fails_after_optimization() {
    let h = harness_with(limited("A", ProviderCapability::provider_a(), |l| {
        l.max_depth = 1;
    }));
    let job = Job::new("ghz", Circuit::ghz(4).unwrap(), "A");
    let id = job.id;
    let batch = h.scheduler.submit_batch(vec![job], "fifo").await.unwrap();
    h.scheduler.wait_for_batch(&batch, WAIT).await.unwrap();

    let job = h.scheduler.get_job(&id).await.unwrap();
    assert_eq!(job.status(), JobStatus::Failed);
    assert_eq!(job.error().unwrap().kind(), ErrorKind::Validation);
    assert_eq!(job.retry_count(), 0);
    assert!(!visited(&job, JobStatus::Submitted));
    assert_eq!(h.backend.submissions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_batch_metrics_and_merge() {
    let h = harness();
    let jobs = vec![
        bell("a", "A"),
        Job::new("ghz", Circuit::ghz(5).unwrap(), "B"),
    ];
    let batch = h.scheduler.submit_batch(jobs, "resource-aware").await.unwrap();
    let snap = h.scheduler.get_batch_status(&batch).await.unwrap();

    assert_eq!(snap.batch.strategy, "resource-aware");
    assert_eq!(snap.batch.status, JobStatus::Pending);
    assert_eq!(snap.batch.metrics.resource_usage.total_qubits, 7);
    assert_eq!(snap.batch.merged_circuit.num_qubits(), 7);
    assert_eq!(snap.batch.merge_conflicts, 0);
    assert_eq!(snap.jobs.len(), 2);
}
