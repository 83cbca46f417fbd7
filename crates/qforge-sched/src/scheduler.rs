//! Batch scheduler.
//!
//! Jobs move through the status machine in scheduling rounds:
//!
//! ```text
//!   pending ──(dependencies met)──→ queued ──(slot free)──→ optimizing
//!      │                                                        │
//!      └─(dependency dead)──→ failed              submitted ←───┘
//!                                                  │    ↑
//!                                                  ↓    │
//!                                              running → retrying
//!                                                  │
//!                                                  ↓
//!                                     completed | failed | cancelled
//! ```
//!
//! A round ([`BatchScheduler::process_pending`]) promotes ready jobs, ranks
//! each batch's queued jobs with the batch strategy and admits them as
//! provider slots allow. Admitted jobs run on their own tasks; backoff
//! waits never block the round.
//!
//! Lock order is always the state map first, then a job mutex; a job
//! mutex is never held while the state map is locked afterwards.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use qforge_compile::{OptimizationResult, Optimizer};
use qforge_hal::{Backend, ExecutionReport, ExecutionRequest, ProviderRegistry};
use qforge_noise::NoiseEstimator;
use qforge_recovery::{
    ErrorContext, ErrorDetails, ErrorKind, OperationPhase, RawError, RecoveryEngine,
    RecoveryState, RetryScope, classify,
};

use crate::batch::{BatchJob, BatchSnapshot};
use crate::dependency::{DependencyGraph, Readiness, dependents, readiness, unsatisfied_optional};
use crate::error::{SchedError, SchedResult};
use crate::job::{BatchId, Dependency, Job, JobId, JobStatus};
use crate::limits::{ProviderLimits, ProviderUsage, ResourceManager};
use crate::strategy::{
    DEFAULT_OPTIONAL_DEPENDENCY_PENALTY, ScoreContext, StrategyRegistry, rank,
};

/// Error code of a job whose required dependency can never be satisfied.
pub const DEPENDENCY_FAILED: &str = "DEPENDENCY_FAILED";

/// Configuration for the batch scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between background scheduling rounds.
    pub poll_interval: Duration,
    /// Score penalty per unsatisfied optional dependency.
    pub optional_dependency_penalty: f64,
    /// Per-provider limit overrides.
    pub limits: BTreeMap<String, ProviderLimits>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            optional_dependency_penalty: DEFAULT_OPTIONAL_DEPENDENCY_PENALTY,
            limits: BTreeMap::new(),
        }
    }
}

/// What one scheduling round did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundReport {
    /// Pending jobs moved to queued.
    pub promoted: usize,
    /// Pending jobs failed because a dependency died.
    pub blocked: usize,
    /// Queued jobs handed to an execution task.
    pub admitted: usize,
    /// Queued jobs left waiting for a provider slot.
    pub deferred: usize,
}

/// Trait for scheduler implementations.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Validate `jobs` and store them as one batch.
    async fn submit_batch(&self, jobs: Vec<Job>, strategy: &str) -> SchedResult<BatchId>;

    /// A batch with its jobs.
    async fn get_batch_status(&self, batch_id: &BatchId) -> SchedResult<BatchSnapshot>;

    /// Cancel every non-terminal job of a batch. Returns whether any was.
    async fn cancel_batch(&self, batch_id: &BatchId) -> SchedResult<bool>;

    /// Cancel one job.
    async fn cancel_job(&self, job_id: &JobId) -> SchedResult<()>;

    /// A copy of one job.
    async fn get_job(&self, job_id: &JobId) -> SchedResult<Job>;

    /// Drive the batch until every job is terminal or `timeout` passes.
    async fn wait_for_batch(&self, batch_id: &BatchId, timeout: Duration)
    -> SchedResult<BatchSnapshot>;
}

struct JobEntry {
    handle: Arc<Mutex<Job>>,
    batch: BatchId,
    token: CancellationToken,
    dependencies: Vec<Dependency>,
}

#[derive(Default)]
struct State {
    jobs: FxHashMap<JobId, JobEntry>,
    batches: FxHashMap<BatchId, BatchJob>,
    batch_order: Vec<BatchId>,
    next_sequence: u64,
}

struct Inner {
    registry: Arc<ProviderRegistry>,
    optimizer: Arc<Optimizer>,
    estimator: NoiseEstimator,
    recovery: RecoveryEngine,
    strategies: StrategyRegistry,
    backend: Arc<dyn Backend>,
    config: SchedulerConfig,
    resources: ResourceManager,
    state: RwLock<State>,
    changed: Notify,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

/// How an execution task ended.
enum JobEnd {
    Completed { retries: u32 },
    Failed { error: ErrorDetails, retries: u32 },
    Cancelled,
}

/// Result of one submit-and-wait attempt.
enum Attempt {
    Finished(ExecutionReport),
    Cancelled,
}

/// Scheduler running batches of jobs against one execution backend.
#[derive(Clone)]
pub struct BatchScheduler {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for BatchScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchScheduler")
            .field("backend", &self.inner.backend.name())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl BatchScheduler {
    /// Create a scheduler with the built-in scheduling strategies.
    pub fn new(
        registry: Arc<ProviderRegistry>,
        optimizer: Arc<Optimizer>,
        recovery: RecoveryEngine,
        backend: Arc<dyn Backend>,
        config: SchedulerConfig,
    ) -> SchedResult<Self> {
        Self::with_strategies(
            registry,
            optimizer,
            recovery,
            backend,
            StrategyRegistry::with_defaults(),
            config,
        )
    }

    /// Create a scheduler with a custom strategy registry.
    pub fn with_strategies(
        registry: Arc<ProviderRegistry>,
        optimizer: Arc<Optimizer>,
        recovery: RecoveryEngine,
        backend: Arc<dyn Backend>,
        strategies: StrategyRegistry,
        config: SchedulerConfig,
    ) -> SchedResult<Self> {
        if !(config.optional_dependency_penalty.is_finite()
            && config.optional_dependency_penalty >= 0.0)
        {
            return Err(SchedError::Validation(format!(
                "optional dependency penalty must be a non-negative number, got {}",
                config.optional_dependency_penalty
            )));
        }
        if config.poll_interval.is_zero() {
            return Err(SchedError::Validation("poll interval must be positive".into()));
        }
        let resources = ResourceManager::new(&registry, &config.limits)?;
        Ok(Self {
            inner: Arc::new(Inner {
                estimator: NoiseEstimator::new(registry.clone()),
                registry,
                optimizer,
                recovery,
                strategies,
                backend,
                config,
                resources,
                state: RwLock::new(State::default()),
                changed: Notify::new(),
                tasks: std::sync::Mutex::new(Vec::new()),
            }),
        })
    }

    /// The resource manager enforcing provider limits.
    pub fn resources(&self) -> &ResourceManager {
        &self.inner.resources
    }

    /// The recovery engine used for failed jobs.
    pub fn recovery(&self) -> &RecoveryEngine {
        &self.inner.recovery
    }

    /// Current usage of every provider.
    pub async fn stats(&self) -> Vec<ProviderUsage> {
        self.inner.resources.stats().await
    }

    /// Start the background scheduling loop.
    ///
    /// The loop exits when `shutdown` is cancelled, after in-flight job
    /// tasks have finished.
    pub fn start(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let scheduler = self.clone();
        let poll_interval = self.inner.config.poll_interval;

        tokio::spawn(async move {
            let mut ticker = interval(poll_interval);
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                if let Err(e) = scheduler.process_pending().await {
                    error!("Error processing jobs: {}", e);
                }
            }
            scheduler.drain().await;
            info!("Scheduler stopped");
        })
    }

    /// Wait for every spawned job task to finish.
    pub async fn drain(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self
                .inner
                .tasks
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            std::mem::take(&mut *tasks)
        };
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!("Job task ended abnormally: {}", e);
            }
        }
    }

    fn validate_batch(&self, state: &State, jobs: &[Job], strategy: &str) -> SchedResult<()> {
        if jobs.is_empty() {
            return Err(SchedError::EmptyBatch);
        }
        self.inner.strategies.get(strategy)?;

        let mut ids = FxHashSet::default();
        for job in jobs {
            if job.status() != JobStatus::Pending {
                return Err(SchedError::Validation(format!(
                    "job {} must be pending to be submitted, is {}",
                    job.id,
                    job.status()
                )));
            }
            if state.jobs.contains_key(&job.id) || !ids.insert(job.id) {
                return Err(SchedError::Validation(format!(
                    "job {} is submitted twice",
                    job.id
                )));
            }
            if job.shots == 0 {
                return Err(SchedError::Validation(format!(
                    "job {} needs at least one shot",
                    job.id
                )));
            }
            job.circuit.validate()?;
            self.inner.registry.lookup(&job.provider)?;
            self.inner
                .resources
                .check_qubits(&job.id, &job.provider, job.num_qubits())?;
        }

        for job in jobs {
            for dep in job.required_dependencies() {
                if !ids.contains(&dep.job_id) && !state.jobs.contains_key(&dep.job_id) {
                    return Err(SchedError::InvalidDependency(dep.job_id.to_string()));
                }
            }
        }

        let mut graph = DependencyGraph::new();
        for id in state.jobs.keys().chain(jobs.iter().map(|j| &j.id)) {
            graph.add_job(*id);
        }
        let edges = state
            .jobs
            .iter()
            .map(|(id, e)| (*id, e.dependencies.as_slice()))
            .chain(jobs.iter().map(|j| (j.id, j.dependencies.as_slice())));
        for (id, deps) in edges {
            for dep in deps.iter().filter(|d| !d.optional) {
                graph.add_edge(dep.job_id, id);
            }
        }
        graph.ensure_acyclic()
    }

    async fn handles(&self) -> Vec<(JobId, BatchId, Arc<Mutex<Job>>, CancellationToken)> {
        let state = self.inner.state.read().await;
        state
            .jobs
            .iter()
            .map(|(id, e)| (*id, e.batch, e.handle.clone(), e.token.clone()))
            .collect()
    }

    async fn entry(&self, job_id: &JobId) -> SchedResult<(Arc<Mutex<Job>>, CancellationToken)> {
        let state = self.inner.state.read().await;
        state
            .jobs
            .get(job_id)
            .map(|e| (e.handle.clone(), e.token.clone()))
            .ok_or_else(|| SchedError::JobNotFound(job_id.to_string()))
    }

    /// Run one scheduling round.
    #[instrument(skip(self))]
    pub async fn process_pending(&self) -> SchedResult<RoundReport> {
        let mut report = RoundReport::default();
        let mut handles = self.handles().await;

        let mut jobs: FxHashMap<JobId, Job> = FxHashMap::default();
        for (id, _, handle, _) in &handles {
            jobs.insert(*id, handle.lock().await.clone());
        }
        handles.sort_by_key(|(id, ..)| jobs.get(id).map_or(u64::MAX, Job::sequence));

        // Promote or fail pending jobs, in submission order so that a
        // failure cascades to later dependents within the same round.
        for (id, _, handle, _) in &handles {
            let Some(deps) = jobs
                .get(id)
                .filter(|j| j.status() == JobStatus::Pending)
                .map(|j| j.dependencies.clone())
            else {
                continue;
            };
            let verdict = readiness(&deps, |dep| jobs.get(dep).map(Job::status));
            let mut job = handle.lock().await;
            if job.status() != JobStatus::Pending {
                continue;
            }
            match verdict {
                Readiness::Ready => {
                    job.transition(JobStatus::Queued, None)?;
                    debug!(job_id = %id, "Job queued");
                    report.promoted += 1;
                }
                Readiness::Blocked { dependency } => {
                    let context = ErrorContext::new(OperationPhase::Validation)
                        .with_provider(job.provider.clone())
                        .with_job(id.to_string());
                    let details = ErrorDetails::new(
                        ErrorKind::Execution,
                        format!("required dependency {dependency} can no longer be satisfied"),
                    )
                    .with_code(DEPENDENCY_FAILED)
                    .with_suggested_actions(vec![
                        "Resubmit the job once its dependency has completed".into(),
                    ])
                    .unrecoverable()
                    .with_context(&context);
                    self.inner.recovery.ledger().record(details.clone());
                    job.fail(details)?;
                    warn!(job_id = %id, dependency = %dependency, "Dependency failed");
                    report.blocked += 1;
                }
                Readiness::Waiting => {}
            }
            jobs.insert(*id, job.clone());
        }

        // Rank queued jobs per batch, batches in creation order.
        let (order, strategies): (Vec<BatchId>, FxHashMap<BatchId, String>) = {
            let state = self.inner.state.read().await;
            let strategies = state
                .batches
                .iter()
                .map(|(id, b)| (*id, b.strategy.clone()))
                .collect();
            (state.batch_order.clone(), strategies)
        };

        let counts = dependents(jobs.values().map(|j| j.dependencies.as_slice()));
        let mut in_flight_by_owner: FxHashMap<String, usize> = FxHashMap::default();
        for job in jobs.values().filter(|j| j.status().is_in_flight()) {
            *in_flight_by_owner.entry(job.owner.clone()).or_insert(0) += 1;
        }
        let optional: FxHashMap<JobId, usize> = jobs
            .values()
            .filter(|j| j.status() == JobStatus::Queued)
            .map(|j| {
                let n = unsatisfied_optional(&j.dependencies, |dep| jobs.get(dep).map(Job::status));
                (j.id, n)
            })
            .collect();
        let lookup: FxHashMap<JobId, (Arc<Mutex<Job>>, CancellationToken)> = handles
            .iter()
            .map(|(id, _, h, t)| (*id, (h.clone(), t.clone())))
            .collect();

        for batch_id in order {
            let Some(strategy_name) = strategies.get(&batch_id) else {
                continue;
            };
            let strategy = self.inner.strategies.get(strategy_name)?;
            let queued: Vec<&Job> = handles
                .iter()
                .filter(|(_, b, ..)| *b == batch_id)
                .filter_map(|(id, ..)| jobs.get(id))
                .filter(|j| j.status() == JobStatus::Queued)
                .collect();
            if queued.is_empty() {
                continue;
            }

            let ranked: Vec<(JobId, String, String)> = {
                let ctx = ScoreContext {
                    registry: &self.inner.registry,
                    dependents: &counts,
                    in_flight_by_owner: &in_flight_by_owner,
                    unsatisfied_optional: &optional,
                    optional_penalty: self.inner.config.optional_dependency_penalty,
                };
                rank(queued, strategy.as_ref(), &ctx)
                    .into_iter()
                    .map(|j| (j.id, j.provider.clone(), j.owner.clone()))
                    .collect()
            };

            for (id, provider, owner) in ranked {
                let admission = self.inner.resources.try_admit(&provider).await;
                if !admission.is_admitted() {
                    debug!(job_id = %id, provider = %provider, ?admission, "Job stays queued");
                    report.deferred += 1;
                    continue;
                }
                let Some((handle, token)) = lookup.get(&id) else {
                    self.inner.resources.release(&provider).await;
                    continue;
                };
                {
                    let mut job = handle.lock().await;
                    if job.status() != JobStatus::Queued {
                        drop(job);
                        self.inner.resources.release(&provider).await;
                        continue;
                    }
                    job.transition(JobStatus::Optimizing, None)?;
                }
                info!(job_id = %id, provider = %provider, strategy = %strategy_name, "Job admitted");
                *in_flight_by_owner.entry(owner).or_insert(0) += 1;
                report.admitted += 1;
                self.spawn_job(id, handle.clone(), token.clone(), provider);
            }
        }

        if report != RoundReport::default() {
            self.inner.changed.notify_waiters();
        }
        Ok(report)
    }

    fn spawn_job(&self, id: JobId, handle: Arc<Mutex<Job>>, token: CancellationToken, provider: String) {
        let task = tokio::spawn(self.clone().run_job(id, handle, token, provider));
        let mut tasks = self
            .inner
            .tasks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    async fn run_job(
        self,
        id: JobId,
        handle: Arc<Mutex<Job>>,
        token: CancellationToken,
        provider: String,
    ) {
        let end = self.drive(&id, &handle, &token, &provider).await;

        {
            let mut job = handle.lock().await;
            let result = match end {
                JobEnd::Completed { retries } => {
                    job.set_retry_count(retries);
                    info!(job_id = %id, retries, "Job completed");
                    job.transition(JobStatus::Completed, None)
                }
                JobEnd::Failed { error, retries } => {
                    job.set_retry_count(retries);
                    warn!(job_id = %id, code = %error.code(), kind = %error.kind(), retries, "Job failed");
                    job.fail(error)
                }
                JobEnd::Cancelled => Ok(()),
            };
            if let Err(e) = result {
                debug!(job_id = %id, "Job ended elsewhere: {}", e);
            }
        }

        self.inner.resources.release(&provider).await;
        self.inner.changed.notify_waiters();
    }

    fn context(id: &JobId, provider: &str, phase: OperationPhase) -> ErrorContext {
        ErrorContext::new(phase)
            .with_provider(provider)
            .with_job(id.to_string())
    }

    fn fail_with(&self, raw: RawError, context: &ErrorContext) -> JobEnd {
        JobEnd::Failed {
            error: self.inner.recovery.observe(&raw, context),
            retries: 0,
        }
    }

    async fn optimize(
        &self,
        id: &JobId,
        job: &Job,
        token: &CancellationToken,
    ) -> Result<OptimizationResult, JobEnd> {
        let context = Self::context(id, &job.provider, OperationPhase::Compilation);
        let optimizer = &self.inner.optimizer;
        let err = match optimizer.optimize(&job.circuit, &job.provider, None) {
            Ok(result) => return Ok(result),
            Err(e) if e.is_validation() => return Err(self.fail_with(e.into(), &context)),
            Err(e) => e,
        };

        let raw = RawError::from(err);
        let details = classify(&raw, &context);
        let strategy = self.inner.recovery.select_strategy(&details).clone();
        warn!(job_id = %id, strategy = %strategy.name, "Optimization failed, falling back to conservative pipeline");
        let outcome = self
            .inner
            .recovery
            .execute(&strategy, &details, RetryScope::new(context, token.clone()), |_| {
                std::future::ready(
                    optimizer
                        .optimize_conservative(&job.circuit, &job.provider)
                        .map_err(RawError::from),
                )
            })
            .await;
        let retries = outcome.retry_count;
        match outcome.state {
            RecoveryState::Recovered(result) => Ok(result),
            RecoveryState::Cancelled => Err(JobEnd::Cancelled),
            _ => Err(JobEnd::Failed {
                error: outcome.follow_up.unwrap_or(details),
                retries,
            }),
        }
    }

    async fn drive(
        &self,
        id: &JobId,
        handle: &Mutex<Job>,
        token: &CancellationToken,
        provider: &str,
    ) -> JobEnd {
        let job = handle.lock().await.clone();
        if job.status() != JobStatus::Optimizing {
            return JobEnd::Cancelled;
        }

        let optimization = match self.optimize(id, &job, token).await {
            Ok(result) => result,
            Err(end) => return end,
        };
        let optimized = optimization.optimized_circuit.clone();

        let context = Self::context(id, provider, OperationPhase::Compilation);
        if let Err(e) = self
            .inner
            .resources
            .check_depth(id, provider, optimized.depth())
        {
            return self.fail_with(e.into(), &context);
        }
        let fidelity = match self.inner.estimator.estimate_fidelity(&optimized, provider) {
            Ok(estimate) => estimate,
            Err(e) => return self.fail_with(e.into(), &context),
        };
        let runtime_us = match self.inner.estimator.analyze(&optimized, provider) {
            Ok(analysis) => analysis.estimated_runtime_us,
            Err(e) => return self.fail_with(e.into(), &context),
        };

        {
            let mut job = handle.lock().await;
            if job.status().is_terminal() {
                return JobEnd::Cancelled;
            }
            debug!(
                job_id = %id,
                fidelity = fidelity.overall_fidelity,
                gates = optimized.num_gates(),
                "Job optimized"
            );
            job.set_optimization(optimization);
            job.set_fidelity(fidelity);
        }

        let request = ExecutionRequest::new(job.name.clone(), provider, optimized)
            .with_runtime_us(runtime_us)
            .with_shots(job.shots);
        self.execute(id, handle, token, provider, &request).await
    }

    async fn execute(
        &self,
        id: &JobId,
        handle: &Mutex<Job>,
        token: &CancellationToken,
        provider: &str,
        request: &ExecutionRequest,
    ) -> JobEnd {
        let (phase, raw) = match self.attempt(handle, token, request).await {
            Ok(Attempt::Finished(report)) => {
                debug!(job_id = %id, handle = %report.handle, "Execution finished");
                return JobEnd::Completed { retries: 0 };
            }
            Ok(Attempt::Cancelled) => return JobEnd::Cancelled,
            Err(failure) => failure,
        };

        let context = Self::context(id, provider, phase);
        let details = classify(&raw, &context);
        let strategy = self.inner.recovery.select_strategy(&details).clone();
        if strategy.retries_automatically() && details.recoverable() {
            let mut job = handle.lock().await;
            if job.status().is_terminal() {
                return JobEnd::Cancelled;
            }
            if let Err(e) = job.transition(JobStatus::Retrying, Some(details.to_string())) {
                return self.fail_with(e.into(), &context);
            }
        }

        let mut scope = RetryScope::new(context, token.clone());
        if let Some(deadline) = self.inner.resources.max_wait_time(provider) {
            scope = scope.with_deadline(deadline);
        }
        let outcome = self
            .inner
            .recovery
            .execute(&strategy, &details, scope, move |_| async move {
                match self.attempt(handle, token, request).await {
                    Ok(attempt) => Ok(attempt),
                    Err((_, raw)) => {
                        let mut job = handle.lock().await;
                        if !job.status().is_terminal() {
                            let reason = Some(raw.to_string());
                            if let Err(e) = job.transition(JobStatus::Retrying, reason) {
                                debug!("Could not mark job for retry: {}", e);
                            }
                        }
                        Err(raw)
                    }
                }
            })
            .await;

        let retries = outcome.retry_count;
        match outcome.state {
            RecoveryState::Recovered(Attempt::Finished(_)) => JobEnd::Completed { retries },
            RecoveryState::Recovered(Attempt::Cancelled) | RecoveryState::Cancelled => {
                JobEnd::Cancelled
            }
            _ => JobEnd::Failed {
                error: outcome.follow_up.unwrap_or(details),
                retries,
            },
        }
    }

    /// Submit under the job lock, then wait racing the cancellation token.
    async fn attempt(
        &self,
        handle: &Mutex<Job>,
        token: &CancellationToken,
        request: &ExecutionRequest,
    ) -> Result<Attempt, (OperationPhase, RawError)> {
        let submission = |e: SchedError| (OperationPhase::Submission, RawError::from(e));
        let execution = {
            let mut job = handle.lock().await;
            if job.status().is_terminal() {
                return Ok(Attempt::Cancelled);
            }
            job.transition(JobStatus::Submitted, None).map_err(submission)?;
            let execution = self
                .inner
                .backend
                .submit(request)
                .await
                .map_err(|e| (OperationPhase::Submission, RawError::from(e)))?;
            job.transition(JobStatus::Running, Some(execution.to_string()))
                .map_err(submission)?;
            execution
        };

        tokio::select! {
            result = self.inner.backend.wait(&execution) => result
                .map(Attempt::Finished)
                .map_err(|e| (OperationPhase::Execution, RawError::from(e))),
            () = token.cancelled() => {
                if let Err(e) = self.inner.backend.cancel(&execution).await {
                    warn!(execution = %execution, error = %e, "Backend cancel failed");
                }
                Ok(Attempt::Cancelled)
            }
        }
    }

    async fn refresh_batch(&self, batch_id: &BatchId) -> SchedResult<BatchSnapshot> {
        let (job_ids, handles) = {
            let state = self.inner.state.read().await;
            let batch = state
                .batches
                .get(batch_id)
                .ok_or_else(|| SchedError::BatchNotFound(batch_id.to_string()))?;
            let handles: Vec<Arc<Mutex<Job>>> = batch
                .job_ids
                .iter()
                .filter_map(|id| state.jobs.get(id).map(|e| e.handle.clone()))
                .collect();
            (batch.job_ids.clone(), handles)
        };
        let mut jobs = Vec::with_capacity(job_ids.len());
        for handle in handles {
            jobs.push(handle.lock().await.clone());
        }

        let mut state = self.inner.state.write().await;
        let batch = state
            .batches
            .get_mut(batch_id)
            .ok_or_else(|| SchedError::BatchNotFound(batch_id.to_string()))?;
        batch.refresh(jobs.iter().map(Job::status));
        Ok(BatchSnapshot {
            batch: batch.clone(),
            jobs,
        })
    }
}

#[async_trait]
impl Scheduler for BatchScheduler {
    #[instrument(skip(self, jobs), fields(jobs = jobs.len()))]
    async fn submit_batch(&self, mut jobs: Vec<Job>, strategy: &str) -> SchedResult<BatchId> {
        let mut state = self.inner.state.write().await;
        if let Err(e) = self.validate_batch(&state, &jobs, strategy) {
            let context = ErrorContext::new(OperationPhase::Validation);
            let details = self
                .inner
                .recovery
                .observe(&RawError::from(e.clone()), &context);
            warn!(code = %details.code(), "Batch rejected: {}", e);
            return Err(e);
        }

        for job in &mut jobs {
            job.set_sequence(state.next_sequence);
            state.next_sequence += 1;
        }
        let name = format!("batch-{}", state.batch_order.len() + 1);
        let batch = BatchJob::create(name, strategy, &jobs, &self.inner.estimator)?;
        let batch_id = batch.id;

        for job in jobs {
            state.jobs.insert(
                job.id,
                JobEntry {
                    dependencies: job.dependencies.clone(),
                    handle: Arc::new(Mutex::new(job)),
                    batch: batch_id,
                    token: CancellationToken::new(),
                },
            );
        }
        info!(
            batch_id = %batch_id,
            strategy,
            optimal_provider = %batch.optimal_provider,
            "Batch submitted"
        );
        state.batch_order.push(batch_id);
        state.batches.insert(batch_id, batch);
        drop(state);

        self.inner.changed.notify_waiters();
        Ok(batch_id)
    }

    async fn get_batch_status(&self, batch_id: &BatchId) -> SchedResult<BatchSnapshot> {
        self.refresh_batch(batch_id).await
    }

    async fn cancel_batch(&self, batch_id: &BatchId) -> SchedResult<bool> {
        let entries: Vec<(Arc<Mutex<Job>>, CancellationToken)> = {
            let state = self.inner.state.read().await;
            let batch = state
                .batches
                .get(batch_id)
                .ok_or_else(|| SchedError::BatchNotFound(batch_id.to_string()))?;
            batch
                .job_ids
                .iter()
                .filter_map(|id| state.jobs.get(id))
                .map(|e| (e.handle.clone(), e.token.clone()))
                .collect()
        };

        let mut cancelled = 0;
        for (handle, token) in entries {
            let mut job = handle.lock().await;
            if job.status().is_terminal() {
                continue;
            }
            job.transition(JobStatus::Cancelled, Some("batch cancelled".into()))?;
            token.cancel();
            cancelled += 1;
        }
        info!(batch_id = %batch_id, cancelled, "Batch cancelled");
        self.inner.changed.notify_waiters();
        Ok(cancelled > 0)
    }

    async fn cancel_job(&self, job_id: &JobId) -> SchedResult<()> {
        let (handle, token) = self.entry(job_id).await?;
        {
            let mut job = handle.lock().await;
            job.transition(JobStatus::Cancelled, Some("cancelled by user".into()))?;
        }
        token.cancel();
        info!(job_id = %job_id, "Job cancelled");
        self.inner.changed.notify_waiters();
        Ok(())
    }

    async fn get_job(&self, job_id: &JobId) -> SchedResult<Job> {
        let (handle, _) = self.entry(job_id).await?;
        let job = handle.lock().await.clone();
        Ok(job)
    }

    async fn wait_for_batch(
        &self,
        batch_id: &BatchId,
        timeout: Duration,
    ) -> SchedResult<BatchSnapshot> {
        let deadline = Instant::now() + timeout;
        loop {
            self.process_pending().await?;
            let snapshot = self.refresh_batch(batch_id).await?;
            if snapshot.batch.is_terminal() {
                return Ok(snapshot);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(SchedError::Timeout(batch_id.to_string()));
            }
            let pause = self.inner.config.poll_interval.min(deadline - now);
            tokio::select! {
                () = self.inner.changed.notified() => {}
                () = tokio::time::sleep(pause) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qforge_compile::OptimizerConfig;
    use qforge_hal::SimulatedBackend;
    use qforge_ir::Circuit;
    use qforge_recovery::{ErrorLedger, StrategyRegistry as RecoveryStrategies};

    fn scheduler_with(backend: Arc<SimulatedBackend>, config: SchedulerConfig) -> BatchScheduler {
        let registry = Arc::new(ProviderRegistry::with_defaults());
        let optimizer = Arc::new(Optimizer::new(registry.clone(), OptimizerConfig::default()));
        let recovery = RecoveryEngine::new(
            Arc::new(RecoveryStrategies::with_defaults()),
            Arc::new(ErrorLedger::new()),
        )
        .with_jitter(Duration::ZERO);
        BatchScheduler::new(registry, optimizer, recovery, backend, config).unwrap()
    }

    fn scheduler() -> BatchScheduler {
        scheduler_with(Arc::new(SimulatedBackend::new()), SchedulerConfig::default())
    }

    fn bell(provider: &str) -> Job {
        Job::new("bell", Circuit::bell().unwrap(), provider)
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_and_complete() {
        let s = scheduler();
        let batch = s.submit_batch(vec![bell("A"), bell("B")], "fifo").await.unwrap();
        let snap = s.wait_for_batch(&batch, Duration::from_secs(60)).await.unwrap();
        assert_eq!(snap.batch.status, JobStatus::Completed);
        assert!(snap.batch.completed_at.is_some());
        for job in &snap.jobs {
            assert_eq!(job.status(), JobStatus::Completed);
            assert!(job.optimization().is_some());
            assert!(job.fidelity().is_some());
            assert_eq!(job.retry_count(), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_strategy_rejected() {
        let s = scheduler();
        let err = s.submit_batch(vec![bell("A")], "round-robin").await.unwrap_err();
        assert!(matches!(err, SchedError::UnknownStrategy(_)));
        assert_eq!(s.recovery().ledger().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_and_unknown_provider_rejected() {
        let s = scheduler();
        assert!(matches!(
            s.submit_batch(vec![], "fifo").await,
            Err(SchedError::EmptyBatch)
        ));
        let err = s.submit_batch(vec![bell("Z")], "fifo").await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_required_dependency_rejected() {
        let s = scheduler();
        let job = bell("A").depends_on(Dependency::required(
            JobId::new(),
            crate::job::DependencyKind::Success,
        ));
        assert!(matches!(
            s.submit_batch(vec![job], "fifo").await,
            Err(SchedError::InvalidDependency(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_job_twice() {
        let s = scheduler();
        let job = bell("A");
        let id = job.id;
        s.submit_batch(vec![job], "priority").await.unwrap();
        s.cancel_job(&id).await.unwrap();
        assert!(matches!(
            s.cancel_job(&id).await,
            Err(SchedError::AlreadyTerminal { .. })
        ));
        assert!(matches!(
            s.get_job(&JobId::new()).await,
            Err(SchedError::JobNotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_report() {
        let s = scheduler();
        s.submit_batch(vec![bell("A"), bell("A")], "fifo").await.unwrap();
        let report = s.process_pending().await.unwrap();
        assert_eq!(report.promoted, 2);
        assert_eq!(report.admitted, 2);
        assert_eq!(report.deferred, 0);
        s.drain().await;
        assert!(s.stats().await.iter().all(|u| u.in_flight == 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_loop_completes_batch() {
        let s = scheduler();
        let shutdown = CancellationToken::new();
        let task = s.start(shutdown.clone());
        let batch = s.submit_batch(vec![bell("C")], "cost-optimized").await.unwrap();
        loop {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if s.get_batch_status(&batch).await.unwrap().batch.is_terminal() {
                break;
            }
        }
        shutdown.cancel();
        task.await.unwrap();
        let snap = s.get_batch_status(&batch).await.unwrap();
        assert_eq!(snap.batch.status, JobStatus::Completed);
    }
}
