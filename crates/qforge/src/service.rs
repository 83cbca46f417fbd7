//! The qforge service.
//!
//! [`QForge`] builds the provider registry, optimizer, estimator, recovery
//! engine and batch scheduler once and exposes them through a small set of
//! calls. Synchronous failures of those calls are classified and recorded
//! in the error ledger just like failures inside scheduled jobs.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use qforge_compile::{OptimizationResult, OptimizationStage, Optimizer};
use qforge_hal::{Backend, ProviderCapability, ProviderRegistry, SimulatedBackend};
use qforge_ir::Circuit;
use qforge_noise::{
    CircuitAnalysis, FidelityEstimate, MitigationStrategy, NoiseEstimator, ProviderCandidate,
};
use qforge_recovery::{ErrorContext, ErrorLedger, OperationPhase, RawError, RecoveryEngine};
use qforge_sched::{BatchId, BatchScheduler, BatchSnapshot, Job, Scheduler};

use crate::config::QForgeConfig;
use crate::error::{QForgeError, QForgeResult};

/// Entry point bundling every qforge component.
#[derive(Clone)]
pub struct QForge {
    config: Arc<QForgeConfig>,
    registry: Arc<ProviderRegistry>,
    optimizer: Arc<Optimizer>,
    estimator: NoiseEstimator,
    scheduler: BatchScheduler,
}

impl std::fmt::Debug for QForge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QForge")
            .field("providers", &self.registry.providers())
            .field("default_strategy", &self.config.scheduler.default_strategy)
            .finish_non_exhaustive()
    }
}

impl QForge {
    /// Build the service with the in-process simulated backend.
    pub fn new(config: QForgeConfig) -> QForgeResult<Self> {
        Self::with_backend(config, Arc::new(SimulatedBackend::new()))
    }

    /// Build the service around `backend`.
    pub fn with_backend(config: QForgeConfig, backend: Arc<dyn Backend>) -> QForgeResult<Self> {
        config.validate()?;

        let registry = Arc::new(ProviderRegistry::with_defaults());
        let optimizer = Arc::new(Optimizer::new(registry.clone(), config.optimizer.clone()));
        let estimator = NoiseEstimator::new(registry.clone());

        let strategies = Arc::new(config.recovery.strategy_registry()?);
        let ledger = Arc::new(ErrorLedger::with_capacity(
            config.recovery.ledger_capacity_hint,
        ));
        let recovery =
            RecoveryEngine::new(strategies, ledger).with_jitter(config.recovery.jitter());

        let scheduler = BatchScheduler::new(
            registry.clone(),
            optimizer.clone(),
            recovery,
            backend,
            config.scheduler.scheduler_config(),
        )?;

        info!(
            providers = registry.len(),
            default_strategy = %config.scheduler.default_strategy,
            "qforge service ready"
        );

        Ok(Self {
            config: Arc::new(config),
            registry,
            optimizer,
            estimator,
            scheduler,
        })
    }

    /// The configuration the service was built with.
    pub fn config(&self) -> &QForgeConfig {
        &self.config
    }

    /// Every registered provider.
    pub fn providers(&self) -> Vec<Arc<ProviderCapability>> {
        self.registry.capabilities()
    }

    /// The batch scheduler.
    pub fn scheduler(&self) -> &BatchScheduler {
        &self.scheduler
    }

    /// Every error observed so far.
    pub fn error_ledger(&self) -> &Arc<ErrorLedger> {
        self.scheduler.recovery().ledger()
    }

    /// Optimize `circuit` for `provider`.
    ///
    /// `stages` overrides the configured stage list.
    #[instrument(skip(self, circuit, stages), fields(circuit = %circuit.name()))]
    pub fn optimize_circuit(
        &self,
        circuit: &Circuit,
        provider: &str,
        stages: Option<&[OptimizationStage]>,
    ) -> QForgeResult<OptimizationResult> {
        let result = self
            .optimizer
            .optimize(circuit, provider, stages)
            .map_err(QForgeError::from);
        self.observed(result, OperationPhase::Compilation, Some(provider))
    }

    /// Estimate the fidelity of `circuit` on `provider`.
    pub fn estimate_fidelity(
        &self,
        circuit: &Circuit,
        provider: &str,
    ) -> QForgeResult<FidelityEstimate> {
        let result = self
            .estimator
            .estimate_fidelity(circuit, provider)
            .map_err(QForgeError::from);
        self.observed(result, OperationPhase::Validation, Some(provider))
    }

    /// Gate statistics, runtime and cost of `circuit` on `provider`.
    pub fn analyze(&self, circuit: &Circuit, provider: &str) -> QForgeResult<CircuitAnalysis> {
        let result = self
            .estimator
            .analyze(circuit, provider)
            .map_err(QForgeError::from);
        self.observed(result, OperationPhase::Validation, Some(provider))
    }

    /// Mitigations worth applying to `circuit` on `provider`.
    pub fn recommend_mitigations(
        &self,
        circuit: &Circuit,
        provider: &str,
    ) -> QForgeResult<Vec<MitigationStrategy>> {
        let result = self
            .estimator
            .recommend_mitigations(circuit, provider)
            .map_err(QForgeError::from);
        self.observed(result, OperationPhase::Validation, Some(provider))
    }

    /// Providers able to run `circuit`, best first.
    pub fn suggest_provider(&self, circuit: &Circuit) -> QForgeResult<Vec<ProviderCandidate>> {
        let result = self
            .estimator
            .suggest_provider(circuit)
            .map_err(QForgeError::from);
        self.observed(result, OperationPhase::Validation, None)
    }

    /// Parse interchange text.
    pub fn parse_circuit(&self, source: &str) -> QForgeResult<Circuit> {
        let result = qforge_qasm::parse(source).map_err(QForgeError::from);
        self.observed(result, OperationPhase::Validation, None)
    }

    /// Render `circuit` as interchange text.
    pub fn emit_circuit(&self, circuit: &Circuit) -> String {
        qforge_qasm::emit(circuit)
    }

    /// Submit `jobs` as one batch ordered by `strategy`, or by the
    /// configured default strategy.
    ///
    /// Rejections are recorded in the ledger by the scheduler itself.
    pub async fn submit_batch(&self, jobs: Vec<Job>, strategy: Option<&str>) -> QForgeResult<BatchId> {
        let strategy = strategy.unwrap_or(self.config.scheduler.default_strategy.as_str());
        Ok(self.scheduler.submit_batch(jobs, strategy).await?)
    }

    /// A batch with its jobs.
    pub async fn get_batch_status(&self, batch_id: &BatchId) -> QForgeResult<BatchSnapshot> {
        Ok(self.scheduler.get_batch_status(batch_id).await?)
    }

    /// Cancel every non-terminal job of a batch. Returns whether any was.
    pub async fn cancel_batch(&self, batch_id: &BatchId) -> QForgeResult<bool> {
        Ok(self.scheduler.cancel_batch(batch_id).await?)
    }

    /// Drive a batch until every job is terminal or `timeout` passes.
    pub async fn wait_for_batch(
        &self,
        batch_id: &BatchId,
        timeout: Duration,
    ) -> QForgeResult<BatchSnapshot> {
        Ok(self.scheduler.wait_for_batch(batch_id, timeout).await?)
    }

    /// Start background scheduling rounds until `shutdown` is cancelled.
    pub fn start(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        self.scheduler.start(shutdown)
    }

    fn observed<T>(
        &self,
        result: QForgeResult<T>,
        phase: OperationPhase,
        provider: Option<&str>,
    ) -> QForgeResult<T> {
        result.inspect_err(|err| {
            let phase = if err.is_validation() {
                OperationPhase::Validation
            } else {
                phase
            };
            let mut context = ErrorContext::new(phase);
            if let Some(provider) = provider {
                context = context.with_provider(provider);
            }
            let raw = RawError::new(err.to_string());
            let raw = match raw_status(err) {
                Some(status) => raw.with_status(status),
                None => raw,
            };
            self.scheduler.recovery().observe(&raw, &context);
        })
    }
}

/// HTTP-like status of a facade error, taken from the per-crate mapping.
fn raw_status(err: &QForgeError) -> Option<u16> {
    let raw: RawError = match err {
        QForgeError::Circuit(e) => e.clone().into(),
        QForgeError::Provider(e) => e.clone().into(),
        QForgeError::Noise(e) => e.clone().into(),
        QForgeError::Compile(e) => e.clone().into(),
        QForgeError::Sched(e) => e.clone().into(),
        other if other.is_validation() => return Some(400),
        _ => return None,
    };
    raw.status
}
