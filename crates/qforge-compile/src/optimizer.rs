//! Registry-backed optimizer entry point.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use qforge_hal::ProviderRegistry;
use qforge_ir::Circuit;
use qforge_noise::estimate;

use crate::error::{CompileError, CompileResult};
use crate::manager::PassManager;
use crate::property::{DEFAULT_MERGE_TOLERANCE, DEFAULT_MITIGATION_ERROR_THRESHOLD, PropertySet};
use crate::result::{CircuitMetrics, OptimizationImpact, OptimizationResult};
use crate::stage::OptimizationStage;

/// Optimizer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Stages used when a request does not name any.
    #[serde(default = "default_stages")]
    pub enabled_stages: Vec<OptimizationStage>,
    /// Gates with a higher error rate get echo pairs.
    #[serde(default = "default_mitigation_threshold")]
    pub mitigation_error_threshold: f64,
    /// Tolerance for dropping identity runs while merging.
    #[serde(default = "default_merge_tolerance")]
    pub merge_tolerance: f64,
}

fn default_stages() -> Vec<OptimizationStage> {
    OptimizationStage::ALL.to_vec()
}

fn default_mitigation_threshold() -> f64 {
    DEFAULT_MITIGATION_ERROR_THRESHOLD
}

fn default_merge_tolerance() -> f64 {
    DEFAULT_MERGE_TOLERANCE
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            enabled_stages: default_stages(),
            mitigation_error_threshold: default_mitigation_threshold(),
            merge_tolerance: default_merge_tolerance(),
        }
    }
}

impl OptimizerConfig {
    /// Reject settings no pipeline can run with.
    pub fn validate(&self) -> CompileResult<()> {
        if self.enabled_stages.is_empty() {
            return Err(CompileError::Validation(
                "at least one optimization stage must be enabled".into(),
            ));
        }
        if !(self.mitigation_error_threshold.is_finite() && self.mitigation_error_threshold >= 0.0)
        {
            return Err(CompileError::Validation(format!(
                "mitigation error threshold must be a non-negative number, got {}",
                self.mitigation_error_threshold
            )));
        }
        if !(self.merge_tolerance.is_finite() && self.merge_tolerance > 0.0) {
            return Err(CompileError::Validation(format!(
                "merge tolerance must be positive, got {}",
                self.merge_tolerance
            )));
        }
        Ok(())
    }
}

/// Provider-aware circuit optimizer.
#[derive(Debug)]
pub struct Optimizer {
    registry: Arc<ProviderRegistry>,
    config: OptimizerConfig,
    invocations: AtomicU64,
}

impl Optimizer {
    /// Create an optimizer over `registry`.
    pub fn new(registry: Arc<ProviderRegistry>, config: OptimizerConfig) -> Self {
        Self {
            registry,
            config,
            invocations: AtomicU64::new(0),
        }
    }

    /// The settings this optimizer runs with.
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Number of `optimize` calls so far, failed ones included.
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    /// Optimize `circuit` for `provider`.
    ///
    /// `stages` overrides the configured stage list; stages always run in
    /// pipeline order. Percentages in the result compare the final circuit
    /// with the original one.
    #[instrument(skip(self, circuit, stages), fields(qubits = circuit.num_qubits(), gates = circuit.num_gates()))]
    pub fn optimize(
        &self,
        circuit: &Circuit,
        provider: &str,
        stages: Option<&[OptimizationStage]>,
    ) -> CompileResult<OptimizationResult> {
        self.invocations.fetch_add(1, Ordering::Relaxed);

        circuit
            .validate()
            .map_err(|e| CompileError::Validation(e.to_string()))?;
        let cap = self.registry.lookup(provider)?;
        cap.check_fits(circuit.num_qubits())?;

        let stages = OptimizationStage::normalize(stages.unwrap_or(&self.config.enabled_stages));
        if stages.is_empty() {
            return Err(CompileError::Validation(
                "no optimization stages selected".into(),
            ));
        }

        let original_fidelity = estimate(circuit, &cap).overall_fidelity;
        let original = CircuitMetrics::measure(circuit, &cap, original_fidelity);

        let mut properties = PropertySet::new(cap.clone())
            .with_mitigation_threshold(self.config.mitigation_error_threshold)
            .with_merge_tolerance(self.config.merge_tolerance);
        properties.expected_fidelity = original_fidelity;

        let mut optimized = circuit.clone();
        let stage_impacts = PassManager::for_stages(&stages).run(&mut optimized, &mut properties)?;
        let last = stage_impacts.last().map_or(original, |s| s.after);
        let impact = OptimizationImpact::between(&original, &last);

        info!(
            provider,
            gates_before = original.gates,
            gates_after = last.gates,
            fidelity = properties.expected_fidelity,
            "Optimization finished"
        );

        Ok(OptimizationResult {
            original_circuit: circuit.clone(),
            optimized_circuit: optimized,
            provider: cap.name.clone(),
            algorithm_name: OptimizationResult::algorithm_name_for(&stages),
            impact,
            stage_impacts,
            trace: properties.trace,
            layout: properties.layout,
            expected_fidelity: properties.expected_fidelity,
        })
    }

    /// Cancellation and transpilation only.
    ///
    /// Used as the fallback pipeline after a compilation failure.
    pub fn optimize_conservative(
        &self,
        circuit: &Circuit,
        provider: &str,
    ) -> CompileResult<OptimizationResult> {
        self.optimize(circuit, provider, Some(&OptimizationStage::CONSERVATIVE))
    }
}
