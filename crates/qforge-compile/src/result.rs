//! Optimization results and impact metrics.

use serde::{Deserialize, Serialize};

use qforge_hal::ProviderCapability;
use qforge_ir::Circuit;
use qforge_noise::circuit_cost;

use crate::property::Layout;
use crate::stage::OptimizationStage;

/// Size, cost and fidelity of a circuit at one point of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircuitMetrics {
    /// Gate instructions.
    pub gates: usize,
    /// Circuit depth.
    pub depth: usize,
    /// Estimated price of one submission.
    pub cost: f64,
    /// Expected fidelity.
    pub fidelity: f64,
}

impl CircuitMetrics {
    /// Measure `circuit` on `cap`, attaching an already known `fidelity`.
    pub fn measure(circuit: &Circuit, cap: &ProviderCapability, fidelity: f64) -> Self {
        Self {
            gates: circuit.num_gates(),
            depth: circuit.depth(),
            cost: circuit_cost(circuit, cap),
            fidelity,
        }
    }
}

/// What one stage did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageImpact {
    /// The stage.
    pub stage: OptimizationStage,
    /// Pass that implemented it.
    pub pass: String,
    /// False when the pass decided it did not apply.
    pub ran: bool,
    /// Metrics before the stage.
    pub before: CircuitMetrics,
    /// Metrics after the stage.
    pub after: CircuitMetrics,
}

impl StageImpact {
    /// Signed change in gate count.
    pub fn gate_delta(&self) -> i64 {
        signed(self.after.gates) - signed(self.before.gates)
    }

    /// Signed change in depth.
    pub fn depth_delta(&self) -> i64 {
        signed(self.after.depth) - signed(self.before.depth)
    }

    /// Change in cost.
    pub fn cost_delta(&self) -> f64 {
        self.after.cost - self.before.cost
    }

    /// Change in expected fidelity.
    pub fn fidelity_delta(&self) -> f64 {
        self.after.fidelity - self.before.fidelity
    }
}

/// End-to-end impact, relative to the original circuit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizationImpact {
    /// Percentage of gates removed; negative when the circuit grew.
    pub gate_reduction_pct: f64,
    /// Percentage of depth removed; negative when the circuit deepened.
    pub depth_reduction_pct: f64,
    /// Relative change in expected fidelity, in percent.
    pub fidelity_improvement_pct: f64,
    /// Percentage of the submission price saved.
    pub cost_savings_pct: f64,
}

impl OptimizationImpact {
    /// Compare the final metrics against the original ones.
    pub fn between(original: &CircuitMetrics, optimized: &CircuitMetrics) -> Self {
        Self {
            gate_reduction_pct: reduction_pct(original.gates as f64, optimized.gates as f64),
            depth_reduction_pct: reduction_pct(original.depth as f64, optimized.depth as f64),
            fidelity_improvement_pct: if original.fidelity > 0.0 {
                (optimized.fidelity - original.fidelity) / original.fidelity * 100.0
            } else {
                0.0
            },
            cost_savings_pct: reduction_pct(original.cost, optimized.cost),
        }
    }
}

/// Output of one optimizer invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Circuit as submitted.
    pub original_circuit: Circuit,
    /// Circuit after every enabled stage.
    pub optimized_circuit: Circuit,
    /// Target provider.
    pub provider: String,
    /// `qforge-pipeline[<stage>+...]`.
    pub algorithm_name: String,
    /// End-to-end impact.
    pub impact: OptimizationImpact,
    /// Per-stage deltas in pipeline order.
    pub stage_impacts: Vec<StageImpact>,
    /// Human-readable transformation steps.
    pub trace: Vec<String>,
    /// Layout chosen by the mapping stage.
    pub layout: Option<Layout>,
    /// Expected fidelity after the last stage.
    pub expected_fidelity: f64,
}

impl OptimizationResult {
    /// Algorithm name for a stage list.
    pub fn algorithm_name_for(stages: &[OptimizationStage]) -> String {
        let names: Vec<&str> = stages.iter().map(|s| s.name()).collect();
        format!("qforge-pipeline[{}]", names.join("+"))
    }

    /// Impact of a single stage, if it was part of the run.
    pub fn stage(&self, stage: OptimizationStage) -> Option<&StageImpact> {
        self.stage_impacts.iter().find(|s| s.stage == stage)
    }
}

fn reduction_pct(before: f64, after: f64) -> f64 {
    if before <= 0.0 {
        0.0
    } else {
        (before - after) / before * 100.0
    }
}

fn signed(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(gates: usize, depth: usize, cost: f64, fidelity: f64) -> CircuitMetrics {
        CircuitMetrics {
            gates,
            depth,
            cost,
            fidelity,
        }
    }

    #[test]
    fn test_full_reduction() {
        let impact = OptimizationImpact::between(&metrics(2, 2, 1.1, 0.9), &metrics(0, 0, 1.0, 1.0));
        assert_eq!(impact.gate_reduction_pct, 100.0);
        assert_eq!(impact.depth_reduction_pct, 100.0);
        assert!(impact.fidelity_improvement_pct > 11.0);
        assert!(impact.cost_savings_pct > 9.0);
    }

    #[test]
    fn test_growth_is_negative() {
        let impact = OptimizationImpact::between(&metrics(2, 2, 1.0, 0.9), &metrics(4, 3, 1.0, 0.9));
        assert_eq!(impact.gate_reduction_pct, -100.0);
        assert_eq!(impact.depth_reduction_pct, -50.0);
        assert_eq!(impact.fidelity_improvement_pct, 0.0);
    }

    #[test]
    fn test_empty_original() {
        let impact = OptimizationImpact::between(&metrics(0, 0, 0.0, 1.0), &metrics(0, 0, 0.0, 1.0));
        assert_eq!(impact, OptimizationImpact::default());
    }

    #[test]
    fn test_algorithm_name() {
        assert_eq!(
            OptimizationResult::algorithm_name_for(&OptimizationStage::CONSERVATIVE),
            "qforge-pipeline[gate-cancellation+transpilation]"
        );
    }

    #[test]
    fn test_stage_deltas() {
        let impact = StageImpact {
            stage: OptimizationStage::ErrorMitigation,
            pass: "EchoInjection".into(),
            ran: true,
            before: metrics(3, 3, 1.0, 0.9),
            after: metrics(5, 4, 1.2, 0.95),
        };
        assert_eq!(impact.gate_delta(), 2);
        assert_eq!(impact.depth_delta(), 1);
        assert!((impact.fidelity_delta() - 0.05).abs() < 1e-12);
    }
}
