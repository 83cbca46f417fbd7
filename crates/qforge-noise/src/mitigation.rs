//! Error-mitigation recommendations.
//!
//! Provider-specific techniques come first, then a shared fallback list.
//! Each technique appears at most once.

use std::fmt;

use serde::{Deserialize, Serialize};

use qforge_hal::{ErrorCorrectionLevel, ProviderCapability};
use qforge_ir::Circuit;

use crate::estimator::FidelityEstimate;

/// ZNE applies above this error probability.
pub const ZNE_MIN_ERROR: f64 = 0.02;
/// PEC applies strictly above this error probability.
pub const PEC_MIN_ERROR: f64 = 0.01;
/// PEC sampling overhead explodes beyond this error probability.
pub const PEC_MAX_ERROR: f64 = 0.5;
/// PEC applies up to this many entangling gates.
pub const PEC_MAX_TWO_QUBIT_GATES: usize = 50;
/// Dynamical decoupling applies above this depth.
pub const DD_MIN_DEPTH: usize = 10;
/// Circuit cutting applies above this depth on sparse devices.
pub const CUTTING_MIN_DEPTH: usize = 40;
/// Readout mitigation applies above this readout error.
pub const READOUT_MIN_ERROR: f64 = 0.01;

/// A mitigation technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MitigationTechnique {
    /// Encode into the provider's logical qubits.
    LogicalEncoding,
    /// Flag-qubit error detection with post-selection.
    ErrorDetection,
    /// Cut the circuit into shallower fragments.
    CircuitCutting,
    /// Idle-qubit decoupling pulse sequences.
    DynamicalDecoupling,
    /// Zero-noise extrapolation.
    ZeroNoiseExtrapolation,
    /// Probabilistic error cancellation.
    ProbabilisticErrorCancellation,
    /// Readout confusion-matrix inversion.
    ReadoutMitigation,
}

impl MitigationTechnique {
    /// Kebab-case name.
    pub fn name(self) -> &'static str {
        match self {
            MitigationTechnique::LogicalEncoding => "logical-encoding",
            MitigationTechnique::ErrorDetection => "error-detection",
            MitigationTechnique::CircuitCutting => "circuit-cutting",
            MitigationTechnique::DynamicalDecoupling => "dynamical-decoupling",
            MitigationTechnique::ZeroNoiseExtrapolation => "zero-noise-extrapolation",
            MitigationTechnique::ProbabilisticErrorCancellation => {
                "probabilistic-error-cancellation"
            }
            MitigationTechnique::ReadoutMitigation => "readout-mitigation",
        }
    }
}

impl fmt::Display for MitigationTechnique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A recommended technique with its modeled effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MitigationStrategy {
    /// The technique.
    pub technique: MitigationTechnique,
    /// Expected absolute fidelity gain.
    pub fidelity_improvement_estimate: f64,
    /// Runtime or shot overhead factor (≥ 1).
    pub overhead_multiplier: f64,
    /// Why it was selected.
    pub applicability_conditions: Vec<String>,
}

/// Recommend mitigations for `circuit` on `cap`, most specific first.
pub fn recommend(
    circuit: &Circuit,
    cap: &ProviderCapability,
    estimate: &FidelityEstimate,
) -> Vec<MitigationStrategy> {
    if circuit.num_gates() == 0 {
        return vec![];
    }

    let p = estimate.error_probability;
    let depth = circuit.depth();
    let two_q = circuit.two_qubit_gate_count();
    let mut out: Vec<MitigationStrategy> = Vec::new();
    let mut push = |technique: MitigationTechnique, factor: f64, overhead: f64, why: String| {
        if out.iter().any(|s| s.technique == technique) {
            return;
        }
        out.push(MitigationStrategy {
            technique,
            fidelity_improvement_estimate: (factor * p).min(p),
            overhead_multiplier: overhead,
            applicability_conditions: vec![why],
        });
    };

    match cap.error_correction {
        ErrorCorrectionLevel::Logical => push(
            MitigationTechnique::LogicalEncoding,
            0.8,
            7.0,
            format!("provider {} exposes logical qubits", cap.name),
        ),
        ErrorCorrectionLevel::Advanced if two_q > 0 => push(
            MitigationTechnique::ErrorDetection,
            0.4,
            1.5,
            format!("provider {} supports error detection; {two_q} entangling gates", cap.name),
        ),
        _ => {}
    }

    if !cap.topology.is_fully_connected() {
        if depth > CUTTING_MIN_DEPTH {
            push(
                MitigationTechnique::CircuitCutting,
                0.3,
                4.0,
                format!("sparse topology and depth {depth} > {CUTTING_MIN_DEPTH}"),
            );
        }
        if depth > DD_MIN_DEPTH {
            push(
                MitigationTechnique::DynamicalDecoupling,
                0.2,
                1.05,
                format!("sparse topology and depth {depth} > {DD_MIN_DEPTH}"),
            );
        }
    }

    if p > ZNE_MIN_ERROR {
        push(
            MitigationTechnique::ZeroNoiseExtrapolation,
            0.5,
            3.0,
            format!("error probability {p:.4} > {ZNE_MIN_ERROR}"),
        );
    }
    if p > PEC_MIN_ERROR && p <= PEC_MAX_ERROR && two_q <= PEC_MAX_TWO_QUBIT_GATES {
        // Sampling overhead grows as gamma^2 with gamma ≈ 1 + 2p.
        let gamma = 1.0 + 2.0 * p;
        push(
            MitigationTechnique::ProbabilisticErrorCancellation,
            0.7,
            gamma * gamma,
            format!(
                "error probability {p:.4} in ({PEC_MIN_ERROR}, {PEC_MAX_ERROR}] with {two_q} <= {PEC_MAX_TWO_QUBIT_GATES} entangling gates"
            ),
        );
    }
    if depth > DD_MIN_DEPTH {
        push(
            MitigationTechnique::DynamicalDecoupling,
            0.2,
            1.05,
            format!("depth {depth} > {DD_MIN_DEPTH}"),
        );
    }
    if estimate.readout_error > READOUT_MIN_ERROR {
        let readout = estimate.readout_error.min(1.0);
        out.push(MitigationStrategy {
            technique: MitigationTechnique::ReadoutMitigation,
            fidelity_improvement_estimate: (0.8 * readout).min(p),
            overhead_multiplier: 1.1,
            applicability_conditions: vec![format!(
                "readout error {:.4} > {READOUT_MIN_ERROR}",
                estimate.readout_error
            )],
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::estimate;
    use qforge_ir::QubitId;

    fn techniques(circuit: &Circuit, cap: &ProviderCapability) -> Vec<MitigationTechnique> {
        recommend(circuit, cap, &estimate(circuit, cap))
            .into_iter()
            .map(|s| s.technique)
            .collect()
    }

    fn deep(n: usize) -> Circuit {
        let mut c = Circuit::with_size("deep", 2, 0);
        for _ in 0..n {
            c.cx(QubitId(0), QubitId(1)).unwrap();
        }
        c
    }

    #[test]
    fn test_technique_serializes_as_display_name() {
        for technique in [
            MitigationTechnique::LogicalEncoding,
            MitigationTechnique::ProbabilisticErrorCancellation,
            MitigationTechnique::ReadoutMitigation,
        ] {
            let json = serde_json::to_value(technique).unwrap();
            assert_eq!(json, serde_json::Value::String(technique.to_string()));
            let back: MitigationTechnique = serde_json::from_value(json).unwrap();
            assert_eq!(back, technique);
        }

        let cap = ProviderCapability::provider_b();
        let circuit = deep(60);
        let strategies = recommend(&circuit, &cap, &estimate(&circuit, &cap));
        let json = serde_json::to_value(&strategies).unwrap();
        assert_eq!(json[0]["technique"], strategies[0].technique.name());
    }

    #[test]
    fn test_empty_circuit_has_none() {
        let cap = ProviderCapability::provider_b();
        assert!(techniques(&Circuit::with_size("e", 2, 0), &cap).is_empty());
    }

    #[test]
    fn test_logical_provider_prefers_encoding() {
        let cap = ProviderCapability::provider_c();
        let t = techniques(&Circuit::bell().unwrap(), &cap);
        assert_eq!(t[0], MitigationTechnique::LogicalEncoding);
    }

    #[test]
    fn test_advanced_provider_error_detection() {
        let cap = ProviderCapability::provider_a();
        let t = techniques(&Circuit::bell().unwrap(), &cap);
        assert_eq!(t[0], MitigationTechnique::ErrorDetection);

        let mut single = Circuit::with_size("s", 1, 0);
        single.x(QubitId(0)).unwrap();
        assert!(!techniques(&single, &cap).contains(&MitigationTechnique::ErrorDetection));
    }

    #[test]
    fn test_sparse_provider_depth_rules() {
        let cap = ProviderCapability::provider_b();
        let t = techniques(&deep(45), &cap);
        assert_eq!(t[0], MitigationTechnique::CircuitCutting);
        assert_eq!(t[1], MitigationTechnique::DynamicalDecoupling);
        assert_eq!(
            t.iter()
                .filter(|&&x| x == MitigationTechnique::DynamicalDecoupling)
                .count(),
            1
        );
    }

    #[test]
    fn test_fallback_thresholds() {
        let cap = ProviderCapability::provider_b();
        // 5 cx at 0.99 plus decoherence: p ≈ 0.06
        let t = techniques(&deep(5), &cap);
        assert!(t.contains(&MitigationTechnique::ZeroNoiseExtrapolation));
        assert!(t.contains(&MitigationTechnique::ProbabilisticErrorCancellation));
        assert!(!t.contains(&MitigationTechnique::DynamicalDecoupling));
        // 2 active qubits × 0.02 readout error
        assert!(t.contains(&MitigationTechnique::ReadoutMitigation));
    }

    #[test]
    fn test_pec_skipped_for_many_entanglers() {
        let cap = ProviderCapability::provider_b();
        let t = techniques(&deep(60), &cap);
        assert!(!t.contains(&MitigationTechnique::ProbabilisticErrorCancellation));
    }

    #[test]
    fn test_improvement_bounded_by_error() {
        let cap = ProviderCapability::provider_b();
        let c = deep(30);
        let est = estimate(&c, &cap);
        for s in recommend(&c, &cap, &est) {
            assert!(s.fidelity_improvement_estimate <= est.error_probability + 1e-12);
            assert!(s.overhead_multiplier >= 1.0);
        }
    }
}
