//! Fidelity estimation.
//!
//! The model multiplies tabulated gate fidelities per gate type and applies
//! exponential decoherence per active qubit:
//!
//! ```text
//! per_gate[g]   = fidelity(g) ^ count(g)
//! per_qubit[q]  = exp(-busy_time(q) / max(T1, T2))
//! overall       = mean(per_gate) × mean(per_qubit) = exp(-(gate_error + decoherence_error))
//! ```
//!
//! Crosstalk and readout errors are reported alongside but kept out of
//! `total_error`; they drive mitigation selection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use qforge_hal::ProviderCapability;
use qforge_ir::{Circuit, QubitId};

use crate::analysis::{greedy_layers, qubit_runtimes_us};

/// Error added per extra entangling gate sharing a layer.
pub const CROSSTALK_PER_PARALLEL_PAIR: f64 = 0.002;

/// Error added per entangling gate on physically uncoupled qubits.
pub const CROSSTALK_PER_NONADJACENT_GATE: f64 = 0.01;

/// Fidelity estimate of a circuit on one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FidelityEstimate {
    /// Provider the estimate refers to.
    pub provider: String,
    /// `exp(-total_error)`, in `(0, 1]`.
    pub overall_fidelity: f64,
    /// Gate name → fidelity of all its applications combined.
    pub per_gate_fidelity: BTreeMap<String, f64>,
    /// Active qubit → decoherence survival probability.
    pub per_qubit_fidelity: BTreeMap<QubitId, f64>,
    /// Mean of `per_gate_fidelity` (1 when there are no gates).
    pub mean_gate_fidelity: f64,
    /// Mean of `per_qubit_fidelity` (1 when no qubit is active).
    pub mean_qubit_fidelity: f64,
    /// `-ln(mean_gate_fidelity)`.
    pub gate_error: f64,
    /// `-ln(mean_qubit_fidelity)`.
    pub decoherence_error: f64,
    /// Parallel and non-adjacent entangling-gate penalty.
    pub crosstalk_error: f64,
    /// Expected readout error over measured qubits.
    pub readout_error: f64,
    /// `gate_error + decoherence_error`.
    pub total_error: f64,
    /// `1 - overall_fidelity`.
    pub error_probability: f64,
}

impl FidelityEstimate {
    /// Check `overall_fidelity ≈ mean_gate_fidelity × mean_qubit_fidelity`.
    pub fn is_consistent(&self, tolerance: f64) -> bool {
        let product =
            (self.mean_gate_fidelity * self.mean_qubit_fidelity).clamp(f64::MIN_POSITIVE, 1.0);
        (self.overall_fidelity - product).abs() <= tolerance * product
    }
}

/// Estimate fidelity of `circuit` on `cap`.
pub fn estimate(circuit: &Circuit, cap: &ProviderCapability) -> FidelityEstimate {
    let per_gate_fidelity: BTreeMap<String, f64> = gate_arities(circuit)
        .into_iter()
        .map(|(name, (arity, count))| {
            let f = cap.gate_fidelity(&name, arity).powi(clamp_count(count));
            (name, f)
        })
        .collect();

    let limit = cap.coherence_limit_us();
    let runtimes = qubit_runtimes_us(circuit, cap);
    let per_qubit_fidelity: BTreeMap<QubitId, f64> = circuit
        .active_qubits()
        .into_iter()
        .map(|q| {
            let busy = runtimes.get(q.index()).copied().unwrap_or(0.0);
            (q, (-busy / limit).exp())
        })
        .collect();

    let mean_gate_fidelity = mean_or_one(per_gate_fidelity.values().copied());
    let mean_qubit_fidelity = mean_or_one(per_qubit_fidelity.values().copied());

    let gate_error = -mean_gate_fidelity.max(f64::MIN_POSITIVE).ln();
    let decoherence_error = -mean_qubit_fidelity.max(f64::MIN_POSITIVE).ln();
    let total_error = gate_error + decoherence_error;
    let overall_fidelity = (-total_error).exp().clamp(f64::MIN_POSITIVE, 1.0);

    FidelityEstimate {
        provider: cap.name.clone(),
        overall_fidelity,
        per_gate_fidelity,
        per_qubit_fidelity,
        mean_gate_fidelity,
        mean_qubit_fidelity,
        gate_error,
        decoherence_error,
        crosstalk_error: crosstalk_error(circuit, cap),
        readout_error: readout_error(circuit, cap),
        total_error,
        error_probability: 1.0 - overall_fidelity,
    }
}

/// Crosstalk penalty of `circuit` on `cap`.
pub fn crosstalk_error(circuit: &Circuit, cap: &ProviderCapability) -> f64 {
    let insts = circuit.instructions();
    let parallel: usize = greedy_layers(circuit)
        .iter()
        .map(|layer| {
            layer
                .iter()
                .filter(|&&i| insts[i].is_multi_qubit_gate())
                .count()
                .saturating_sub(1)
        })
        .sum();

    let nonadjacent = insts
        .iter()
        .filter(|inst| inst.is_multi_qubit_gate())
        .filter(|inst| {
            inst.operand_pairs()
                .any(|(a, b)| !cap.topology.is_connected(a.0, b.0))
        })
        .count();

    parallel as f64 * CROSSTALK_PER_PARALLEL_PAIR
        + nonadjacent as f64 * CROSSTALK_PER_NONADJACENT_GATE
}

/// Readout error; every active qubit counts as measured when nothing is.
pub fn readout_error(circuit: &Circuit, cap: &ProviderCapability) -> f64 {
    let measured = circuit.measured_qubits().len();
    let measured = if measured == 0 {
        circuit.active_qubits().len()
    } else {
        measured
    };
    measured as f64 * (1.0 - cap.noise.readout_fidelity)
}

/// Gate name → (arity, count).
fn gate_arities(circuit: &Circuit) -> BTreeMap<String, (u32, usize)> {
    let mut out: BTreeMap<String, (u32, usize)> = BTreeMap::new();
    for gate in circuit.instructions().iter().filter_map(|i| i.as_gate()) {
        let entry = out
            .entry(gate.name().to_string())
            .or_insert((gate.num_qubits(), 0));
        entry.1 += 1;
    }
    out
}

fn clamp_count(count: usize) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}

fn mean_or_one(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 1.0 } else { sum / n as f64 }
}
