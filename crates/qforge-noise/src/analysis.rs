//! Structural and timing analysis of a circuit against a provider.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use qforge_hal::ProviderCapability;
use qforge_ir::{Circuit, Instruction, InstructionKind, QubitId};

/// Static analysis of a circuit on one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitAnalysis {
    /// Provider the timings refer to.
    pub provider: String,
    /// Circuit width.
    pub num_qubits: u32,
    /// Gate instructions.
    pub num_gates: usize,
    /// Gate counts by name.
    pub gate_counts: BTreeMap<String, usize>,
    /// Gates acting on two or more qubits.
    pub two_qubit_gates: usize,
    /// Measured qubits.
    pub measurements: usize,
    /// Circuit depth.
    pub depth: usize,
    /// Sum of all operation durations (µs).
    pub estimated_runtime_us: f64,
    /// Gates that share a greedy layer with at least one other gate.
    pub parallelizable_gates: usize,
    /// Longest time-accumulated qubit path (µs).
    pub critical_path_us: f64,
    /// Estimated price of one submission.
    pub estimated_cost: f64,
}

/// Duration of one instruction on `cap` (µs). Barriers take no time.
pub fn instruction_duration_us(inst: &Instruction, cap: &ProviderCapability) -> f64 {
    match &inst.kind {
        InstructionKind::Gate(gate) => cap.gate_duration_us(gate.name(), gate.num_qubits()),
        InstructionKind::Measure => cap.noise.measure_duration_us,
        InstructionKind::Barrier => 0.0,
    }
}

/// Price of one instruction on `cap`.
pub fn instruction_cost(inst: &Instruction, cap: &ProviderCapability) -> f64 {
    match &inst.kind {
        InstructionKind::Gate(gate) => cap.gate_cost(gate.name(), gate.num_qubits()),
        InstructionKind::Measure => cap.cost.measure * inst.qubits.len() as f64,
        InstructionKind::Barrier => 0.0,
    }
}

/// Estimated price of submitting `circuit` to `cap` once.
pub fn circuit_cost(circuit: &Circuit, cap: &ProviderCapability) -> f64 {
    cap.cost.base_per_job
        + circuit
            .instructions()
            .iter()
            .map(|inst| instruction_cost(inst, cap))
            .sum::<f64>()
}

/// Greedy left-to-right layering of gate instructions.
///
/// A layer keeps absorbing gates whose qubits are disjoint from everything
/// already in it; the first overlapping gate closes it. Measurements and
/// barriers close the current layer and belong to none. Returns instruction
/// indices per layer.
pub fn greedy_layers(circuit: &Circuit) -> Vec<Vec<usize>> {
    let mut layers = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut busy: Vec<QubitId> = Vec::new();

    for (idx, inst) in circuit.instructions().iter().enumerate() {
        if !inst.is_gate() {
            if !current.is_empty() {
                layers.push(std::mem::take(&mut current));
                busy.clear();
            }
            continue;
        }
        if inst.qubits.iter().any(|q| busy.contains(q)) {
            layers.push(std::mem::take(&mut current));
            busy.clear();
        }
        busy.extend(inst.qubits.iter().copied());
        current.push(idx);
    }
    if !current.is_empty() {
        layers.push(current);
    }
    layers
}

/// Time each qubit spends busy, indexed by qubit.
pub fn qubit_runtimes_us(circuit: &Circuit, cap: &ProviderCapability) -> Vec<f64> {
    let mut busy = vec![0.0; circuit.num_qubits() as usize];
    for inst in circuit.instructions() {
        let d = instruction_duration_us(inst, cap);
        for q in &inst.qubits {
            if let Some(t) = busy.get_mut(q.index()) {
                *t += d;
            }
        }
    }
    busy
}

/// Longest time-accumulated path through the circuit (µs).
///
/// Every operation starts when all its qubits are free; barriers
/// synchronise the qubits they span.
pub fn critical_path_us(circuit: &Circuit, cap: &ProviderCapability) -> f64 {
    let mut clock = vec![0.0f64; circuit.num_qubits() as usize];
    for inst in circuit.instructions() {
        let span: Vec<usize> = if inst.is_barrier() && inst.qubits.is_empty() {
            (0..clock.len()).collect()
        } else {
            inst.qubits.iter().map(|q| q.index()).collect()
        };
        let start = span
            .iter()
            .filter_map(|&q| clock.get(q))
            .copied()
            .fold(0.0, f64::max);
        let end = start + instruction_duration_us(inst, cap);
        for q in span {
            if let Some(t) = clock.get_mut(q) {
                *t = end;
            }
        }
    }
    clock.into_iter().fold(0.0, f64::max)
}

/// Analyze `circuit` against `cap`.
pub fn analyze(circuit: &Circuit, cap: &ProviderCapability) -> CircuitAnalysis {
    let estimated_runtime_us = circuit
        .instructions()
        .iter()
        .map(|inst| instruction_duration_us(inst, cap) * measure_multiplicity(inst))
        .sum();

    let parallelizable_gates = greedy_layers(circuit)
        .iter()
        .filter(|layer| layer.len() >= 2)
        .map(Vec::len)
        .sum();

    CircuitAnalysis {
        provider: cap.name.clone(),
        num_qubits: circuit.num_qubits(),
        num_gates: circuit.num_gates(),
        gate_counts: circuit.gate_counts(),
        two_qubit_gates: circuit.two_qubit_gate_count(),
        measurements: circuit.measurement_count(),
        depth: circuit.depth(),
        estimated_runtime_us,
        parallelizable_gates,
        critical_path_us: critical_path_us(circuit, cap),
        estimated_cost: circuit_cost(circuit, cap),
    }
}

/// A measurement of n qubits counts as n single-qubit measurements.
fn measure_multiplicity(inst: &Instruction) -> f64 {
    if inst.is_measure() {
        inst.qubits.len() as f64
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qforge_ir::ClbitId;

    #[test]
    fn test_greedy_layers() {
        let mut c = Circuit::with_size("t", 4, 0);
        c.h(QubitId(0)).unwrap();
        c.h(QubitId(1)).unwrap();
        c.cx(QubitId(0), QubitId(1)).unwrap();
        c.cx(QubitId(2), QubitId(3)).unwrap();
        c.x(QubitId(0)).unwrap();
        let layers = greedy_layers(&c);
        assert_eq!(layers, vec![vec![0, 1], vec![2, 3], vec![4]]);
    }

    #[test]
    fn test_measure_closes_layer() {
        let mut c = Circuit::with_size("t", 2, 1);
        c.h(QubitId(0)).unwrap();
        c.measure(QubitId(0), ClbitId(0)).unwrap();
        c.h(QubitId(1)).unwrap();
        assert_eq!(greedy_layers(&c), vec![vec![0], vec![2]]);
    }

    #[test]
    fn test_analyze_bell_on_b() {
        let cap = ProviderCapability::provider_b();
        let c = Circuit::bell().unwrap();
        let a = analyze(&c, &cap);
        assert_eq!(a.num_gates, 2);
        assert_eq!(a.two_qubit_gates, 1);
        assert_eq!(a.depth, 2);
        assert_eq!(a.parallelizable_gates, 0);
        // h falls back to the 1q mean: (0.035 + 0.035 + 0.0) / 3
        let h = 0.07 / 3.0;
        assert!((a.estimated_runtime_us - (h + 0.3)).abs() < 1e-12);
        assert!((a.critical_path_us - (h + 0.3)).abs() < 1e-12);
        assert!(a.estimated_cost > cap.cost.base_per_job);
    }

    #[test]
    fn test_critical_path_parallel() {
        let cap = ProviderCapability::provider_c();
        let mut c = Circuit::with_size("t", 2, 0);
        c.x(QubitId(0)).unwrap();
        c.x(QubitId(1)).unwrap();
        let a = analyze(&c, &cap);
        assert!((a.estimated_runtime_us - 0.05).abs() < 1e-12);
        assert!((a.critical_path_us - 0.025).abs() < 1e-12);
        assert_eq!(a.parallelizable_gates, 2);
    }

    #[test]
    fn test_barrier_synchronises_clock() {
        let cap = ProviderCapability::provider_c();
        let mut c = Circuit::with_size("t", 2, 0);
        c.cz(QubitId(0), QubitId(1)).unwrap();
        c.x(QubitId(0)).unwrap();
        c.barrier([]).unwrap();
        c.x(QubitId(1)).unwrap();
        // cz 0.04, x 0.025 on q0, barrier aligns q1 to 0.065, x 0.025
        assert!((critical_path_us(&c, &cap) - 0.09).abs() < 1e-12);
    }
}
