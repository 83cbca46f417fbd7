//! Single-qubit run merging.

use tracing::debug;

use qforge_ir::{Circuit, Instruction, QubitId, StandardGate};

use crate::error::CompileResult;
use crate::pass::Pass;
use crate::property::PropertySet;
use crate::stage::OptimizationStage;
use crate::unitary::compose;

/// Collapses maximal qubit-local runs of single-qubit standard gates.
///
/// A run ends at any other instruction touching its qubit. Runs of two or
/// more gates are composed exactly and replaced by one `U(θ, φ, λ)` at the
/// position of the first gate, or removed when the product is the identity
/// up to global phase.
pub struct SingleQubitMerge;

#[derive(Debug, Default)]
struct MergeStats {
    merged_runs: usize,
    removed_runs: usize,
    gates_in: usize,
}

fn flush(
    ops: &mut [Option<Instruction>],
    run: &mut Vec<usize>,
    qubit: QubitId,
    tolerance: f64,
    stats: &mut MergeStats,
) {
    if run.len() < 2 {
        run.clear();
        return;
    }
    let gates: Vec<StandardGate> = run
        .iter()
        .filter_map(|&i| ops[i].as_ref().and_then(Instruction::as_standard).copied())
        .collect();
    let Some(product) = compose(&gates) else {
        run.clear();
        return;
    };

    stats.gates_in += run.len();
    for &i in run.iter() {
        ops[i] = None;
    }
    if product.is_identity_within(tolerance) {
        stats.removed_runs += 1;
    } else {
        let (theta, phi, lambda) = product.to_u_angles();
        ops[run[0]] = Some(Instruction::single_qubit_gate(
            StandardGate::U(theta, phi, lambda),
            qubit,
        ));
        stats.merged_runs += 1;
    }
    run.clear();
}

impl Pass for SingleQubitMerge {
    fn name(&self) -> &'static str {
        "SingleQubitMerge"
    }

    fn stage(&self) -> OptimizationStage {
        OptimizationStage::SingleQubitMerge
    }

    fn run(&self, circuit: &mut Circuit, properties: &mut PropertySet) -> CompileResult<()> {
        let width = circuit.num_qubits() as usize;
        let tolerance = properties.merge_tolerance;
        let mut ops: Vec<Option<Instruction>> =
            circuit.take_instructions().into_iter().map(Some).collect();
        let mut runs: Vec<Vec<usize>> = vec![Vec::new(); width];
        let mut stats = MergeStats::default();

        for idx in 0..ops.len() {
            let Some(inst) = ops[idx].as_ref() else {
                continue;
            };
            if inst.is_single_qubit_gate() && inst.as_standard().is_some() {
                if let Some(run) = runs.get_mut(inst.qubits[0].index()) {
                    run.push(idx);
                }
                continue;
            }
            let touched: Vec<usize> = if inst.is_barrier() && inst.qubits.is_empty() {
                (0..width).collect()
            } else {
                inst.qubits.iter().map(|q| q.index()).collect()
            };
            for q in touched {
                if let Some(run) = runs.get_mut(q) {
                    flush(&mut ops, run, QubitId(q as u32), tolerance, &mut stats);
                }
            }
        }
        for (q, run) in runs.iter_mut().enumerate() {
            flush(&mut ops, run, QubitId(q as u32), tolerance, &mut stats);
        }

        circuit.set_instructions(ops.into_iter().flatten().collect());
        debug!(
            merged = stats.merged_runs,
            removed = stats.removed_runs,
            gates_in = stats.gates_in,
            "Single-qubit merge finished"
        );
        properties.record(format!(
            "single-qubit-merge: folded {} gate(s) into {} U gate(s), dropped {} identity run(s)",
            stats.gates_in, stats.merged_runs, stats.removed_runs
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;
    use std::sync::Arc;

    use qforge_hal::ProviderCapability;
    use qforge_ir::ClbitId;

    use crate::unitary::Unitary2x2;

    fn run(circuit: &mut Circuit) {
        let mut props = PropertySet::new(Arc::new(ProviderCapability::provider_a()));
        SingleQubitMerge.run(circuit, &mut props).unwrap();
    }

    #[test]
    fn test_run_becomes_single_u() {
        let mut c = Circuit::with_size("t", 1, 0);
        c.h(QubitId(0)).unwrap();
        c.t(QubitId(0)).unwrap();
        c.rx(0.3, QubitId(0)).unwrap();
        let expected = compose(&[StandardGate::H, StandardGate::T, StandardGate::Rx(0.3)]).unwrap();
        run(&mut c);
        assert_eq!(c.num_gates(), 1);
        let merged = Unitary2x2::from_gate(c.instructions()[0].as_standard().unwrap()).unwrap();
        assert!(merged.equiv_up_to_phase(&expected, 1e-9));
    }

    #[test]
    fn test_identity_run_removed() {
        let mut c = Circuit::with_size("t", 1, 0);
        c.rz(PI / 3.0, QubitId(0)).unwrap();
        c.rz(-PI / 3.0, QubitId(0)).unwrap();
        run(&mut c);
        assert!(c.instructions().is_empty());
    }

    #[test]
    fn test_single_gate_untouched() {
        let mut c = Circuit::with_size("t", 2, 0);
        c.h(QubitId(0)).unwrap();
        c.cx(QubitId(0), QubitId(1)).unwrap();
        c.h(QubitId(0)).unwrap();
        run(&mut c);
        let names: Vec<&str> = c.instructions().iter().map(|i| i.name()).collect();
        assert_eq!(names, vec!["h", "cx", "h"]);
    }

    #[test]
    fn test_runs_split_by_measure() {
        let mut c = Circuit::with_size("t", 1, 1);
        c.h(QubitId(0)).unwrap();
        c.h(QubitId(0)).unwrap();
        c.measure(QubitId(0), ClbitId(0)).unwrap();
        c.x(QubitId(0)).unwrap();
        c.y(QubitId(0)).unwrap();
        run(&mut c);
        let names: Vec<&str> = c.instructions().iter().map(|i| i.name()).collect();
        assert_eq!(names, vec!["measure", "u"]);
    }

    #[test]
    fn test_interleaved_qubits_merge_independently() {
        let mut c = Circuit::with_size("t", 2, 0);
        c.h(QubitId(0)).unwrap();
        c.x(QubitId(1)).unwrap();
        c.s(QubitId(0)).unwrap();
        c.y(QubitId(1)).unwrap();
        run(&mut c);
        assert_eq!(c.num_gates(), 2);
        assert_eq!(c.instructions()[0].qubits, vec![QubitId(0)]);
        assert_eq!(c.instructions()[1].qubits, vec![QubitId(1)]);
    }
}
