//! Adjacent inverse-pair cancellation.

use tracing::debug;

use qforge_ir::{Circuit, Instruction, StandardGate};

use crate::error::CompileResult;
use crate::pass::Pass;
use crate::property::PropertySet;
use crate::stage::OptimizationStage;

/// Removes adjacent inverse pairs in a single left-to-right pass.
///
/// Every qubit keeps a pointer to the last surviving instruction on it. An
/// incoming gate cancels against that instruction when all of its qubits
/// point to it, the operands match and the two gates are inverses. Both
/// pointers are then cleared, so a cancellation never exposes an earlier
/// gate to a later one. Identity gates are dropped outright.
pub struct GateCancellation;

/// Whether `second` undoes `first`.
pub fn cancels(first: &StandardGate, second: &StandardGate) -> bool {
    use StandardGate::{S, SX, SXdg, Sdg, T, Tdg};
    if first.is_self_inverse() {
        return first == second;
    }
    matches!(
        (first, second),
        (S, Sdg) | (Sdg, S) | (T, Tdg) | (Tdg, T) | (SX, SXdg) | (SXdg, SX)
    )
}

fn same_operands(first: &Instruction, second: &Instruction, symmetric: bool) -> bool {
    if first.qubits == second.qubits {
        return true;
    }
    if !symmetric || first.qubits.len() != second.qubits.len() {
        return false;
    }
    let mut a = first.qubits.clone();
    let mut b = second.qubits.clone();
    a.sort_unstable();
    b.sort_unstable();
    a == b
}

impl Pass for GateCancellation {
    fn name(&self) -> &'static str {
        "GateCancellation"
    }

    fn stage(&self) -> OptimizationStage {
        OptimizationStage::GateCancellation
    }

    fn run(&self, circuit: &mut Circuit, properties: &mut PropertySet) -> CompileResult<()> {
        let width = circuit.num_qubits() as usize;
        let mut out: Vec<Option<Instruction>> = Vec::with_capacity(circuit.instructions().len());
        let mut last: Vec<Option<usize>> = vec![None; width];
        let mut pairs = 0usize;
        let mut identities = 0usize;

        for inst in circuit.take_instructions() {
            if matches!(inst.as_standard(), Some(StandardGate::I)) {
                identities += 1;
                continue;
            }

            if !inst.is_gate() {
                let span: Vec<usize> = if inst.is_barrier() && inst.qubits.is_empty() {
                    (0..width).collect()
                } else {
                    inst.qubits.iter().map(|q| q.index()).collect()
                };
                for q in span {
                    if let Some(slot) = last.get_mut(q) {
                        *slot = None;
                    }
                }
                out.push(Some(inst));
                continue;
            }

            let target = inst.qubits.first().and_then(|q| last.get(q.index()).copied().flatten());
            let adjacent = target.filter(|&idx| {
                inst.qubits
                    .iter()
                    .all(|q| last.get(q.index()).copied().flatten() == Some(idx))
            });

            let cancelled = adjacent.is_some_and(|idx| {
                let Some(prev) = out[idx].as_ref() else {
                    return false;
                };
                match (prev.as_standard(), inst.as_standard()) {
                    (Some(a), Some(b)) => {
                        cancels(a, b) && same_operands(prev, &inst, a.is_symmetric())
                    }
                    _ => false,
                }
            });

            if let (true, Some(idx)) = (cancelled, adjacent) {
                out[idx] = None;
                for q in &inst.qubits {
                    if let Some(slot) = last.get_mut(q.index()) {
                        *slot = None;
                    }
                }
                pairs += 1;
                continue;
            }

            let idx = out.len();
            for q in &inst.qubits {
                if let Some(slot) = last.get_mut(q.index()) {
                    *slot = Some(idx);
                }
            }
            out.push(Some(inst));
        }

        circuit.set_instructions(out.into_iter().flatten().collect());
        debug!(pairs, identities, "Gate cancellation finished");
        properties.record(format!(
            "gate-cancellation: removed {pairs} inverse pair(s) and {identities} identity gate(s)"
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use qforge_hal::ProviderCapability;
    use qforge_ir::{ClbitId, QubitId};

    fn run(circuit: &mut Circuit) {
        let mut props = PropertySet::new(Arc::new(ProviderCapability::provider_a()));
        GateCancellation.run(circuit, &mut props).unwrap();
    }

    fn names(circuit: &Circuit) -> Vec<&str> {
        circuit.instructions().iter().map(|i| i.name()).collect()
    }

    #[test]
    fn test_xx_cancels() {
        let mut c = Circuit::with_size("t", 1, 0);
        c.x(QubitId(0)).unwrap();
        c.x(QubitId(0)).unwrap();
        run(&mut c);
        assert!(c.instructions().is_empty());
    }

    #[test]
    fn test_inverse_pairs() {
        let mut c = Circuit::with_size("t", 3, 0);
        c.s(QubitId(0)).unwrap();
        c.sdg(QubitId(0)).unwrap();
        c.tdg(QubitId(1)).unwrap();
        c.t(QubitId(1)).unwrap();
        c.sx(QubitId(2)).unwrap();
        c.apply(StandardGate::SXdg, [QubitId(2)]).unwrap();
        run(&mut c);
        assert!(c.instructions().is_empty());
    }

    #[test]
    fn test_no_backtracking() {
        // H X X H: the inner pair cancels, the outer H pair is not revisited
        let mut c = Circuit::with_size("t", 1, 0);
        c.h(QubitId(0)).unwrap();
        c.x(QubitId(0)).unwrap();
        c.x(QubitId(0)).unwrap();
        c.h(QubitId(0)).unwrap();
        run(&mut c);
        assert_eq!(names(&c), vec!["h", "h"]);
    }

    #[test]
    fn test_triple_leaves_one() {
        let mut c = Circuit::with_size("t", 1, 0);
        for _ in 0..3 {
            c.x(QubitId(0)).unwrap();
        }
        run(&mut c);
        assert_eq!(names(&c), vec!["x"]);
    }

    #[test]
    fn test_cx_direction_matters() {
        let mut c = Circuit::with_size("t", 2, 0);
        c.cx(QubitId(0), QubitId(1)).unwrap();
        c.cx(QubitId(1), QubitId(0)).unwrap();
        run(&mut c);
        assert_eq!(c.num_gates(), 2);

        let mut c = Circuit::with_size("t", 2, 0);
        c.cz(QubitId(0), QubitId(1)).unwrap();
        c.cz(QubitId(1), QubitId(0)).unwrap();
        run(&mut c);
        assert_eq!(c.num_gates(), 0);
    }

    #[test]
    fn test_interleaved_gate_blocks() {
        let mut c = Circuit::with_size("t", 2, 0);
        c.cx(QubitId(0), QubitId(1)).unwrap();
        c.x(QubitId(1)).unwrap();
        c.cx(QubitId(0), QubitId(1)).unwrap();
        run(&mut c);
        assert_eq!(c.num_gates(), 3);
    }

    #[test]
    fn test_disjoint_gate_does_not_block() {
        let mut c = Circuit::with_size("t", 2, 0);
        c.h(QubitId(0)).unwrap();
        c.x(QubitId(1)).unwrap();
        c.h(QubitId(0)).unwrap();
        run(&mut c);
        assert_eq!(names(&c), vec!["x"]);
    }

    #[test]
    fn test_measure_blocks() {
        let mut c = Circuit::with_size("t", 1, 1);
        c.h(QubitId(0)).unwrap();
        c.measure(QubitId(0), ClbitId(0)).unwrap();
        c.h(QubitId(0)).unwrap();
        run(&mut c);
        assert_eq!(names(&c), vec!["h", "measure", "h"]);
    }

    #[test]
    fn test_global_barrier_blocks() {
        let mut c = Circuit::with_size("t", 2, 0);
        c.x(QubitId(1)).unwrap();
        c.barrier([]).unwrap();
        c.x(QubitId(1)).unwrap();
        run(&mut c);
        assert_eq!(c.num_gates(), 2);
    }

    #[test]
    fn test_identity_removed() {
        let mut c = Circuit::with_size("t", 1, 0);
        c.apply(StandardGate::I, [QubitId(0)]).unwrap();
        run(&mut c);
        assert!(c.instructions().is_empty());
    }

    #[test]
    fn test_rotations_not_cancelled() {
        let mut c = Circuit::with_size("t", 1, 0);
        c.rz(0.5, QubitId(0)).unwrap();
        c.rz(-0.5, QubitId(0)).unwrap();
        run(&mut c);
        assert_eq!(c.num_gates(), 2);
    }
}
