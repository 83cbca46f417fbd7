//! Commutation-based reordering.

use tracing::debug;

use qforge_ir::Circuit;

use crate::error::CompileResult;
use crate::pass::Pass;
use crate::property::PropertySet;
use crate::stage::OptimizationStage;

/// Moves entangling gates earlier so they cluster together.
///
/// Each multi-qubit gate bubbles left past the single-qubit gates directly
/// before it, as long as they act on other qubits. It stops at the first
/// overlapping instruction, measurement, barrier or multi-qubit gate. Only
/// disjoint gates are swapped, so the circuit's action is unchanged.
pub struct CommutationReorder;

impl Pass for CommutationReorder {
    fn name(&self) -> &'static str {
        "CommutationReorder"
    }

    fn stage(&self) -> OptimizationStage {
        OptimizationStage::CommutationReorder
    }

    fn should_run(&self, circuit: &Circuit, _properties: &PropertySet) -> bool {
        circuit.two_qubit_gate_count() > 0
    }

    fn run(&self, circuit: &mut Circuit, properties: &mut PropertySet) -> CompileResult<()> {
        let mut ops = circuit.take_instructions();
        let mut moved_gates = 0usize;
        let mut swaps = 0usize;

        for i in 0..ops.len() {
            if !ops[i].is_multi_qubit_gate() {
                continue;
            }
            let mut j = i;
            while j > 0 && ops[j - 1].is_single_qubit_gate() && ops[j - 1].is_disjoint(&ops[j]) {
                ops.swap(j - 1, j);
                j -= 1;
            }
            if j < i {
                moved_gates += 1;
                swaps += i - j;
            }
        }

        circuit.set_instructions(ops);
        debug!(moved_gates, swaps, "Commutation reorder finished");
        properties.record(format!(
            "commutation-reorder: moved {moved_gates} entangling gate(s) across {swaps} disjoint single-qubit gate(s)"
        ));
        Ok(())
    }
}
