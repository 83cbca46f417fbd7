//! Cheaper equivalent substitutions.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use tracing::debug;

use qforge_ir::{Circuit, StandardGate};

use crate::error::CompileResult;
use crate::pass::Pass;
use crate::property::PropertySet;
use crate::stage::OptimizationStage;

/// Replaces single-qubit gates by an equivalent rotation when the rotation
/// is native and strictly cheaper on the target provider.
pub struct CostSubstitution;

/// The rotation equal to `gate` up to global phase, if one is known.
pub fn rotation_equivalent(gate: &StandardGate) -> Option<StandardGate> {
    use StandardGate::*;
    let sub = match *gate {
        Z => Rz(PI),
        S => Rz(FRAC_PI_2),
        Sdg => Rz(-FRAC_PI_2),
        T => Rz(FRAC_PI_4),
        Tdg => Rz(-FRAC_PI_4),
        P(lambda) => Rz(lambda),
        X => Rx(PI),
        Y => Ry(PI),
        SX => Rx(FRAC_PI_2),
        _ => return None,
    };
    Some(sub)
}

impl Pass for CostSubstitution {
    fn name(&self) -> &'static str {
        "CostSubstitution"
    }

    fn stage(&self) -> OptimizationStage {
        OptimizationStage::CostOptimization
    }

    fn run(&self, circuit: &mut Circuit, properties: &mut PropertySet) -> CompileResult<()> {
        let cap = properties.provider.clone();
        let mut ops = circuit.take_instructions();
        let mut substituted = 0usize;
        let mut saved = 0.0;

        for inst in &mut ops {
            let Some(gate) = inst.as_standard().copied() else {
                continue;
            };
            let Some(sub) = rotation_equivalent(&gate) else {
                continue;
            };
            if !cap.is_native(sub.name()) {
                continue;
            }
            let before = cap.gate_cost(gate.name(), 1);
            let after = cap.gate_cost(sub.name(), 1);
            if after < before {
                *inst = qforge_ir::Instruction::single_qubit_gate(sub, inst.qubits[0]);
                substituted += 1;
                saved += before - after;
            }
        }

        circuit.set_instructions(ops);
        debug!(substituted, saved, "Cost substitution finished");
        properties.record(format!(
            "cost-optimization: substituted {substituted} gate(s), saving {saved:.4} per shot"
        ));
        Ok(())
    }
}
