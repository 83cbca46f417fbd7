//! Lowering into a provider's native gate set.

use std::f64::consts::{FRAC_PI_2, PI};

use tracing::debug;

use qforge_hal::ProviderCapability;
use qforge_ir::{Circuit, Instruction, QubitId, StandardGate};

use crate::error::{CompileError, CompileResult};
use crate::pass::Pass;
use crate::property::PropertySet;
use crate::stage::OptimizationStage;
use crate::unitary::{EPSILON, Unitary2x2, compose};

/// Default bound on nested rewrites of a single gate.
pub const DEFAULT_MAX_DEPTH: usize = 8;

const VERIFY_TOLERANCE: f64 = 1e-9;

/// Rewrites every non-native gate into native gates.
///
/// Single-qubit gates are resynthesised from their matrix and the shortest
/// verified native sequence wins. Multi-qubit gates expand through fixed
/// identities, and the pieces are lowered again until everything is native.
/// Measurements and barriers pass through untouched.
#[derive(Debug, Clone)]
pub struct NativeTranslation {
    max_depth: usize,
}

impl NativeTranslation {
    /// Translation with a custom bound on nested rewrites.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }

    fn lower(
        &self,
        inst: Instruction,
        cap: &ProviderCapability,
        depth: usize,
        out: &mut Vec<Instruction>,
    ) -> CompileResult<()> {
        let Some(gate) = inst.as_gate() else {
            out.push(inst);
            return Ok(());
        };
        if cap.is_native(gate.name()) {
            out.push(inst);
            return Ok(());
        }
        let not_in_basis = || CompileError::GateNotInBasis {
            gate: gate.name().to_string(),
            provider: cap.name.clone(),
        };
        if depth >= self.max_depth {
            return Err(CompileError::TranslationLimit {
                gate: gate.name().to_string(),
                rounds: self.max_depth,
            });
        }
        let standard = gate.as_standard().ok_or_else(not_in_basis)?;

        if standard.num_qubits() == 1 {
            let sequence = lower_single_qubit(standard, cap).ok_or_else(not_in_basis)?;
            let qubit = inst.qubits[0];
            out.extend(
                sequence
                    .into_iter()
                    .map(|g| Instruction::single_qubit_gate(g, qubit)),
            );
            return Ok(());
        }

        let expansion = expand(standard, &inst.qubits, cap).ok_or_else(not_in_basis)?;
        for piece in expansion {
            self.lower(piece, cap, depth + 1, out)?;
        }
        Ok(())
    }
}

impl Default for NativeTranslation {
    fn default() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }
}

impl Pass for NativeTranslation {
    fn name(&self) -> &'static str {
        "NativeTranslation"
    }

    fn stage(&self) -> OptimizationStage {
        OptimizationStage::Transpilation
    }

    fn run(&self, circuit: &mut Circuit, properties: &mut PropertySet) -> CompileResult<()> {
        let cap = properties.provider.clone();
        let input = circuit.take_instructions();
        let mut output = Vec::with_capacity(input.len());
        let mut lowered = 0usize;

        for inst in input {
            let native = inst.as_gate().is_none_or(|g| cap.is_native(g.name()));
            if !native {
                lowered += 1;
            }
            self.lower(inst, &cap, 0, &mut output)?;
        }

        let emitted = output.len();
        circuit.set_instructions(output);
        debug!(provider = %cap.name, lowered, emitted, "Native translation finished");
        properties.record(format!(
            "transpilation: lowered {lowered} non-native gate(s) into the {} basis",
            cap.name
        ));
        Ok(())
    }
}

/// Rotation family usable for Z rotations: `rz`, else `p`.
fn z_rotation(cap: &ProviderCapability) -> Option<fn(f64) -> StandardGate> {
    if cap.is_native("rz") {
        Some(StandardGate::Rz)
    } else if cap.is_native("p") {
        Some(StandardGate::P)
    } else {
        None
    }
}

/// Drop rotations by ~0 and wrap the remaining angles.
fn prune(sequence: Vec<StandardGate>) -> Vec<StandardGate> {
    sequence
        .into_iter()
        .filter_map(|g| {
            let wrap = Unitary2x2::normalize_angle;
            let g = match g {
                StandardGate::Rx(a) => StandardGate::Rx(wrap(a)),
                StandardGate::Ry(a) => StandardGate::Ry(wrap(a)),
                StandardGate::Rz(a) => StandardGate::Rz(wrap(a)),
                StandardGate::P(a) => StandardGate::P(wrap(a)),
                other => other,
            };
            match g {
                StandardGate::Rx(a) | StandardGate::Ry(a) | StandardGate::Rz(a) | StandardGate::P(a)
                    if a.abs() < EPSILON =>
                {
                    None
                }
                _ => Some(g),
            }
        })
        .collect()
}

/// Shortest native sequence equal to `gate` up to global phase.
///
/// Every candidate is checked against the gate's matrix before it is
/// accepted. Returns `None` when the native set cannot express the gate.
pub fn lower_single_qubit(gate: &StandardGate, cap: &ProviderCapability) -> Option<Vec<StandardGate>> {
    let target = Unitary2x2::from_gate(gate)?;
    if target.is_identity_within(VERIFY_TOLERANCE) {
        return Some(Vec::new());
    }
    let (alpha, beta, gamma, _) = target.zyz_decomposition();
    let native = |g: &StandardGate| cap.is_native(g.name());

    let mut candidates: Vec<Vec<StandardGate>> = Vec::new();
    {
        use StandardGate::{H, S, SX, SXdg, Sdg, T, Tdg, X, Y, Z};
        for fixed in [X, Y, Z, H, S, Sdg, T, Tdg, SX, SXdg] {
            if native(&fixed) {
                candidates.push(vec![fixed]);
            }
        }
    }
    let rz = z_rotation(cap);
    if let Some(rz) = rz {
        candidates.push(vec![rz(alpha + gamma)]);
    }
    for rotation in [StandardGate::Rx as fn(f64) -> StandardGate, StandardGate::Ry] {
        if native(&rotation(0.0)) {
            candidates.push(vec![rotation(beta)]);
            candidates.push(vec![rotation(-beta)]);
        }
    }
    if cap.is_native("u") {
        let (theta, phi, lambda) = target.to_u_angles();
        candidates.push(vec![StandardGate::U(theta, phi, lambda)]);
    }
    if let Some(rz) = rz {
        if cap.is_native("ry") {
            candidates.push(vec![rz(gamma), StandardGate::Ry(beta), rz(alpha)]);
        }
        if cap.is_native("rx") {
            candidates.push(vec![
                rz(gamma - FRAC_PI_2),
                StandardGate::Rx(beta),
                rz(alpha + FRAC_PI_2),
            ]);
        }
        if cap.is_native("sx") {
            candidates.push(vec![
                rz(gamma - FRAC_PI_2),
                StandardGate::SX,
                rz(alpha + FRAC_PI_2),
            ]);
            candidates.push(vec![
                rz(gamma),
                StandardGate::SX,
                rz(beta + PI),
                StandardGate::SX,
                rz(alpha + PI),
            ]);
        }
    }

    candidates
        .into_iter()
        .map(prune)
        .filter(|seq| compose(seq).is_some_and(|u| u.equiv_up_to_phase(&target, VERIFY_TOLERANCE)))
        .min_by_key(Vec::len)
}

/// One rewrite step of a multi-qubit gate, in time order.
///
/// Returns `None` when no rule leads towards the provider's basis.
pub fn expand(
    gate: &StandardGate,
    qubits: &[QubitId],
    cap: &ProviderCapability,
) -> Option<Vec<Instruction>> {
    use StandardGate::*;

    let one = Instruction::single_qubit_gate;
    let two = Instruction::two_qubit_gate;

    let seq = match (gate, qubits) {
        (CX, &[c, t]) => {
            if cap.is_native("cz") {
                vec![one(H, t), two(CZ, c, t), one(H, t)]
            } else if cap.is_native("rxx") {
                vec![
                    one(Ry(FRAC_PI_2), c),
                    two(RXX(FRAC_PI_2), c, t),
                    one(Rx(-FRAC_PI_2), c),
                    one(Rx(-FRAC_PI_2), t),
                    one(Ry(-FRAC_PI_2), c),
                ]
            } else {
                return None;
            }
        }
        (CZ, &[c, t]) => vec![one(H, t), two(CX, c, t), one(H, t)],
        (CY, &[c, t]) => vec![one(Sdg, t), two(CX, c, t), one(S, t)],
        (CH, &[c, t]) => vec![
            one(S, t),
            one(H, t),
            one(T, t),
            two(CX, c, t),
            one(Tdg, t),
            one(H, t),
            one(Sdg, t),
        ],
        (Swap, &[a, b]) => vec![two(CX, a, b), two(CX, b, a), two(CX, a, b)],
        (ISwap, &[a, b]) => vec![
            one(S, a),
            one(S, b),
            one(H, a),
            two(CX, a, b),
            two(CX, b, a),
            one(H, b),
        ],
        (CRz(theta), &[c, t]) => vec![
            one(Rz(theta / 2.0), t),
            two(CX, c, t),
            one(Rz(-theta / 2.0), t),
            two(CX, c, t),
        ],
        (CP(lambda), &[c, t]) => vec![
            one(P(lambda / 2.0), c),
            two(CX, c, t),
            one(P(-lambda / 2.0), t),
            two(CX, c, t),
            one(P(lambda / 2.0), t),
        ],
        (RZZ(theta), &[a, b]) => vec![two(CX, a, b), one(Rz(*theta), b), two(CX, a, b)],
        (RXX(theta), &[a, b]) => vec![
            one(H, a),
            one(H, b),
            two(CX, a, b),
            one(Rz(*theta), b),
            two(CX, a, b),
            one(H, a),
            one(H, b),
        ],
        (RYY(theta), &[a, b]) => vec![
            one(Rx(FRAC_PI_2), a),
            one(Rx(FRAC_PI_2), b),
            two(CX, a, b),
            one(Rz(*theta), b),
            two(CX, a, b),
            one(Rx(-FRAC_PI_2), a),
            one(Rx(-FRAC_PI_2), b),
        ],
        (CCX, &[a, b, c]) => vec![
            one(H, c),
            two(CX, b, c),
            one(Tdg, c),
            two(CX, a, c),
            one(T, c),
            two(CX, b, c),
            one(Tdg, c),
            two(CX, a, c),
            one(T, b),
            one(T, c),
            one(H, c),
            two(CX, a, b),
            one(T, a),
            one(Tdg, b),
            two(CX, a, b),
        ],
        (CSwap, &[a, b, c]) => vec![
            two(CX, c, b),
            Instruction::gate(CCX, [a, b, c]),
            two(CX, c, b),
        ],
        _ => return None,
    };
    Some(seq)
}
