//! Circuit instructions combining gates with operands.

use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};
use crate::gate::{Gate, StandardGate};
use crate::qubit::{ClbitId, QubitId};

/// The kind of instruction in a circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstructionKind {
    /// A quantum gate operation.
    Gate(Gate),
    /// Measurement of each qubit into the paired classical bit.
    Measure,
    /// Barrier (synchronization point). An empty operand list spans every qubit.
    Barrier,
}

/// A complete instruction with operands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// The kind of instruction.
    pub kind: InstructionKind,
    /// Qubits this instruction operates on.
    pub qubits: Vec<QubitId>,
    /// Classical bits this instruction writes (for measure).
    pub clbits: Vec<ClbitId>,
}

impl Instruction {
    /// Create a gate instruction.
    pub fn gate(gate: impl Into<Gate>, qubits: impl IntoIterator<Item = QubitId>) -> Self {
        Self {
            kind: InstructionKind::Gate(gate.into()),
            qubits: qubits.into_iter().collect(),
            clbits: vec![],
        }
    }

    /// Create a single-qubit gate instruction.
    pub fn single_qubit_gate(gate: StandardGate, qubit: QubitId) -> Self {
        Self::gate(gate, [qubit])
    }

    /// Create a two-qubit gate instruction.
    pub fn two_qubit_gate(gate: StandardGate, q1: QubitId, q2: QubitId) -> Self {
        Self::gate(gate, [q1, q2])
    }

    /// Create a measurement instruction.
    pub fn measure(qubit: QubitId, clbit: ClbitId) -> Self {
        Self {
            kind: InstructionKind::Measure,
            qubits: vec![qubit],
            clbits: vec![clbit],
        }
    }

    /// Create a barrier instruction.
    pub fn barrier(qubits: impl IntoIterator<Item = QubitId>) -> Self {
        Self {
            kind: InstructionKind::Barrier,
            qubits: qubits.into_iter().collect(),
            clbits: vec![],
        }
    }

    /// Name of the instruction (`measure`, `barrier`, or the gate name).
    pub fn name(&self) -> &str {
        match &self.kind {
            InstructionKind::Gate(g) => g.name(),
            InstructionKind::Measure => "measure",
            InstructionKind::Barrier => "barrier",
        }
    }

    /// The gate, if this is a gate instruction.
    pub fn as_gate(&self) -> Option<&Gate> {
        match &self.kind {
            InstructionKind::Gate(g) => Some(g),
            _ => None,
        }
    }

    /// The standard gate, if this is a standard gate instruction.
    pub fn as_standard(&self) -> Option<&StandardGate> {
        self.as_gate().and_then(Gate::as_standard)
    }

    /// Check if this is a gate instruction.
    pub fn is_gate(&self) -> bool {
        matches!(self.kind, InstructionKind::Gate(_))
    }

    /// Check if this is a measurement.
    pub fn is_measure(&self) -> bool {
        matches!(self.kind, InstructionKind::Measure)
    }

    /// Check if this is a barrier.
    pub fn is_barrier(&self) -> bool {
        matches!(self.kind, InstructionKind::Barrier)
    }

    /// Gate acting on exactly one qubit.
    pub fn is_single_qubit_gate(&self) -> bool {
        self.is_gate() && self.qubits.len() == 1
    }

    /// Gate acting on two or more qubits.
    pub fn is_multi_qubit_gate(&self) -> bool {
        self.is_gate() && self.qubits.len() >= 2
    }

    /// Every unordered pair of operands, in operand order.
    ///
    /// A three-qubit gate couples all of its operands, not only neighbours
    /// in the list.
    pub fn operand_pairs(&self) -> impl Iterator<Item = (QubitId, QubitId)> + '_ {
        self.qubits
            .iter()
            .enumerate()
            .flat_map(move |(i, &a)| self.qubits[i + 1..].iter().map(move |&b| (a, b)))
    }

    /// Gate acting on exactly two qubits.
    pub fn is_two_qubit_gate(&self) -> bool {
        self.is_gate() && self.qubits.len() == 2
    }

    /// Number of qubits this instruction touches.
    pub fn num_qubits(&self) -> usize {
        self.qubits.len()
    }

    /// Whether this instruction acts on `qubit`.
    ///
    /// A barrier with no operands spans the whole circuit.
    pub fn touches(&self, qubit: QubitId) -> bool {
        (self.is_barrier() && self.qubits.is_empty()) || self.qubits.contains(&qubit)
    }

    /// Whether the two instructions share no qubit.
    pub fn is_disjoint(&self, other: &Instruction) -> bool {
        if (self.is_barrier() && self.qubits.is_empty())
            || (other.is_barrier() && other.qubits.is_empty())
        {
            return false;
        }
        self.qubits.iter().all(|q| !other.qubits.contains(q))
    }

    /// Check operand shape and bounds against a circuit of the given size.
    pub fn validate(&self, num_qubits: u32, num_clbits: u32) -> IrResult<()> {
        let gate_name = || Some(self.name().to_string());
        for (i, q) in self.qubits.iter().enumerate() {
            if q.0 >= num_qubits {
                return Err(IrError::QubitOutOfRange {
                    qubit: *q,
                    num_qubits,
                    gate_name: gate_name(),
                });
            }
            if self.qubits[..i].contains(q) {
                return Err(IrError::DuplicateQubit {
                    qubit: *q,
                    gate_name: gate_name(),
                });
            }
        }

        match &self.kind {
            InstructionKind::Gate(gate) => {
                if let Gate::Custom(custom) = gate {
                    custom.validate_name()?;
                }
                let got = self.qubits.len() as u32;
                if got == 0 || got > 3 {
                    return Err(IrError::UnsupportedArity {
                        gate_name: gate.name().to_string(),
                        got,
                    });
                }
                if gate.num_qubits() != got {
                    return Err(IrError::QubitCountMismatch {
                        gate_name: gate.name().to_string(),
                        expected: gate.num_qubits(),
                        got,
                    });
                }
                if let Some(index) = gate.params().iter().position(|p| !p.is_finite()) {
                    return Err(IrError::NonFiniteParameter {
                        gate_name: gate.name().to_string(),
                        index,
                    });
                }
            }
            InstructionKind::Measure => {
                if self.qubits.len() != self.clbits.len() || self.qubits.is_empty() {
                    return Err(IrError::MeasureShape {
                        qubits: self.qubits.len(),
                        clbits: self.clbits.len(),
                    });
                }
                if let Some(c) = self.clbits.iter().find(|c| c.0 >= num_clbits) {
                    return Err(IrError::ClbitOutOfRange {
                        clbit: *c,
                        num_clbits,
                    });
                }
            }
            InstructionKind::Barrier => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::CustomGate;

    #[test]
    fn test_gate_instruction() {
        let inst = Instruction::two_qubit_gate(StandardGate::CX, QubitId(0), QubitId(1));
        assert_eq!(inst.name(), "cx");
        assert!(inst.is_two_qubit_gate());
        assert!(inst.touches(QubitId(1)));
        assert!(!inst.touches(QubitId(2)));
        assert!(inst.validate(2, 0).is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let inst = Instruction::single_qubit_gate(StandardGate::H, QubitId(4));
        assert!(matches!(
            inst.validate(2, 0),
            Err(IrError::QubitOutOfRange { num_qubits: 2, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_and_arity() {
        let dup = Instruction::two_qubit_gate(StandardGate::CX, QubitId(1), QubitId(1));
        assert!(matches!(
            dup.validate(3, 0),
            Err(IrError::DuplicateQubit { .. })
        ));

        let wide = Instruction::gate(CustomGate::new("big", 4), (0..4).map(QubitId));
        assert!(matches!(
            wide.validate(5, 0),
            Err(IrError::UnsupportedArity { got: 4, .. })
        ));

        let mismatch = Instruction::gate(StandardGate::CX, [QubitId(0)]);
        assert!(matches!(
            mismatch.validate(2, 0),
            Err(IrError::QubitCountMismatch { expected: 2, got: 1, .. })
        ));
    }

    #[test]
    fn test_operand_pairs() {
        let ccx = Instruction::gate(StandardGate::CCX, [QubitId(0), QubitId(1), QubitId(2)]);
        let pairs: Vec<_> = ccx.operand_pairs().map(|(a, b)| (a.0, b.0)).collect();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (1, 2)]);

        let cx = Instruction::two_qubit_gate(StandardGate::CX, QubitId(3), QubitId(1));
        assert_eq!(cx.operand_pairs().count(), 1);
        assert_eq!(
            Instruction::single_qubit_gate(StandardGate::H, QubitId(0))
                .operand_pairs()
                .count(),
            0
        );
    }

    #[test]
    fn test_validate_rejects_unprintable_custom_names() {
        for name in ["x", "my gate", "barrier"] {
            let inst = Instruction::gate(CustomGate::new(name, 1), [QubitId(0)]);
            assert!(matches!(
                inst.validate(1, 0),
                Err(IrError::InvalidGateName { .. })
            ));
        }
        let ok = Instruction::gate(CustomGate::new("ms", 2), [QubitId(0), QubitId(1)]);
        assert!(ok.validate(2, 0).is_ok());
    }

    #[test]
    fn test_validate_rejects_nan() {
        let inst = Instruction::single_qubit_gate(StandardGate::Rz(f64::NAN), QubitId(0));
        assert!(matches!(
            inst.validate(1, 0),
            Err(IrError::NonFiniteParameter { index: 0, .. })
        ));
    }

    #[test]
    fn test_disjoint() {
        let a = Instruction::single_qubit_gate(StandardGate::X, QubitId(0));
        let b = Instruction::two_qubit_gate(StandardGate::CZ, QubitId(1), QubitId(2));
        let c = Instruction::barrier([]);
        assert!(a.is_disjoint(&b));
        assert!(!a.is_disjoint(&c));
        assert!(c.touches(QubitId(9)));
    }
}
