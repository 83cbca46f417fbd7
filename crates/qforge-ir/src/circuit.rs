//! High-level circuit builder API.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};
use crate::gate::{Gate, StandardGate};
use crate::instruction::Instruction;
use crate::qubit::{ClbitId, QubitId};

/// A quantum circuit: a fixed qubit count and an ordered instruction list.
///
/// Order is significant per qubit; instructions on disjoint qubits commute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circuit {
    name: String,
    num_qubits: u32,
    num_clbits: u32,
    instructions: Vec<Instruction>,
}

impl Circuit {
    /// Create an empty circuit with the given number of qubits and classical bits.
    pub fn with_size(name: impl Into<String>, num_qubits: u32, num_clbits: u32) -> Self {
        Self {
            name: name.into(),
            num_qubits,
            num_clbits,
            instructions: vec![],
        }
    }

    /// Create a circuit from an instruction list, validating every instruction.
    pub fn from_instructions(
        name: impl Into<String>,
        num_qubits: u32,
        num_clbits: u32,
        instructions: Vec<Instruction>,
    ) -> IrResult<Self> {
        let circuit = Self {
            name: name.into(),
            num_qubits,
            num_clbits,
            instructions,
        };
        circuit.validate()?;
        Ok(circuit)
    }

    /// Create a Bell state circuit (without measurement).
    pub fn bell() -> IrResult<Self> {
        let mut circuit = Self::with_size("bell", 2, 0);
        circuit.h(QubitId(0))?.cx(QubitId(0), QubitId(1))?;
        Ok(circuit)
    }

    /// Create an n-qubit GHZ state circuit (without measurement).
    pub fn ghz(n: u32) -> IrResult<Self> {
        if n == 0 {
            return Err(IrError::NoQubits);
        }
        let mut circuit = Self::with_size(format!("ghz_{n}"), n, 0);
        circuit.h(QubitId(0))?;
        for i in 0..n - 1 {
            circuit.cx(QubitId(i), QubitId(i + 1))?;
        }
        Ok(circuit)
    }

    // =========================================================================
    // Building
    // =========================================================================

    /// Append an instruction after validating it against this circuit.
    pub fn push(&mut self, instruction: Instruction) -> IrResult<&mut Self> {
        instruction.validate(self.num_qubits, self.num_clbits)?;
        self.instructions.push(instruction);
        Ok(self)
    }

    /// Append a gate on the given qubits.
    pub fn apply(
        &mut self,
        gate: impl Into<Gate>,
        qubits: impl IntoIterator<Item = QubitId>,
    ) -> IrResult<&mut Self> {
        self.push(Instruction::gate(gate, qubits))
    }

    /// Apply Hadamard gate.
    pub fn h(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply(StandardGate::H, [qubit])
    }

    /// Apply Pauli-X gate.
    pub fn x(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply(StandardGate::X, [qubit])
    }

    /// Apply Pauli-Y gate.
    pub fn y(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply(StandardGate::Y, [qubit])
    }

    /// Apply Pauli-Z gate.
    pub fn z(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply(StandardGate::Z, [qubit])
    }

    /// Apply S gate.
    pub fn s(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply(StandardGate::S, [qubit])
    }

    /// Apply S-dagger gate.
    pub fn sdg(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply(StandardGate::Sdg, [qubit])
    }

    /// Apply T gate.
    pub fn t(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply(StandardGate::T, [qubit])
    }

    /// Apply T-dagger gate.
    pub fn tdg(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply(StandardGate::Tdg, [qubit])
    }

    /// Apply sqrt(X) gate.
    pub fn sx(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply(StandardGate::SX, [qubit])
    }

    /// Apply Rx rotation gate.
    pub fn rx(&mut self, theta: f64, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply(StandardGate::Rx(theta), [qubit])
    }

    /// Apply Ry rotation gate.
    pub fn ry(&mut self, theta: f64, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply(StandardGate::Ry(theta), [qubit])
    }

    /// Apply Rz rotation gate.
    pub fn rz(&mut self, theta: f64, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply(StandardGate::Rz(theta), [qubit])
    }

    /// Apply phase gate.
    pub fn p(&mut self, lambda: f64, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply(StandardGate::P(lambda), [qubit])
    }

    /// Apply universal single-qubit gate.
    pub fn u(&mut self, theta: f64, phi: f64, lambda: f64, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply(StandardGate::U(theta, phi, lambda), [qubit])
    }

    /// Apply CNOT gate.
    pub fn cx(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.apply(StandardGate::CX, [control, target])
    }

    /// Apply controlled-Y gate.
    pub fn cy(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.apply(StandardGate::CY, [control, target])
    }

    /// Apply controlled-Z gate.
    pub fn cz(&mut self, q1: QubitId, q2: QubitId) -> IrResult<&mut Self> {
        self.apply(StandardGate::CZ, [q1, q2])
    }

    /// Apply SWAP gate.
    pub fn swap(&mut self, q1: QubitId, q2: QubitId) -> IrResult<&mut Self> {
        self.apply(StandardGate::Swap, [q1, q2])
    }

    /// Apply Toffoli gate.
    pub fn ccx(&mut self, c1: QubitId, c2: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.apply(StandardGate::CCX, [c1, c2, target])
    }

    /// Measure a qubit into a classical bit.
    pub fn measure(&mut self, qubit: QubitId, clbit: ClbitId) -> IrResult<&mut Self> {
        self.push(Instruction::measure(qubit, clbit))
    }

    /// Measure every qubit into the classical bit of the same index,
    /// growing the classical register if needed.
    pub fn measure_all(&mut self) -> IrResult<&mut Self> {
        self.num_clbits = self.num_clbits.max(self.num_qubits);
        for i in 0..self.num_qubits {
            self.push(Instruction::measure(QubitId(i), ClbitId(i)))?;
        }
        Ok(self)
    }

    /// Add a barrier across the given qubits (empty means all qubits).
    pub fn barrier(&mut self, qubits: impl IntoIterator<Item = QubitId>) -> IrResult<&mut Self> {
        self.push(Instruction::barrier(qubits))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the circuit name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the circuit name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Get the number of qubits.
    pub fn num_qubits(&self) -> u32 {
        self.num_qubits
    }

    /// Get the number of classical bits.
    pub fn num_clbits(&self) -> u32 {
        self.num_clbits
    }

    /// The instruction list in program order.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Replace the instruction list. Callers must keep operands in range;
    /// [`Circuit::validate`] checks.
    pub fn set_instructions(&mut self, instructions: Vec<Instruction>) {
        self.instructions = instructions;
    }

    /// Take the instruction list, leaving the circuit empty.
    pub fn take_instructions(&mut self) -> Vec<Instruction> {
        std::mem::take(&mut self.instructions)
    }

    /// Widen the circuit to at least `num_qubits` qubits.
    pub fn ensure_qubits(&mut self, num_qubits: u32) {
        self.num_qubits = self.num_qubits.max(num_qubits);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Number of gate instructions (measurements and barriers excluded).
    pub fn num_gates(&self) -> usize {
        self.instructions.iter().filter(|i| i.is_gate()).count()
    }

    /// Number of instructions of any kind.
    pub fn num_ops(&self) -> usize {
        self.instructions.len()
    }

    /// Number of gates acting on two or more qubits.
    pub fn two_qubit_gate_count(&self) -> usize {
        self.instructions
            .iter()
            .filter(|i| i.is_multi_qubit_gate())
            .count()
    }

    /// Number of single-qubit measurements.
    pub fn measurement_count(&self) -> usize {
        self.instructions
            .iter()
            .filter(|i| i.is_measure())
            .map(Instruction::num_qubits)
            .sum()
    }

    /// Gate counts by gate name.
    pub fn gate_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for inst in &self.instructions {
            if let Some(gate) = inst.as_gate() {
                *counts.entry(gate.name().to_string()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Qubits touched by at least one gate or measurement.
    pub fn active_qubits(&self) -> BTreeSet<QubitId> {
        self.instructions
            .iter()
            .filter(|i| !i.is_barrier())
            .flat_map(|i| i.qubits.iter().copied())
            .collect()
    }

    /// Qubits that are measured somewhere in the circuit.
    pub fn measured_qubits(&self) -> BTreeSet<QubitId> {
        self.instructions
            .iter()
            .filter(|i| i.is_measure())
            .flat_map(|i| i.qubits.iter().copied())
            .collect()
    }

    /// Circuit depth: length of the longest qubit-local chain of operations.
    ///
    /// Barriers align the qubits they span without adding a layer.
    pub fn depth(&self) -> usize {
        let mut levels = vec![0usize; self.num_qubits as usize];
        let mut depth = 0;
        for inst in &self.instructions {
            if inst.is_barrier() {
                let span: Vec<usize> = if inst.qubits.is_empty() {
                    (0..levels.len()).collect()
                } else {
                    inst.qubits.iter().map(|q| q.index()).collect()
                };
                let top = span
                    .iter()
                    .filter_map(|&q| levels.get(q))
                    .copied()
                    .max()
                    .unwrap_or(0);
                for q in span {
                    if let Some(level) = levels.get_mut(q) {
                        *level = top;
                    }
                }
                continue;
            }
            let level = inst
                .qubits
                .iter()
                .filter_map(|q| levels.get(q.index()))
                .copied()
                .max()
                .unwrap_or(0)
                + 1;
            for q in &inst.qubits {
                if let Some(l) = levels.get_mut(q.index()) {
                    *l = level;
                }
            }
            depth = depth.max(level);
        }
        depth
    }

    /// Validate the whole circuit.
    pub fn validate(&self) -> IrResult<()> {
        if self.num_qubits == 0 {
            return Err(IrError::NoQubits);
        }
        for inst in &self.instructions {
            inst.validate(self.num_qubits, self.num_clbits)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bell_state() {
        let circuit = Circuit::bell().unwrap();
        assert_eq!(circuit.num_qubits(), 2);
        assert_eq!(circuit.num_gates(), 2);
        assert_eq!(circuit.depth(), 2);
        assert_eq!(circuit.two_qubit_gate_count(), 1);
    }

    #[test]
    fn test_ghz_depth() {
        let circuit = Circuit::ghz(5).unwrap();
        assert_eq!(circuit.num_gates(), 5);
        assert_eq!(circuit.depth(), 5);
        assert!(matches!(Circuit::ghz(0), Err(IrError::NoQubits)));
    }

    #[test]
    fn test_depth_parallel_gates() {
        let mut circuit = Circuit::with_size("par", 4, 0);
        circuit
            .h(QubitId(0))
            .unwrap()
            .h(QubitId(1))
            .unwrap()
            .h(QubitId(2))
            .unwrap()
            .cx(QubitId(0), QubitId(1))
            .unwrap();
        assert_eq!(circuit.depth(), 2);
    }

    #[test]
    fn test_barrier_aligns_without_adding_layer() {
        let mut circuit = Circuit::with_size("b", 2, 0);
        circuit.h(QubitId(0)).unwrap().h(QubitId(0)).unwrap();
        circuit.barrier([]).unwrap();
        circuit.x(QubitId(1)).unwrap();
        assert_eq!(circuit.depth(), 3);
    }

    #[test]
    fn test_measure_all_grows_clbits() {
        let mut circuit = Circuit::bell().unwrap();
        circuit.measure_all().unwrap();
        assert_eq!(circuit.num_clbits(), 2);
        assert_eq!(circuit.measurement_count(), 2);
        assert_eq!(circuit.num_gates(), 2);
        assert_eq!(circuit.num_ops(), 4);
        assert_eq!(circuit.measured_qubits().len(), 2);
    }

    #[test]
    fn test_push_rejects_invalid() {
        let mut circuit = Circuit::with_size("bad", 2, 0);
        assert!(circuit.cx(QubitId(0), QubitId(2)).is_err());
        assert_eq!(circuit.num_ops(), 0);
    }

    #[test]
    fn test_gate_counts_and_active_qubits() {
        let mut circuit = Circuit::with_size("c", 5, 0);
        circuit
            .h(QubitId(0))
            .unwrap()
            .h(QubitId(3))
            .unwrap()
            .cx(QubitId(0), QubitId(3))
            .unwrap();
        let counts = circuit.gate_counts();
        assert_eq!(counts.get("h"), Some(&2));
        assert_eq!(counts.get("cx"), Some(&1));
        let active: Vec<_> = circuit.active_qubits().into_iter().collect();
        assert_eq!(active, vec![QubitId(0), QubitId(3)]);
    }

    #[test]
    fn test_from_instructions_validates() {
        let insts = vec![Instruction::single_qubit_gate(StandardGate::X, QubitId(2))];
        assert!(Circuit::from_instructions("x", 2, 0, insts).is_err());
        assert!(matches!(
            Circuit::from_instructions("empty", 0, 0, vec![]),
            Err(IrError::NoQubits)
        ));
    }

    #[test]
    fn test_serde_json() {
        let circuit = Circuit::bell().unwrap();
        let json = serde_json::to_string(&circuit).unwrap();
        let back: Circuit = serde_json::from_str(&json).unwrap();
        assert_eq!(circuit, back);
    }
}
