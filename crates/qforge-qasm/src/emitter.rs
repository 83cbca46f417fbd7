//! Emitter for serializing circuits to the assembly format.

use std::fmt::Write as _;

use qforge_ir::{Circuit, ClbitId, Instruction, InstructionKind, QubitId};

/// Emit a circuit as assembly source.
///
/// Parameters are written with the shortest representation that parses back
/// to the same `f64`, so [`crate::parse`] reproduces the gate list exactly.
pub fn emit(circuit: &Circuit) -> String {
    let mut emitter = Emitter::new();
    emitter.emit_circuit(circuit);
    emitter.output
}

struct Emitter {
    output: String,
}

impl Emitter {
    fn new() -> Self {
        Self {
            output: String::new(),
        }
    }

    fn writeln(&mut self, line: &str) {
        self.output.push_str(line);
        self.output.push('\n');
    }

    fn emit_circuit(&mut self, circuit: &Circuit) {
        self.writeln("OPENQASM 3.0;");
        // The name is a comment; it must stay on one line.
        let name = circuit.name().replace(['\n', '\r'], " ");
        self.writeln(&format!("// {name}"));
        self.writeln(&format!("qubit[{}] q;", circuit.num_qubits()));
        if circuit.num_clbits() > 0 {
            self.writeln(&format!("bit[{}] c;", circuit.num_clbits()));
        }
        self.writeln("");

        for instruction in circuit.instructions() {
            self.emit_instruction(instruction);
        }
    }

    fn emit_instruction(&mut self, instruction: &Instruction) {
        match &instruction.kind {
            InstructionKind::Gate(gate) => {
                let qubits = emit_qubits(&instruction.qubits);
                let params = gate.params();
                if params.is_empty() {
                    self.writeln(&format!("{} {qubits};", gate.name()));
                } else {
                    let params = params
                        .iter()
                        .map(|p| format_param(*p))
                        .collect::<Vec<_>>()
                        .join(", ");
                    self.writeln(&format!("{}({params}) {qubits};", gate.name()));
                }
            }
            InstructionKind::Measure => {
                for (q, c) in instruction.qubits.iter().zip(&instruction.clbits) {
                    self.writeln(&format!("{} = measure {};", clbit(*c), qubit(*q)));
                }
            }
            InstructionKind::Barrier => {
                if instruction.qubits.is_empty() {
                    self.writeln("barrier;");
                } else {
                    self.writeln(&format!("barrier {};", emit_qubits(&instruction.qubits)));
                }
            }
        }
    }
}

fn qubit(q: QubitId) -> String {
    format!("q[{}]", q.0)
}

fn clbit(c: ClbitId) -> String {
    format!("c[{}]", c.0)
}

fn emit_qubits(qubits: &[QubitId]) -> String {
    qubits
        .iter()
        .map(|q| qubit(*q))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `{:?}` on `f64` is the shortest round-trip form and switches to exponent
/// notation for very large or small magnitudes, which the lexer accepts.
fn format_param(value: f64) -> String {
    let mut s = String::new();
    let _ = write!(s, "{value:?}");
    s
}
