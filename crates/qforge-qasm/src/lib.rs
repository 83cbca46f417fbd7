//! Circuit assembly import and export for qforge
//!
//! The interchange format is an OpenQASM-3-flavoured text: a version header,
//! register declarations, one gate per line and measurement assignments.
//!
//! | Feature | Example |
//! |---------|---------|
//! | Version declaration | `OPENQASM 3.0;` |
//! | Qubit declarations | `qubit[5] q;` or `qreg q[5];` |
//! | Classical bits | `bit[5] c;` or `creg c[5];` |
//! | Gates | `h q[0];`, `cx q[0], q[1];` |
//! | Parameterized gates | `rx(pi/4) q[0];` |
//! | Measurements | `c[0] = measure q[0];`, `c = measure q;`, `measure q[0] -> c[0];` |
//! | Barriers | `barrier;`, `barrier q[0], q[1];` |
//! | Comments | `// comment`, `/* block */` |
//!
//! Unknown gate names are kept as custom gates whose arity is the number of
//! operands, so provider-specific operations survive a round trip.
//!
//! # Example: Round-Trip
//!
//! ```rust
//! use qforge_qasm::{emit, parse};
//!
//! let original = r#"
//! OPENQASM 3.0;
//! qubit[3] q;
//! h q[0];
//! cx q[0], q[1];
//! cx q[1], q[2];
//! "#;
//!
//! let circuit = parse(original).unwrap();
//! let reparsed = parse(&emit(&circuit)).unwrap();
//! assert_eq!(circuit.instructions(), reparsed.instructions());
//! assert_eq!(circuit.num_qubits(), reparsed.num_qubits());
//! ```

mod emitter;
mod error;
mod lexer;
mod parser;

pub use emitter::emit;
pub use error::{ParseError, ParseResult};
pub use parser::parse;
