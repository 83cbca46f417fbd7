//! Quantum gate types.

use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};

/// Words the assembly format reserves. Custom gates cannot use them.
pub const RESERVED_WORDS: [&str; 11] = [
    "OPENQASM", "include", "qubit", "bit", "qreg", "creg", "measure", "barrier", "pi", "tau",
    "euler",
];

/// Standard gates with known semantics.
///
/// Rotation angles are concrete radians. Equivalences used by the optimizer
/// hold up to a global phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StandardGate {
    // Single-qubit Pauli gates
    /// Identity gate.
    I,
    /// Pauli-X gate.
    X,
    /// Pauli-Y gate.
    Y,
    /// Pauli-Z gate.
    Z,

    // Single-qubit Clifford gates
    /// Hadamard gate.
    H,
    /// S gate (sqrt(Z)).
    S,
    /// S-dagger gate.
    Sdg,
    /// T gate (fourth root of Z).
    T,
    /// T-dagger gate.
    Tdg,
    /// sqrt(X) gate.
    SX,
    /// sqrt(X)-dagger gate.
    SXdg,

    // Single-qubit rotation gates
    /// Rotation around X axis.
    Rx(f64),
    /// Rotation around Y axis.
    Ry(f64),
    /// Rotation around Z axis.
    Rz(f64),
    /// Phase gate.
    P(f64),
    /// Universal single-qubit gate U(θ, φ, λ).
    U(f64, f64, f64),

    // Two-qubit gates
    /// Controlled-X (CNOT) gate.
    CX,
    /// Controlled-Y gate.
    CY,
    /// Controlled-Z gate.
    CZ,
    /// Controlled-Hadamard gate.
    CH,
    /// SWAP gate.
    Swap,
    /// iSWAP gate.
    ISwap,
    /// Controlled rotation around Z.
    CRz(f64),
    /// Controlled phase gate.
    CP(f64),
    /// XX rotation gate.
    RXX(f64),
    /// YY rotation gate.
    RYY(f64),
    /// ZZ rotation gate.
    RZZ(f64),

    // Three-qubit gates
    /// Toffoli gate (CCX).
    CCX,
    /// Fredkin gate (CSWAP).
    CSwap,
}

impl StandardGate {
    /// Get the name of this gate.
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            StandardGate::I => "id",
            StandardGate::X => "x",
            StandardGate::Y => "y",
            StandardGate::Z => "z",
            StandardGate::H => "h",
            StandardGate::S => "s",
            StandardGate::Sdg => "sdg",
            StandardGate::T => "t",
            StandardGate::Tdg => "tdg",
            StandardGate::SX => "sx",
            StandardGate::SXdg => "sxdg",
            StandardGate::Rx(_) => "rx",
            StandardGate::Ry(_) => "ry",
            StandardGate::Rz(_) => "rz",
            StandardGate::P(_) => "p",
            StandardGate::U(_, _, _) => "u",
            StandardGate::CX => "cx",
            StandardGate::CY => "cy",
            StandardGate::CZ => "cz",
            StandardGate::CH => "ch",
            StandardGate::Swap => "swap",
            StandardGate::ISwap => "iswap",
            StandardGate::CRz(_) => "crz",
            StandardGate::CP(_) => "cp",
            StandardGate::RXX(_) => "rxx",
            StandardGate::RYY(_) => "ryy",
            StandardGate::RZZ(_) => "rzz",
            StandardGate::CCX => "ccx",
            StandardGate::CSwap => "cswap",
        }
    }

    /// Get the number of qubits this gate operates on.
    #[inline]
    pub fn num_qubits(&self) -> u32 {
        match self {
            StandardGate::I
            | StandardGate::X
            | StandardGate::Y
            | StandardGate::Z
            | StandardGate::H
            | StandardGate::S
            | StandardGate::Sdg
            | StandardGate::T
            | StandardGate::Tdg
            | StandardGate::SX
            | StandardGate::SXdg
            | StandardGate::Rx(_)
            | StandardGate::Ry(_)
            | StandardGate::Rz(_)
            | StandardGate::P(_)
            | StandardGate::U(_, _, _) => 1,

            StandardGate::CX
            | StandardGate::CY
            | StandardGate::CZ
            | StandardGate::CH
            | StandardGate::Swap
            | StandardGate::ISwap
            | StandardGate::CRz(_)
            | StandardGate::CP(_)
            | StandardGate::RXX(_)
            | StandardGate::RYY(_)
            | StandardGate::RZZ(_) => 2,

            StandardGate::CCX | StandardGate::CSwap => 3,
        }
    }

    /// Get the parameters of this gate.
    pub fn params(&self) -> Vec<f64> {
        match *self {
            StandardGate::Rx(p)
            | StandardGate::Ry(p)
            | StandardGate::Rz(p)
            | StandardGate::P(p)
            | StandardGate::CRz(p)
            | StandardGate::CP(p)
            | StandardGate::RXX(p)
            | StandardGate::RYY(p)
            | StandardGate::RZZ(p) => vec![p],
            StandardGate::U(a, b, c) => vec![a, b, c],
            _ => vec![],
        }
    }

    /// Map alias spellings onto the standard gate names.
    pub fn canonical_name(name: &str) -> &str {
        match name {
            "U" | "u3" => "u",
            "CX" | "cnot" => "cx",
            "i" => "id",
            "phase" | "u1" => "p",
            "toffoli" => "ccx",
            "fredkin" => "cswap",
            other => other,
        }
    }

    /// Whether `name`, or the gate it is an alias of, is a standard gate.
    pub fn is_standard_name(name: &str) -> bool {
        Self::param_count(Self::canonical_name(name)).is_some()
    }

    /// Number of parameters a gate with this name takes, if it is standard.
    pub fn param_count(name: &str) -> Option<usize> {
        match name {
            "id" | "x" | "y" | "z" | "h" | "s" | "sdg" | "t" | "tdg" | "sx" | "sxdg" | "cx"
            | "cy" | "cz" | "ch" | "swap" | "iswap" | "ccx" | "cswap" => Some(0),
            "rx" | "ry" | "rz" | "p" | "crz" | "cp" | "rxx" | "ryy" | "rzz" => Some(1),
            "u" => Some(3),
            _ => None,
        }
    }

    /// Build a standard gate from its name and parameter list.
    ///
    /// Returns `Ok(None)` when the name is not a standard gate.
    pub fn from_name(name: &str, params: &[f64]) -> IrResult<Option<Self>> {
        let Some(expected) = Self::param_count(name) else {
            return Ok(None);
        };
        if params.len() != expected {
            return Err(IrError::ParameterCountMismatch {
                gate_name: name.to_string(),
                expected,
                got: params.len(),
            });
        }
        let gate = match (name, params) {
            ("id", _) => StandardGate::I,
            ("x", _) => StandardGate::X,
            ("y", _) => StandardGate::Y,
            ("z", _) => StandardGate::Z,
            ("h", _) => StandardGate::H,
            ("s", _) => StandardGate::S,
            ("sdg", _) => StandardGate::Sdg,
            ("t", _) => StandardGate::T,
            ("tdg", _) => StandardGate::Tdg,
            ("sx", _) => StandardGate::SX,
            ("sxdg", _) => StandardGate::SXdg,
            ("rx", [p]) => StandardGate::Rx(*p),
            ("ry", [p]) => StandardGate::Ry(*p),
            ("rz", [p]) => StandardGate::Rz(*p),
            ("p", [p]) => StandardGate::P(*p),
            ("u", [a, b, c]) => StandardGate::U(*a, *b, *c),
            ("cx", _) => StandardGate::CX,
            ("cy", _) => StandardGate::CY,
            ("cz", _) => StandardGate::CZ,
            ("ch", _) => StandardGate::CH,
            ("swap", _) => StandardGate::Swap,
            ("iswap", _) => StandardGate::ISwap,
            ("crz", [p]) => StandardGate::CRz(*p),
            ("cp", [p]) => StandardGate::CP(*p),
            ("rxx", [p]) => StandardGate::RXX(*p),
            ("ryy", [p]) => StandardGate::RYY(*p),
            ("rzz", [p]) => StandardGate::RZZ(*p),
            ("ccx", _) => StandardGate::CCX,
            ("cswap", _) => StandardGate::CSwap,
            _ => return Ok(None),
        };
        Ok(Some(gate))
    }

    /// Gates that square to the identity.
    pub fn is_self_inverse(&self) -> bool {
        matches!(
            self,
            StandardGate::I
                | StandardGate::X
                | StandardGate::Y
                | StandardGate::Z
                | StandardGate::H
                | StandardGate::CX
                | StandardGate::CY
                | StandardGate::CZ
                | StandardGate::CH
                | StandardGate::Swap
                | StandardGate::CCX
                | StandardGate::CSwap
        )
    }

    /// Whether the gate is invariant under permutation of its qubits.
    pub fn is_symmetric(&self) -> bool {
        matches!(
            self,
            StandardGate::CZ
                | StandardGate::Swap
                | StandardGate::ISwap
                | StandardGate::CP(_)
                | StandardGate::RXX(_)
                | StandardGate::RYY(_)
                | StandardGate::RZZ(_)
        )
    }

    /// The inverse gate, when it is expressible as a standard gate.
    pub fn inverse(&self) -> Option<StandardGate> {
        if self.is_self_inverse() {
            return Some(*self);
        }
        let inv = match *self {
            StandardGate::S => StandardGate::Sdg,
            StandardGate::Sdg => StandardGate::S,
            StandardGate::T => StandardGate::Tdg,
            StandardGate::Tdg => StandardGate::T,
            StandardGate::SX => StandardGate::SXdg,
            StandardGate::SXdg => StandardGate::SX,
            StandardGate::Rx(t) => StandardGate::Rx(-t),
            StandardGate::Ry(t) => StandardGate::Ry(-t),
            StandardGate::Rz(t) => StandardGate::Rz(-t),
            StandardGate::P(l) => StandardGate::P(-l),
            StandardGate::U(t, p, l) => StandardGate::U(-t, -l, -p),
            StandardGate::CRz(t) => StandardGate::CRz(-t),
            StandardGate::CP(l) => StandardGate::CP(-l),
            StandardGate::RXX(t) => StandardGate::RXX(-t),
            StandardGate::RYY(t) => StandardGate::RYY(-t),
            StandardGate::RZZ(t) => StandardGate::RZZ(-t),
            _ => return None,
        };
        Some(inv)
    }
}

/// A user-defined or provider-specific gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomGate {
    /// The name of the gate.
    pub name: String,
    /// The number of qubits it operates on.
    pub num_qubits: u32,
    /// Parameters of the gate.
    pub params: Vec<f64>,
}

impl CustomGate {
    /// Create a new custom gate.
    pub fn new(name: impl Into<String>, num_qubits: u32) -> Self {
        Self {
            name: name.into(),
            num_qubits,
            params: vec![],
        }
    }

    /// Add parameters to the gate.
    #[must_use]
    pub fn with_params(mut self, params: Vec<f64>) -> Self {
        self.params = params;
        self
    }

    /// Check that the name is a plain identifier not claimed by a standard
    /// gate, an alias or a reserved word.
    pub fn validate_name(&self) -> IrResult<()> {
        let invalid = |reason: &str| IrError::InvalidGateName {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        let mut chars = self.name.chars();
        let starts_well = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if !starts_well || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(invalid("not an identifier"));
        }
        if StandardGate::is_standard_name(&self.name) {
            return Err(invalid("collides with a standard gate"));
        }
        if RESERVED_WORDS.contains(&self.name.as_str()) {
            return Err(invalid("reserved word"));
        }
        Ok(())
    }
}

/// A quantum gate, either standard or custom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Gate {
    /// A standard gate with known semantics.
    Standard(StandardGate),
    /// A custom gate known only by name and arity.
    Custom(CustomGate),
}

impl Gate {
    /// Get the name of this gate.
    #[inline]
    pub fn name(&self) -> &str {
        match self {
            Gate::Standard(g) => g.name(),
            Gate::Custom(g) => &g.name,
        }
    }

    /// Get the number of qubits.
    #[inline]
    pub fn num_qubits(&self) -> u32 {
        match self {
            Gate::Standard(g) => g.num_qubits(),
            Gate::Custom(g) => g.num_qubits,
        }
    }

    /// Get the gate parameters.
    pub fn params(&self) -> Vec<f64> {
        match self {
            Gate::Standard(g) => g.params(),
            Gate::Custom(g) => g.params.clone(),
        }
    }

    /// The standard gate, if this is one.
    pub fn as_standard(&self) -> Option<&StandardGate> {
        match self {
            Gate::Standard(g) => Some(g),
            Gate::Custom(_) => None,
        }
    }

    /// Build a gate from a name, falling back to a custom gate for unknown names.
    pub fn from_name(name: &str, num_qubits: u32, params: Vec<f64>) -> IrResult<Self> {
        match StandardGate::from_name(name, &params)? {
            Some(g) => Ok(Gate::Standard(g)),
            None => Ok(Gate::Custom(CustomGate::new(name, num_qubits).with_params(params))),
        }
    }
}

impl From<StandardGate> for Gate {
    fn from(gate: StandardGate) -> Self {
        Gate::Standard(gate)
    }
}

impl From<CustomGate> for Gate {
    fn from(gate: CustomGate) -> Self {
        Gate::Custom(gate)
    }
}
