//! Provider capability introspection.
//!
//! This module defines the types that describe what a provider can do:
//! qubit count, native gates, connectivity topology, noise characteristics
//! and pricing. The optimizer uses these to decide transpilation and layout;
//! the estimator uses them to score circuits; the scheduler uses them to
//! route and cap jobs.
//!
//! All edges in [`Topology`] are bidirectional: if `(a, b)` is present,
//! both `a → b` and `b → a` are valid two-qubit interactions.
//!
//! Time values are in **microseconds**. Fidelities are in `(0.0, 1.0]`.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{HalError, HalResult};

/// Number of entangling gates a three-qubit gate is charged as.
pub const THREE_QUBIT_EQUIVALENT: u32 = 6;

/// Level of error correction a provider applies below the gate layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCorrectionLevel {
    /// Raw physical qubits.
    None,
    /// Basic error suppression.
    Basic,
    /// Error detection codes are available.
    Advanced,
    /// Fully error-corrected logical qubits.
    Logical,
}

impl fmt::Display for ErrorCorrectionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCorrectionLevel::None => "none",
            ErrorCorrectionLevel::Basic => "basic",
            ErrorCorrectionLevel::Advanced => "advanced",
            ErrorCorrectionLevel::Logical => "logical",
        };
        f.write_str(s)
    }
}

/// Static description of one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCapability {
    /// Provider name, used as the registry key.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Number of physical qubits.
    pub num_qubits: u32,
    /// Native gate set (OpenQASM 3 naming).
    pub gate_set: GateSet,
    /// Qubit connectivity.
    pub topology: Topology,
    /// Per-gate fidelities, durations and coherence times.
    pub noise: NoiseProfile,
    /// Per-gate prices.
    pub cost: CostTable,
    /// Error-correction level.
    pub error_correction: ErrorCorrectionLevel,
}

impl ProviderCapability {
    /// Provider `A`: a small, fully connected, expensive trapped-ion style device.
    pub fn provider_a() -> Self {
        let one_q = ["x", "y", "z", "rx", "ry"];
        let mut noise = NoiseProfile::new(1.0e7, 1.0e6, 0.995, 100.0);
        let mut cost = CostTable::new(1.0, 0.01);
        for g in one_q {
            noise.set_gate(g, 0.9995, 10.0);
            cost.set(g, 0.03);
        }
        noise.set_gate("rz", 0.999_95, 1.0);
        cost.set("rz", 0.01);
        noise.set_gate("rxx", 0.985, 200.0);
        cost.set("rxx", 0.3);

        Self {
            name: "A".into(),
            description: "32-qubit all-to-all device with error detection".into(),
            num_qubits: 32,
            gate_set: GateSet::new(["x", "y", "z", "rx", "ry", "rz"], ["rxx"], []),
            topology: Topology::full(32),
            noise,
            cost,
            error_correction: ErrorCorrectionLevel::Advanced,
        }
    }

    /// Provider `B`: a 127-qubit sparse device with a chain plus periodic chords.
    pub fn provider_b() -> Self {
        let n = 127;
        let mut edges: Vec<(u32, u32)> = (0..n - 1).map(|i| (i, i + 1)).collect();
        edges.extend(
            (0..n)
                .filter(|i| i % 4 == 0 && i + 12 < n)
                .map(|i| (i, i + 12)),
        );

        let mut noise = NoiseProfile::new(120.0, 90.0, 0.98, 1.0);
        noise.set_gate("x", 0.9997, 0.035);
        noise.set_gate("sx", 0.9997, 0.035);
        noise.set_gate("rz", 1.0, 0.0);
        noise.set_gate("cx", 0.99, 0.3);

        let mut cost = CostTable::new(0.3, 0.005);
        cost.set("x", 0.001);
        cost.set("sx", 0.001);
        cost.set("rz", 0.0);
        cost.set("cx", 0.01);

        Self {
            name: "B".into(),
            description: "127-qubit superconducting device with sparse coupling".into(),
            num_qubits: n,
            gate_set: GateSet::new(["x", "sx", "rz"], ["cx"], []),
            topology: Topology::custom(n, edges),
            noise,
            cost,
            error_correction: ErrorCorrectionLevel::Basic,
        }
    }

    /// Provider `C`: a 1024-qubit logical-qubit grid, cheap per gate.
    pub fn provider_c() -> Self {
        let mut noise = NoiseProfile::new(70.0, 55.0, 0.99, 0.5);
        let mut cost = CostTable::new(0.1, 0.001);
        for g in ["x", "h", "rx", "ry", "rz"] {
            noise.set_gate(g, 0.9999, 0.025);
            cost.set(g, 0.0002);
        }
        noise.set_gate("cz", 0.995, 0.04);
        cost.set("cz", 0.002);

        Self {
            name: "C".into(),
            description: "1024-qubit grid of error-corrected logical qubits".into(),
            num_qubits: 1024,
            gate_set: GateSet::new(["x", "h", "rx", "ry", "rz"], ["cz"], []),
            topology: Topology::grid(32, 32),
            noise,
            cost,
            error_correction: ErrorCorrectionLevel::Logical,
        }
    }

    /// Whether `gate` executes natively on this provider.
    pub fn is_native(&self, gate: &str) -> bool {
        self.gate_set.contains(gate)
    }

    /// Fidelity of one application of `gate` acting on `arity` qubits.
    pub fn gate_fidelity(&self, gate: &str, arity: u32) -> f64 {
        if let Some(&f) = self.noise.gate_fidelity.get(gate) {
            return f;
        }
        match arity {
            0 | 1 => self.mean_over(&self.gate_set.single_qubit, &self.noise.gate_fidelity, 0.999),
            2 => self.mean_over(&self.gate_set.two_qubit, &self.noise.gate_fidelity, 0.99),
            _ => self
                .gate_fidelity("", 2)
                .powi(THREE_QUBIT_EQUIVALENT as i32),
        }
    }

    /// Error rate (`1 - fidelity`) of one application of `gate`.
    pub fn gate_error(&self, gate: &str, arity: u32) -> f64 {
        1.0 - self.gate_fidelity(gate, arity)
    }

    /// Duration of `gate` in microseconds.
    pub fn gate_duration_us(&self, gate: &str, arity: u32) -> f64 {
        if gate == "measure" {
            return self.noise.measure_duration_us;
        }
        if let Some(&d) = self.noise.gate_duration_us.get(gate) {
            return d;
        }
        match arity {
            0 | 1 => self.mean_over(&self.gate_set.single_qubit, &self.noise.gate_duration_us, 0.1),
            2 => self.mean_over(&self.gate_set.two_qubit, &self.noise.gate_duration_us, 0.5),
            _ => self.gate_duration_us("", 2) * f64::from(THREE_QUBIT_EQUIVALENT),
        }
    }

    /// Price of one application of `gate`.
    pub fn gate_cost(&self, gate: &str, arity: u32) -> f64 {
        if gate == "measure" {
            return self.cost.measure;
        }
        if let Some(&c) = self.cost.per_gate.get(gate) {
            return c;
        }
        match arity {
            0 | 1 => self.mean_over(&self.gate_set.single_qubit, &self.cost.per_gate, 0.0),
            2 => self.mean_over(&self.gate_set.two_qubit, &self.cost.per_gate, 0.0),
            _ => self.gate_cost("", 2) * f64::from(THREE_QUBIT_EQUIVALENT),
        }
    }

    /// Time scale for decoherence: `max(T1, T2)`.
    pub fn coherence_limit_us(&self) -> f64 {
        self.noise.t1_us.max(self.noise.t2_us)
    }

    /// Check that a circuit of `num_qubits` fits on this provider.
    pub fn check_fits(&self, num_qubits: u32) -> HalResult<()> {
        if num_qubits > self.num_qubits {
            return Err(HalError::CircuitTooLarge {
                provider: self.name.clone(),
                required: num_qubits,
                available: self.num_qubits,
            });
        }
        Ok(())
    }

    /// Check internal consistency.
    pub fn validate(&self) -> HalResult<()> {
        let invalid = |reason: String| HalError::InvalidCapability {
            provider: self.name.clone(),
            reason,
        };
        if self.name.is_empty() {
            return Err(invalid("empty name".into()));
        }
        if self.num_qubits == 0 {
            return Err(invalid("no qubits".into()));
        }
        if self.topology.num_qubits != self.num_qubits {
            return Err(invalid(format!(
                "topology spans {} qubits, provider has {}",
                self.topology.num_qubits, self.num_qubits
            )));
        }
        if let Some(&(a, b)) = self
            .topology
            .edges
            .iter()
            .find(|&&(a, b)| a == b || a >= self.num_qubits || b >= self.num_qubits)
        {
            return Err(invalid(format!("bad edge ({a}, {b})")));
        }
        for (gate, f) in &self.noise.gate_fidelity {
            if !(*f > 0.0 && *f <= 1.0) {
                return Err(invalid(format!("fidelity of '{gate}' is {f}")));
            }
        }
        let readout = self.noise.readout_fidelity;
        if !(readout > 0.0 && readout <= 1.0) {
            return Err(invalid(format!("readout fidelity is {readout}")));
        }
        if !(self.noise.t1_us > 0.0 && self.noise.t2_us > 0.0) {
            return Err(invalid("coherence times must be positive".into()));
        }
        Ok(())
    }

    fn mean_over(&self, gates: &[String], table: &BTreeMap<String, f64>, default: f64) -> f64 {
        let values: Vec<f64> = gates.iter().filter_map(|g| table.get(g)).copied().collect();
        if values.is_empty() {
            default
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    }
}

/// Native gate set of a provider.
///
/// Gate names follow the OpenQASM 3 naming convention (lowercase):
/// `h`, `cx`, `rz`, `rxx`, etc.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateSet {
    /// Single-qubit gates.
    pub single_qubit: Vec<String>,
    /// Two-qubit gates.
    pub two_qubit: Vec<String>,
    /// Three-qubit gates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub three_qubit: Vec<String>,
}

impl GateSet {
    /// Build a gate set from per-arity name lists.
    pub fn new<'a>(
        single_qubit: impl IntoIterator<Item = &'a str>,
        two_qubit: impl IntoIterator<Item = &'a str>,
        three_qubit: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self {
            single_qubit: single_qubit.into_iter().map(String::from).collect(),
            two_qubit: two_qubit.into_iter().map(String::from).collect(),
            three_qubit: three_qubit.into_iter().map(String::from).collect(),
        }
    }

    /// Check if a gate is in the set.
    pub fn contains(&self, gate: &str) -> bool {
        self.single_qubit.iter().any(|g| g == gate)
            || self.two_qubit.iter().any(|g| g == gate)
            || self.three_qubit.iter().any(|g| g == gate)
    }

    /// All gate names, single-qubit first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.single_qubit
            .iter()
            .chain(&self.two_qubit)
            .chain(&self.three_qubit)
            .map(String::as_str)
    }
}

/// Qubit connectivity topology.
///
/// Fully connected topologies carry no edge list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topology {
    /// Kind of topology.
    pub kind: TopologyKind,
    /// Number of physical qubits.
    pub num_qubits: u32,
    /// Coupling edges. Bidirectional; empty for fully connected devices.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<(u32, u32)>,
}

impl Topology {
    /// Create a fully connected topology.
    pub fn full(n: u32) -> Self {
        Self {
            kind: TopologyKind::FullyConnected,
            num_qubits: n,
            edges: vec![],
        }
    }

    /// Create a linear topology.
    pub fn linear(n: u32) -> Self {
        Self {
            kind: TopologyKind::Linear,
            num_qubits: n,
            edges: (0..n.saturating_sub(1)).map(|i| (i, i + 1)).collect(),
        }
    }

    /// Create a grid topology.
    pub fn grid(rows: u32, cols: u32) -> Self {
        let mut edges = vec![];
        for r in 0..rows {
            for c in 0..cols {
                let idx = r * cols + c;
                if c + 1 < cols {
                    edges.push((idx, idx + 1));
                }
                if r + 1 < rows {
                    edges.push((idx, idx + cols));
                }
            }
        }
        Self {
            kind: TopologyKind::Grid { rows, cols },
            num_qubits: rows * cols,
            edges,
        }
    }

    /// Create a custom topology from edges.
    pub fn custom(n: u32, edges: Vec<(u32, u32)>) -> Self {
        Self {
            kind: TopologyKind::Custom,
            num_qubits: n,
            edges,
        }
    }

    /// Whether every pair of qubits is coupled.
    pub fn is_fully_connected(&self) -> bool {
        self.kind == TopologyKind::FullyConnected
    }

    /// Check if two distinct qubits are directly coupled.
    pub fn is_connected(&self, q1: u32, q2: u32) -> bool {
        if q1 == q2 {
            return false;
        }
        if self.is_fully_connected() {
            return q1 < self.num_qubits && q2 < self.num_qubits;
        }
        self.edges
            .iter()
            .any(|&(a, b)| (a == q1 && b == q2) || (a == q2 && b == q1))
    }

    /// Qubits directly coupled to `q`, ascending.
    pub fn neighbors(&self, q: u32) -> Vec<u32> {
        if self.is_fully_connected() {
            return (0..self.num_qubits).filter(|&o| o != q).collect();
        }
        let mut out: Vec<u32> = self
            .edges
            .iter()
            .filter_map(|&(a, b)| match (a == q, b == q) {
                (true, _) => Some(b),
                (_, true) => Some(a),
                _ => None,
            })
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Number of couplings of `q`.
    pub fn degree(&self, q: u32) -> usize {
        if self.is_fully_connected() {
            return self.num_qubits.saturating_sub(1) as usize;
        }
        self.neighbors(q).len()
    }

    /// Adjacency list indexed by physical qubit.
    pub fn adjacency(&self) -> Vec<Vec<u32>> {
        let n = self.num_qubits as usize;
        if self.is_fully_connected() {
            return (0..self.num_qubits).map(|q| self.neighbors(q)).collect();
        }
        let mut adj = vec![Vec::new(); n];
        for &(a, b) in &self.edges {
            if (a as usize) < n && (b as usize) < n {
                adj[a as usize].push(b);
                adj[b as usize].push(a);
            }
        }
        adj
    }

    /// Hop distances from `source` to every qubit (BFS). Unreachable is `None`.
    pub fn distances_from(&self, source: u32) -> Vec<Option<u32>> {
        let n = self.num_qubits as usize;
        let mut dist = vec![None; n];
        if source as usize >= n {
            return dist;
        }
        if self.is_fully_connected() {
            for (q, d) in dist.iter_mut().enumerate() {
                *d = Some(u32::from(q != source as usize));
            }
            return dist;
        }
        let adj = self.adjacency();
        let mut queue = VecDeque::from([source]);
        dist[source as usize] = Some(0);
        while let Some(q) = queue.pop_front() {
            let next = dist[q as usize].unwrap_or(0) + 1;
            for &nb in &adj[q as usize] {
                if dist[nb as usize].is_none() {
                    dist[nb as usize] = Some(next);
                    queue.push_back(nb);
                }
            }
        }
        dist
    }

    /// Hop distance between two qubits, `None` when disconnected.
    pub fn distance(&self, q1: u32, q2: u32) -> Option<u32> {
        self.distances_from(q1).get(q2 as usize).copied().flatten()
    }
}

/// Kind of qubit topology.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[non_exhaustive]
pub enum TopologyKind {
    /// Fully connected (all-to-all).
    FullyConnected,
    /// Linear chain.
    Linear,
    /// 2D grid.
    Grid { rows: u32, cols: u32 },
    /// Custom coupling graph.
    Custom,
}

impl fmt::Display for TopologyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopologyKind::FullyConnected => write!(f, "fully-connected"),
            TopologyKind::Linear => write!(f, "linear"),
            TopologyKind::Grid { rows, cols } => write!(f, "grid {rows}x{cols}"),
            TopologyKind::Custom => write!(f, "custom"),
        }
    }
}

/// Per-gate noise characteristics of a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseProfile {
    /// Fidelity per native gate name.
    pub gate_fidelity: BTreeMap<String, f64>,
    /// Duration per native gate name (microseconds).
    pub gate_duration_us: BTreeMap<String, f64>,
    /// T1 relaxation time (microseconds).
    pub t1_us: f64,
    /// T2 dephasing time (microseconds).
    pub t2_us: f64,
    /// Readout fidelity per measured qubit.
    pub readout_fidelity: f64,
    /// Duration of one measurement (microseconds).
    pub measure_duration_us: f64,
}

impl NoiseProfile {
    /// Create a profile with empty gate tables.
    pub fn new(t1_us: f64, t2_us: f64, readout_fidelity: f64, measure_duration_us: f64) -> Self {
        Self {
            gate_fidelity: BTreeMap::new(),
            gate_duration_us: BTreeMap::new(),
            t1_us,
            t2_us,
            readout_fidelity,
            measure_duration_us,
        }
    }

    /// Record fidelity and duration of a gate.
    pub fn set_gate(&mut self, gate: &str, fidelity: f64, duration_us: f64) {
        self.gate_fidelity.insert(gate.to_string(), fidelity);
        self.gate_duration_us.insert(gate.to_string(), duration_us);
    }
}

/// Pricing of a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostTable {
    /// Price per gate application, by gate name.
    pub per_gate: BTreeMap<String, f64>,
    /// Price per measured qubit.
    pub measure: f64,
    /// Fixed price per submitted job.
    pub base_per_job: f64,
}

impl CostTable {
    /// Create a table with no gate prices.
    pub fn new(base_per_job: f64, measure: f64) -> Self {
        Self {
            per_gate: BTreeMap::new(),
            measure,
            base_per_job,
        }
    }

    /// Set the price of a gate.
    pub fn set(&mut self, gate: &str, cost: f64) {
        self.per_gate.insert(gate.to_string(), cost);
    }
}
