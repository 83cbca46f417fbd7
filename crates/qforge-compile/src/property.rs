//! Shared state passed through the pipeline.
//!
//! [`PropertySet`] carries the target provider, the thresholds the passes
//! read, the layout chosen by the mapping stage and the human-readable trace
//! every pass appends to.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use qforge_hal::ProviderCapability;
use qforge_ir::QubitId;

/// Default error rate above which a gate gets an echo pair.
pub const DEFAULT_MITIGATION_ERROR_THRESHOLD: f64 = 0.005;

/// Default tolerance for treating a merged run as the identity.
pub const DEFAULT_MERGE_TOLERANCE: f64 = 1e-9;

/// A mapping from logical qubits to physical qubits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    logical_to_physical: FxHashMap<QubitId, u32>,
    physical_to_logical: FxHashMap<u32, QubitId>,
}

impl Layout {
    /// Create an empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Logical qubit i on physical qubit i.
    pub fn trivial(num_qubits: u32) -> Self {
        let mut layout = Self::new();
        for i in 0..num_qubits {
            layout.add(QubitId(i), i);
        }
        layout
    }

    /// Map `logical` to `physical`, dropping any mapping either side had.
    pub fn add(&mut self, logical: QubitId, physical: u32) {
        if let Some(old_logical) = self.physical_to_logical.insert(physical, logical) {
            if old_logical != logical {
                self.logical_to_physical.remove(&old_logical);
            }
        }
        if let Some(old_physical) = self.logical_to_physical.insert(logical, physical) {
            if old_physical != physical {
                self.physical_to_logical.remove(&old_physical);
            }
        }
    }

    /// Physical qubit of `logical`.
    pub fn get_physical(&self, logical: QubitId) -> Option<u32> {
        self.logical_to_physical.get(&logical).copied()
    }

    /// Logical qubit on `physical`.
    pub fn get_logical(&self, physical: u32) -> Option<QubitId> {
        self.physical_to_logical.get(&physical).copied()
    }

    /// Whether physical qubit `physical` is taken.
    pub fn is_occupied(&self, physical: u32) -> bool {
        self.physical_to_logical.contains_key(&physical)
    }

    /// Number of mapped qubits.
    pub fn len(&self) -> usize {
        self.logical_to_physical.len()
    }

    /// Whether nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.logical_to_physical.is_empty()
    }

    /// Whether every mapped qubit sits on its own index.
    pub fn is_trivial(&self) -> bool {
        self.iter().all(|(l, p)| l.0 == p)
    }

    /// `(logical, physical)` pairs sorted by logical qubit.
    pub fn iter(&self) -> impl Iterator<Item = (QubitId, u32)> + '_ {
        let mut pairs: Vec<(QubitId, u32)> = self
            .logical_to_physical
            .iter()
            .map(|(&l, &p)| (l, p))
            .collect();
        pairs.sort_unstable();
        pairs.into_iter()
    }

    /// Highest physical index in use.
    pub fn max_physical(&self) -> Option<u32> {
        self.physical_to_logical.keys().copied().max()
    }
}

/// State shared by the passes of one optimizer run.
#[derive(Debug, Clone)]
pub struct PropertySet {
    /// Target provider.
    pub provider: Arc<ProviderCapability>,
    /// Layout chosen by the mapping stage.
    pub layout: Option<Layout>,
    /// Error rate above which a gate is mitigated.
    pub mitigation_error_threshold: f64,
    /// Tolerance for dropping identity runs.
    pub merge_tolerance: f64,
    /// Running expected fidelity, updated after every stage.
    pub expected_fidelity: f64,
    /// Fidelity modeled by the last pass, overriding the estimator.
    pub modeled_fidelity: Option<f64>,
    /// Human-readable transformation steps.
    pub trace: Vec<String>,
}

impl PropertySet {
    /// Properties for `provider` with default thresholds.
    pub fn new(provider: Arc<ProviderCapability>) -> Self {
        Self {
            provider,
            layout: None,
            mitigation_error_threshold: DEFAULT_MITIGATION_ERROR_THRESHOLD,
            merge_tolerance: DEFAULT_MERGE_TOLERANCE,
            expected_fidelity: 1.0,
            modeled_fidelity: None,
            trace: Vec::new(),
        }
    }

    /// Override the mitigation threshold.
    #[must_use]
    pub fn with_mitigation_threshold(mut self, threshold: f64) -> Self {
        self.mitigation_error_threshold = threshold;
        self
    }

    /// Override the merge tolerance.
    #[must_use]
    pub fn with_merge_tolerance(mut self, tolerance: f64) -> Self {
        self.merge_tolerance = tolerance;
        self
    }

    /// Append a trace step.
    pub fn record(&mut self, step: impl Into<String>) {
        self.trace.push(step.into());
    }

    /// Whether `gate` is native on the target.
    pub fn is_native(&self, gate: &str) -> bool {
        self.provider.is_native(gate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_trivial() {
        let layout = Layout::trivial(4);
        assert_eq!(layout.get_physical(QubitId(3)), Some(3));
        assert_eq!(layout.get_logical(2), Some(QubitId(2)));
        assert!(layout.is_trivial());
        assert_eq!(layout.max_physical(), Some(3));
    }

    #[test]
    fn test_layout_add_replaces_both_sides() {
        let mut layout = Layout::trivial(2);
        layout.add(QubitId(0), 1);
        assert_eq!(layout.get_physical(QubitId(0)), Some(1));
        assert_eq!(layout.get_physical(QubitId(1)), None);
        assert_eq!(layout.get_logical(0), None);
        assert_eq!(layout.len(), 1);
    }

    #[test]
    fn test_layout_iter_sorted() {
        let mut layout = Layout::new();
        layout.add(QubitId(2), 7);
        layout.add(QubitId(0), 9);
        let pairs: Vec<_> = layout.iter().collect();
        assert_eq!(pairs, vec![(QubitId(0), 9), (QubitId(2), 7)]);
        assert!(!layout.is_trivial());
    }

    #[test]
    fn test_property_defaults() {
        let mut props = PropertySet::new(Arc::new(ProviderCapability::provider_b()));
        assert_eq!(props.mitigation_error_threshold, 0.005);
        assert!(props.is_native("sx"));
        assert!(!props.is_native("h"));
        props.record("step");
        assert_eq!(props.trace, vec!["step".to_string()]);
    }
}
