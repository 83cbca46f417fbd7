//! Provider ranking.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use qforge_hal::ProviderCapability;
use qforge_ir::Circuit;

use crate::analysis::analyze;
use crate::estimator::estimate;

/// Fidelity gap within which the cheaper provider is preferred.
pub const FIDELITY_TIE_WINDOW: f64 = 0.1;

/// One provider's score for a circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderCandidate {
    /// Provider name.
    pub provider: String,
    /// Estimated overall fidelity.
    pub fidelity: f64,
    /// Estimated runtime (µs).
    pub runtime_us: f64,
    /// Estimated price.
    pub cost: f64,
}

impl ProviderCandidate {
    /// Score `circuit` on `cap`.
    pub fn evaluate(circuit: &Circuit, cap: &ProviderCapability) -> Self {
        let analysis = analyze(circuit, cap);
        Self {
            provider: cap.name.clone(),
            fidelity: estimate(circuit, cap).overall_fidelity,
            runtime_us: analysis.estimated_runtime_us,
            cost: analysis.estimated_cost,
        }
    }
}

/// Build candidates from every provider that can hold `circuit`.
pub fn candidates<'a>(
    circuit: &Circuit,
    providers: impl IntoIterator<Item = &'a Arc<ProviderCapability>>,
) -> Vec<ProviderCandidate> {
    providers
        .into_iter()
        .filter(|cap| cap.num_qubits >= circuit.num_qubits())
        .map(|cap| ProviderCandidate::evaluate(circuit, cap))
        .collect()
}

/// Rank candidates: fidelity descending, then neighbours closer than
/// [`FIDELITY_TIE_WINDOW`] swap when the later one is strictly cheaper.
///
/// Every swap removes one cost inversion, so the loop terminates.
pub fn rank_candidates(mut candidates: Vec<ProviderCandidate>) -> Vec<ProviderCandidate> {
    candidates.sort_by(|a, b| b.fidelity.total_cmp(&a.fidelity));
    loop {
        let mut swapped = false;
        for i in 1..candidates.len() {
            let (prev, next) = (&candidates[i - 1], &candidates[i]);
            if (prev.fidelity - next.fidelity).abs() < FIDELITY_TIE_WINDOW && next.cost < prev.cost
            {
                candidates.swap(i - 1, i);
                swapped = true;
            }
        }
        if !swapped {
            return candidates;
        }
    }
}
