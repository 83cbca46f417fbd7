//! Registry-backed estimator service.

use std::sync::Arc;

use tracing::{debug, instrument};

use qforge_hal::{ProviderCapability, ProviderRegistry};
use qforge_ir::Circuit;

use crate::analysis::{CircuitAnalysis, analyze};
use crate::error::{NoiseError, NoiseResult};
use crate::estimator::{FidelityEstimate, estimate};
use crate::mitigation::{MitigationStrategy, recommend};
use crate::ranking::{ProviderCandidate, candidates, rank_candidates};

/// Estimator operations addressed by provider name.
#[derive(Debug, Clone)]
pub struct NoiseEstimator {
    registry: Arc<ProviderRegistry>,
}

impl NoiseEstimator {
    /// Create an estimator over `registry`.
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this estimator reads.
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Analyze a circuit against a provider.
    pub fn analyze(&self, circuit: &Circuit, provider: &str) -> NoiseResult<CircuitAnalysis> {
        let cap = self.checked(circuit, provider)?;
        Ok(analyze(circuit, &cap))
    }

    /// Estimate fidelity of a circuit on a provider.
    #[instrument(skip(self, circuit), fields(qubits = circuit.num_qubits(), gates = circuit.num_gates()))]
    pub fn estimate_fidelity(
        &self,
        circuit: &Circuit,
        provider: &str,
    ) -> NoiseResult<FidelityEstimate> {
        let cap = self.checked(circuit, provider)?;
        let est = estimate(circuit, &cap);
        debug!(
            provider,
            fidelity = est.overall_fidelity,
            total_error = est.total_error,
            "Estimated fidelity"
        );
        Ok(est)
    }

    /// Recommend mitigations for a circuit on a provider.
    pub fn recommend_mitigations(
        &self,
        circuit: &Circuit,
        provider: &str,
    ) -> NoiseResult<Vec<MitigationStrategy>> {
        let cap = self.checked(circuit, provider)?;
        let est = estimate(circuit, &cap);
        Ok(recommend(circuit, &cap, &est))
    }

    /// Rank every provider that can hold the circuit.
    pub fn suggest_provider(&self, circuit: &Circuit) -> NoiseResult<Vec<ProviderCandidate>> {
        let caps = self.registry.capabilities();
        self.suggest_among(circuit, &caps)
    }

    /// Rank a subset of providers.
    pub fn suggest_among(
        &self,
        circuit: &Circuit,
        caps: &[Arc<ProviderCapability>],
    ) -> NoiseResult<Vec<ProviderCandidate>> {
        circuit.validate()?;
        let ranked = rank_candidates(candidates(circuit, caps));
        if ranked.is_empty() {
            return Err(NoiseError::NoCandidate(circuit.num_qubits()));
        }
        debug!(best = %ranked[0].provider, count = ranked.len(), "Ranked providers");
        Ok(ranked)
    }

    fn checked(&self, circuit: &Circuit, provider: &str) -> NoiseResult<Arc<ProviderCapability>> {
        circuit.validate()?;
        let cap = self.registry.lookup(provider)?;
        cap.check_fits(circuit.num_qubits())?;
        Ok(cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qforge_hal::HalError;

    fn estimator() -> NoiseEstimator {
        NoiseEstimator::new(Arc::new(ProviderRegistry::with_defaults()))
    }

    #[test]
    fn test_unknown_provider() {
        let err = estimator()
            .estimate_fidelity(&Circuit::bell().unwrap(), "Z")
            .unwrap_err();
        assert_eq!(err, NoiseError::Provider(HalError::ProviderNotFound("Z".into())));
    }

    #[test]
    fn test_too_large_for_provider() {
        let circuit = Circuit::with_size("wide", 64, 0);
        let err = estimator().analyze(&circuit, "A").unwrap_err();
        assert!(matches!(
            err,
            NoiseError::Provider(HalError::CircuitTooLarge { required: 64, .. })
        ));
    }

    #[test]
    fn test_suggest_provider_ranks_all_fitting() {
        let ranked = estimator()
            .suggest_provider(&Circuit::bell().unwrap())
            .unwrap();
        assert_eq!(ranked.len(), 3);
        for pair in ranked.windows(2) {
            let gap = pair[0].fidelity - pair[1].fidelity;
            assert!(gap > -0.1, "fidelity order violated beyond tie window");
        }
    }

    #[test]
    fn test_suggest_none_fit() {
        let circuit = Circuit::with_size("huge", 2000, 0);
        assert_eq!(
            estimator().suggest_provider(&circuit).unwrap_err(),
            NoiseError::NoCandidate(2000)
        );
    }
}
