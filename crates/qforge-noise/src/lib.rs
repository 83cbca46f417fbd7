//! qforge Noise & Fidelity Estimator
//!
//! Scores circuits against a provider's noise model and recommends
//! mitigations.
//!
//! # Operations
//!
//! | Operation | Function | Service method |
//! |-----------|----------|----------------|
//! | Structural and timing analysis | [`analyze`] | [`NoiseEstimator::analyze`] |
//! | Fidelity estimate | [`estimate`] | [`NoiseEstimator::estimate_fidelity`] |
//! | Mitigation recommendations | [`recommend`] | [`NoiseEstimator::recommend_mitigations`] |
//! | Provider ranking | [`rank_candidates`] | [`NoiseEstimator::suggest_provider`] |
//!
//! The free functions take a [`ProviderCapability`](qforge_hal::ProviderCapability)
//! directly; the service resolves provider names through the registry and
//! validates the circuit first.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use qforge_hal::ProviderRegistry;
//! use qforge_ir::Circuit;
//! use qforge_noise::NoiseEstimator;
//!
//! let estimator = NoiseEstimator::new(Arc::new(ProviderRegistry::with_defaults()));
//! let est = estimator.estimate_fidelity(&Circuit::bell().unwrap(), "B").unwrap();
//! assert!(est.overall_fidelity > 0.0 && est.overall_fidelity <= 1.0);
//! ```

pub mod analysis;
pub mod error;
pub mod estimator;
pub mod mitigation;
pub mod ranking;
pub mod service;

pub use analysis::{CircuitAnalysis, analyze, circuit_cost, greedy_layers};
pub use error::{NoiseError, NoiseResult};
pub use estimator::{FidelityEstimate, estimate};
pub use mitigation::{MitigationStrategy, MitigationTechnique, recommend};
pub use ranking::{ProviderCandidate, rank_candidates};
pub use service::NoiseEstimator;
