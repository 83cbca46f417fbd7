//! Error types for the estimator.

use qforge_hal::HalError;
use qforge_ir::IrError;
use thiserror::Error;

/// Errors that can occur while estimating.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum NoiseError {
    /// The circuit is malformed.
    #[error("Invalid circuit: {0}")]
    Circuit(#[from] IrError),

    /// Provider lookup or fit check failed.
    #[error(transparent)]
    Provider(#[from] HalError),

    /// No registered provider can hold the circuit.
    #[error("No provider can run a {0}-qubit circuit")]
    NoCandidate(u32),
}

/// Result type for estimator operations.
pub type NoiseResult<T> = Result<T, NoiseError>;
