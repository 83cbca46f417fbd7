//! Error types for the optimizer.

use qforge_hal::HalError;
use qforge_ir::IrError;
use thiserror::Error;

/// Errors raised while optimizing a circuit.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum CompileError {
    /// The request was rejected before any pass ran.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Unknown stage name in a stage list.
    #[error("Unknown optimization stage: '{0}'")]
    UnknownStage(String),

    /// A gate has no lowering into the provider's native set.
    #[error("Gate '{gate}' cannot be expressed in the native gate set of provider '{provider}'")]
    GateNotInBasis {
        /// The offending gate.
        gate: String,
        /// Target provider.
        provider: String,
    },

    /// Lowering did not reach the native set within the round limit.
    #[error("Lowering of '{gate}' did not converge within {rounds} rounds")]
    TranslationLimit {
        /// Gate being lowered.
        gate: String,
        /// Round limit that was hit.
        rounds: usize,
    },

    /// A pass failed.
    #[error("Pass '{pass}' failed: {message}")]
    PassFailed {
        /// Pass name.
        pass: String,
        /// What went wrong.
        message: String,
    },

    /// Circuit error.
    #[error("Circuit error: {0}")]
    Ir(#[from] IrError),

    /// Provider error.
    #[error(transparent)]
    Provider(#[from] HalError),
}

impl CompileError {
    /// Whether the error rejects the request itself rather than a pass.
    pub fn is_validation(&self) -> bool {
        match self {
            CompileError::Validation(_) | CompileError::UnknownStage(_) | CompileError::Ir(_) => {
                true
            }
            CompileError::Provider(err) => matches!(
                err,
                HalError::ProviderNotFound(_) | HalError::CircuitTooLarge { .. }
            ),
            _ => false,
        }
    }
}

/// Result type for optimizer operations.
pub type CompileResult<T> = Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_classes() {
        assert!(CompileError::UnknownStage("x".into()).is_validation());
        assert!(CompileError::Provider(HalError::ProviderNotFound("Z".into())).is_validation());
        assert!(
            !CompileError::GateNotInBasis {
                gate: "foo".into(),
                provider: "B".into()
            }
            .is_validation()
        );
    }
}
