//! Error types for the qforge service.

use thiserror::Error;

use qforge_compile::CompileError;
use qforge_hal::HalError;
use qforge_ir::IrError;
use qforge_noise::NoiseError;
use qforge_qasm::ParseError;
use qforge_recovery::{RawError, RecoveryError};
use qforge_sched::SchedError;

/// Result type for service operations.
pub type QForgeResult<T> = Result<T, QForgeError>;

/// Errors that can occur in the qforge service.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QForgeError {
    /// Configuration could not be read.
    #[error("Failed to read config file {path}: {message}")]
    ConfigIo {
        /// File that was read.
        path: String,
        /// Underlying I/O message.
        message: String,
    },

    /// Configuration file is not valid YAML for [`crate::QForgeConfig`].
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] serde_yaml_ng::Error),

    /// Configuration values are inconsistent.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The tracing subscriber could not be installed.
    #[error("Failed to initialise tracing: {0}")]
    Tracing(String),

    /// Interchange text could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Circuit error.
    #[error(transparent)]
    Circuit(#[from] IrError),

    /// Provider registry error.
    #[error(transparent)]
    Provider(#[from] HalError),

    /// Estimator error.
    #[error(transparent)]
    Noise(#[from] NoiseError),

    /// Optimizer error.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Recovery configuration error.
    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    /// Scheduler error.
    #[error(transparent)]
    Sched(#[from] SchedError),
}

impl QForgeError {
    /// Whether the error rejects a request synchronously.
    pub fn is_validation(&self) -> bool {
        match self {
            QForgeError::ConfigIo { .. } | QForgeError::Tracing(_) => false,
            QForgeError::Compile(e) => e.is_validation(),
            QForgeError::Sched(e) => e.is_validation(),
            QForgeError::Provider(e) => matches!(
                e,
                HalError::ProviderNotFound(_) | HalError::CircuitTooLarge { .. }
            ),
            _ => true,
        }
    }
}

impl From<QForgeError> for RawError {
    fn from(err: QForgeError) -> Self {
        match err {
            QForgeError::Parse(e) => e.into(),
            QForgeError::Circuit(e) => e.into(),
            QForgeError::Provider(e) => e.into(),
            QForgeError::Noise(e) => e.into(),
            QForgeError::Compile(e) => e.into(),
            QForgeError::Sched(e) => e.into(),
            other if other.is_validation() => RawError::new(other.to_string()).with_status(400),
            other => RawError::new(other.to_string()),
        }
    }
}
