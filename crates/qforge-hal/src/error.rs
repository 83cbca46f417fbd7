//! Error types for the HAL crate.

use thiserror::Error;

/// Errors that can occur in HAL operations.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum HalError {
    /// No provider is registered under this name.
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    /// A provider with this name is already registered.
    #[error("Provider already registered: {0}")]
    DuplicateProvider(String),

    /// The capability record is internally inconsistent.
    #[error("Invalid capability for provider '{provider}': {reason}")]
    InvalidCapability {
        /// Provider name.
        provider: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Circuit exceeds the provider's qubit count.
    #[error("Circuit needs {required} qubits but provider '{provider}' has {available}")]
    CircuitTooLarge {
        /// Provider name.
        provider: String,
        /// Qubits the circuit needs.
        required: u32,
        /// Qubits the provider offers.
        available: u32,
    },

    /// Job submission failed.
    #[error("Job submission failed: {0}")]
    SubmissionFailed(String),

    /// Job execution failed.
    #[error("Job failed: {0}")]
    JobFailed(String),

    /// Job was cancelled.
    #[error("Job cancelled")]
    JobCancelled,

    /// The backend does not know this execution handle.
    #[error("Execution not found: {0}")]
    ExecutionNotFound(String),

    /// Timeout waiting for an execution.
    #[error("Timeout waiting for execution {0}")]
    Timeout(String),

    /// Generic backend error.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result type for HAL operations.
pub type HalResult<T> = Result<T, HalError>;
