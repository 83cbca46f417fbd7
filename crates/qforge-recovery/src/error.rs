//! Error types for the recovery engine.

use thiserror::Error;

/// Errors raised while managing recovery strategies.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum RecoveryError {
    /// No strategy is registered under this name.
    #[error("Unknown recovery strategy: '{0}'")]
    UnknownStrategy(String),

    /// A strategy with this name is already registered.
    #[error("Recovery strategy already registered: '{0}'")]
    DuplicateStrategy(String),

    /// An error kind name did not parse.
    #[error("Unknown error kind: '{0}'")]
    UnknownErrorKind(String),

    /// The strategy definition is inconsistent.
    #[error("Invalid recovery strategy '{name}': {reason}")]
    InvalidStrategy {
        /// Strategy name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Result type for recovery operations.
pub type RecoveryResult<T> = Result<T, RecoveryError>;
