//! Error handling for the batch scheduler.

use qforge_compile::CompileError;
use qforge_hal::HalError;
use qforge_ir::IrError;
use qforge_noise::NoiseError;
use qforge_recovery::RawError;
use thiserror::Error;

/// Result type for scheduler operations.
pub type SchedResult<T> = Result<T, SchedError>;

/// Errors that can occur during scheduler operations.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SchedError {
    /// Job not found in the scheduler.
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Batch not found in the scheduler.
    #[error("Batch not found: {0}")]
    BatchNotFound(String),

    /// The status machine does not allow this move.
    #[error("Invalid transition for job {job}: {from} -> {to}")]
    InvalidTransition {
        /// Job id.
        job: String,
        /// Current status.
        from: String,
        /// Requested status.
        to: String,
    },

    /// The job already reached a terminal status.
    #[error("Job {job} is already {status}")]
    AlreadyTerminal {
        /// Job id.
        job: String,
        /// Its terminal status.
        status: String,
    },

    /// A batch needs at least one job.
    #[error("Batch must contain at least one job")]
    EmptyBatch,

    /// The request was rejected before anything was stored.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A job exceeds a provider limit that can never be met.
    #[error("Job {job} needs {required} {resource} but provider '{provider}' allows {limit}")]
    LimitExceeded {
        /// Job id.
        job: String,
        /// Provider name.
        provider: String,
        /// Limited resource.
        resource: &'static str,
        /// What the job needs.
        required: u64,
        /// What the provider allows.
        limit: u64,
    },

    /// Required dependencies form a cycle.
    #[error("Dependency cycle detected: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    /// A required dependency names no known job.
    #[error("Invalid dependency: job {0} not found")]
    InvalidDependency(String),

    /// No scheduling strategy is registered under this name.
    #[error("Unknown scheduling strategy: '{0}'")]
    UnknownStrategy(String),

    /// A scheduling strategy with this name is already registered.
    #[error("Scheduling strategy already registered: '{0}'")]
    DuplicateStrategy(String),

    /// Timeout waiting for a batch.
    #[error("Timeout waiting for batch {0}")]
    Timeout(String),

    /// Circuit error.
    #[error("Circuit error: {0}")]
    Circuit(#[from] IrError),

    /// Optimizer error.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Estimator error.
    #[error(transparent)]
    Noise(#[from] NoiseError),

    /// Provider error.
    #[error(transparent)]
    Provider(#[from] HalError),
}

impl SchedError {
    /// Whether the error rejects a request synchronously.
    pub fn is_validation(&self) -> bool {
        match self {
            SchedError::EmptyBatch
            | SchedError::Validation(_)
            | SchedError::LimitExceeded { .. }
            | SchedError::DependencyCycle(_)
            | SchedError::InvalidDependency(_)
            | SchedError::UnknownStrategy(_)
            | SchedError::Circuit(_) => true,
            SchedError::Compile(e) => e.is_validation(),
            SchedError::Noise(NoiseError::Provider(e)) | SchedError::Provider(e) => matches!(
                e,
                HalError::ProviderNotFound(_) | HalError::CircuitTooLarge { .. }
            ),
            SchedError::Noise(_) => true,
            _ => false,
        }
    }
}

impl From<SchedError> for RawError {
    fn from(err: SchedError) -> Self {
        match err {
            SchedError::Compile(e) => e.into(),
            SchedError::Noise(e) => e.into(),
            SchedError::Provider(e) => e.into(),
            SchedError::Circuit(e) => e.into(),
            other @ SchedError::Timeout(_) => RawError::new(other.to_string()).with_status(504),
            other if other.is_validation() => RawError::new(other.to_string()).with_status(400),
            other => RawError::new(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SchedError::JobNotFound("job-123".to_string());
        assert_eq!(err.to_string(), "Job not found: job-123");

        let err = SchedError::DependencyCycle(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(err.to_string(), "Dependency cycle detected: a -> b -> a");

        let err = SchedError::LimitExceeded {
            job: "j".into(),
            provider: "C".into(),
            resource: "qubits",
            required: 2000,
            limit: 1024,
        };
        assert_eq!(
            err.to_string(),
            "Job j needs 2000 qubits but provider 'C' allows 1024"
        );
    }

    #[test]
    fn test_validation_classes() {
        assert!(SchedError::EmptyBatch.is_validation());
        assert!(SchedError::Provider(HalError::ProviderNotFound("Z".into())).is_validation());
        assert!(!SchedError::Provider(HalError::JobFailed("x".into())).is_validation());
        assert!(!SchedError::JobNotFound("x".into()).is_validation());
    }

    #[test]
    fn test_raw_status() {
        let raw: RawError = SchedError::EmptyBatch.into();
        assert_eq!(raw.status, Some(400));
        let raw: RawError = SchedError::Timeout("b".into()).into();
        assert_eq!(raw.status, Some(504));
    }
}
