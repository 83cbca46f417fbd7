//! Unclassified errors as seen at the recovery boundary.

use std::fmt;

use qforge_compile::CompileError;
use qforge_hal::HalError;
use qforge_ir::IrError;
use qforge_noise::NoiseError;
use qforge_qasm::ParseError;

/// An error before classification.
///
/// `status` follows HTTP conventions so that remote providers and local
/// errors share one classification path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawError {
    /// Human-readable message.
    pub message: String,
    /// Machine-readable code, if the source supplied one.
    pub code: Option<String>,
    /// HTTP-like status.
    pub status: Option<u16>,
}

impl RawError {
    /// An error with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            status: None,
        }
    }

    /// Set the code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Set the status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    fn bad_request(message: String) -> Self {
        Self::new(message).with_status(400)
    }
}

impl fmt::Display for RawError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status {status})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for RawError {}

impl From<IrError> for RawError {
    fn from(err: IrError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<ParseError> for RawError {
    fn from(err: ParseError) -> Self {
        Self::bad_request(err.to_string()).with_code("PARSE_ERROR")
    }
}

impl From<HalError> for RawError {
    fn from(err: HalError) -> Self {
        let message = err.to_string();
        match err {
            HalError::ProviderNotFound(_)
            | HalError::DuplicateProvider(_)
            | HalError::InvalidCapability { .. } => Self::bad_request(message),
            HalError::CircuitTooLarge { .. } => Self::new(message)
                .with_status(422)
                .with_code("CIRCUIT_TOO_LARGE"),
            HalError::Timeout(_) => Self::new(message).with_status(504),
            _ => Self::new(message),
        }
    }
}

impl From<NoiseError> for RawError {
    fn from(err: NoiseError) -> Self {
        match err {
            NoiseError::Provider(hal) => hal.into(),
            NoiseError::NoCandidate(_) => Self::new(err.to_string()).with_status(422),
            other => Self::bad_request(other.to_string()),
        }
    }
}

impl From<CompileError> for RawError {
    fn from(err: CompileError) -> Self {
        if err.is_validation() {
            return match err {
                CompileError::Provider(hal) => hal.into(),
                other => Self::bad_request(other.to_string()),
            };
        }
        match err {
            CompileError::Provider(hal) => hal.into(),
            other => Self::new(format!("compilation failed: {other}")).with_code("COMPILATION_FAILED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hal_statuses() {
        let raw: RawError = HalError::ProviderNotFound("Z".into()).into();
        assert_eq!(raw.status, Some(400));
        let raw: RawError = HalError::CircuitTooLarge {
            provider: "B".into(),
            required: 2000,
            available: 127,
        }
        .into();
        assert_eq!(raw.status, Some(422));
        let raw: RawError = HalError::Timeout("sim-1".into()).into();
        assert_eq!(raw.status, Some(504));
        let raw: RawError = HalError::SubmissionFailed("connection reset".into()).into();
        assert_eq!(raw.status, None);
        assert!(raw.message.contains("connection reset"));
    }

    #[test]
    fn test_compile_errors() {
        let raw: RawError = CompileError::GateNotInBasis {
            gate: "oracle".into(),
            provider: "B".into(),
        }
        .into();
        assert_eq!(raw.code.as_deref(), Some("COMPILATION_FAILED"));
        assert!(raw.message.starts_with("compilation failed"));

        let raw: RawError = CompileError::Validation("empty".into()).into();
        assert_eq!(raw.status, Some(400));
    }

    #[test]
    fn test_noise_delegates_provider() {
        let raw: RawError = NoiseError::Provider(HalError::Timeout("x".into())).into();
        assert_eq!(raw.status, Some(504));
        let raw: RawError = NoiseError::NoCandidate(5000).into();
        assert_eq!(raw.status, Some(422));
    }
}
