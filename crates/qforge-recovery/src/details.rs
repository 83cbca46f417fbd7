//! Classified error records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RecoveryError;

/// Failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input, unknown provider, parameter out of range.
    Validation,
    /// Optimization or transpilation failed.
    Compilation,
    /// The provider failed while running the job.
    Execution,
    /// Transient transport failure.
    Network,
    /// Credentials rejected.
    Auth,
    /// Capacity or quota exceeded.
    Resource,
    /// An operation ran out of time.
    Timeout,
    /// Anything else.
    Unknown,
}

impl ErrorKind {
    /// Every kind, in declaration order.
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::Validation,
        ErrorKind::Compilation,
        ErrorKind::Execution,
        ErrorKind::Network,
        ErrorKind::Auth,
        ErrorKind::Resource,
        ErrorKind::Timeout,
        ErrorKind::Unknown,
    ];

    /// Lower-case name.
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Compilation => "compilation",
            ErrorKind::Execution => "execution",
            ErrorKind::Network => "network",
            ErrorKind::Auth => "auth",
            ErrorKind::Resource => "resource",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Code assigned when the raw error carries none.
    pub fn default_code(self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Compilation => "COMPILATION_ERROR",
            ErrorKind::Execution => "EXECUTION_ERROR",
            ErrorKind::Network => "NETWORK_ERROR",
            ErrorKind::Auth => "AUTH_ERROR",
            ErrorKind::Resource => "RESOURCE_EXHAUSTED",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Severity before any escalation.
    pub fn default_severity(self) -> Severity {
        match self {
            ErrorKind::Validation | ErrorKind::Network | ErrorKind::Resource => Severity::Low,
            ErrorKind::Compilation | ErrorKind::Timeout => Severity::Medium,
            ErrorKind::Execution | ErrorKind::Auth | ErrorKind::Unknown => Severity::High,
        }
    }

    /// Whether errors of this kind may be retried at all.
    pub fn is_recoverable(self) -> bool {
        !matches!(
            self,
            ErrorKind::Validation | ErrorKind::Auth | ErrorKind::Unknown
        )
    }

    /// What a user can do about an error of this kind.
    pub fn suggested_actions(self) -> Vec<String> {
        let actions: &[&str] = match self {
            ErrorKind::Validation => &[
                "Check the circuit for out-of-range qubits and non-finite parameters",
                "Verify the provider name against the registry",
                "Reduce the circuit width to the provider's qubit count",
            ],
            ErrorKind::Compilation => &[
                "Retry with the conservative optimization pipeline",
                "Replace custom gates with standard gates",
            ],
            ErrorKind::Execution => &[
                "Resubmit the job",
                "Choose another provider",
            ],
            ErrorKind::Network => &[
                "Check connectivity to the provider",
                "Retry after a short delay",
            ],
            ErrorKind::Auth => &[
                "Refresh the provider credentials",
                "Check the account's permissions",
            ],
            ErrorKind::Resource => &[
                "Wait for running jobs to finish",
                "Lower the batch size or split the batch",
            ],
            ErrorKind::Timeout => &[
                "Reduce circuit depth",
                "Raise the provider's maximum wait time",
            ],
            ErrorKind::Unknown => &["Inspect the error message and contact support"],
        };
        actions.iter().map(|a| (*a).to_string()).collect()
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ErrorKind {
    type Err = RecoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        ErrorKind::ALL
            .into_iter()
            .find(|k| k.name() == lower || (lower == "authentication" && *k == ErrorKind::Auth))
            .ok_or_else(|| RecoveryError::UnknownErrorKind(s.to_string()))
    }
}

/// How bad an error is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Cosmetic or transient.
    Low,
    /// Needs attention if repeated.
    Medium,
    /// The operation failed.
    High,
    /// The operation cannot proceed at all.
    Critical,
}

impl Severity {
    /// One step more severe, saturating at `Critical`.
    pub fn escalate(self) -> Self {
        match self {
            Severity::Low => Severity::Medium,
            Severity::Medium => Severity::High,
            Severity::High | Severity::Critical => Severity::Critical,
        }
    }

    /// Lower-case name.
    pub fn name(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where in a job's life an operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationPhase {
    /// Request validation.
    Validation,
    /// Optimization.
    Compilation,
    /// Handing the job to the provider.
    Submission,
    /// Waiting for the provider to run the job.
    Execution,
    /// Status polling.
    Polling,
}

/// Circumstances of a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Target provider, if known.
    pub provider: Option<String>,
    /// Affected job, if any.
    pub job_id: Option<String>,
    /// Phase that failed.
    pub phase: OperationPhase,
    /// Zero for the first attempt.
    pub attempt: u32,
}

impl ErrorContext {
    /// Context for a first attempt in `phase`.
    pub fn new(phase: OperationPhase) -> Self {
        Self {
            provider: None,
            job_id: None,
            phase,
            attempt: 0,
        }
    }

    /// Set the provider.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Set the job.
    pub fn with_job(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    /// Set the attempt number.
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }
}

/// A classified error.
///
/// Records are immutable once built; recovery derives new records through
/// [`ErrorDetails::follow_up`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetails {
    code: String,
    kind: ErrorKind,
    severity: Severity,
    message: String,
    recoverable: bool,
    suggested_actions: Vec<String>,
    provider: Option<String>,
    job_id: Option<String>,
    phase: Option<OperationPhase>,
    attempt: u32,
    occurred_at: DateTime<Utc>,
}

impl ErrorDetails {
    /// A record with the kind's default code, severity and actions.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            code: kind.default_code().to_string(),
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            recoverable: kind.is_recoverable(),
            suggested_actions: kind.suggested_actions(),
            provider: None,
            job_id: None,
            phase: None,
            attempt: 0,
            occurred_at: Utc::now(),
        }
    }

    /// Replace the code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    /// Replace the severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Replace the suggested actions.
    pub fn with_suggested_actions(mut self, actions: Vec<String>) -> Self {
        self.suggested_actions = actions;
        self
    }

    /// Mark as not retryable.
    pub fn unrecoverable(mut self) -> Self {
        self.recoverable = false;
        self
    }

    /// Attach provider, job, phase and attempt from `context`.
    pub fn with_context(mut self, context: &ErrorContext) -> Self {
        self.provider = context.provider.clone();
        self.job_id = context.job_id.clone();
        self.phase = Some(context.phase);
        self.attempt = context.attempt;
        self
    }

    /// A terminal record describing what became of this error.
    ///
    /// Keeps provider, job and phase, bumps the attempt, and escalates the
    /// severity. The result is never recoverable.
    pub fn follow_up(&self, kind: ErrorKind, message: impl Into<String>) -> ErrorDetails {
        ErrorDetails {
            code: kind.default_code().to_string(),
            kind,
            severity: self.severity.max(kind.default_severity()).escalate(),
            message: message.into(),
            recoverable: false,
            suggested_actions: kind.suggested_actions(),
            provider: self.provider.clone(),
            job_id: self.job_id.clone(),
            phase: self.phase,
            attempt: self.attempt + 1,
            occurred_at: Utc::now(),
        }
    }

    /// Machine-readable code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Failure class.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Severity.
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether an automatic retry may help.
    pub fn recoverable(&self) -> bool {
        self.recoverable
    }

    /// What the user can do.
    pub fn suggested_actions(&self) -> &[String] {
        &self.suggested_actions
    }

    /// Provider the error came from.
    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    /// Job the error belongs to.
    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    /// Phase that failed.
    pub fn phase(&self) -> Option<OperationPhase> {
        self.phase
    }

    /// Attempt number, zero for the first.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// When the error was recorded.
    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

impl fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.kind, self.message)
    }
}
