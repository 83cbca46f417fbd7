//! Job types for the batch scheduler.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use qforge_compile::OptimizationResult;
use qforge_ir::Circuit;
use qforge_noise::FidelityEstimate;
use qforge_recovery::ErrorDetails;

use crate::error::{SchedError, SchedResult};

/// Unique identifier for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Create a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a job ID from a string.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BatchId(pub Uuid);

impl BatchId {
    /// Create a new random batch ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a batch ID from a string.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job priority.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Weight 1.
    Low,
    /// Weight 2.
    #[default]
    Medium,
    /// Weight 3.
    High,
}

impl Priority {
    /// Numeric weight used by the scoring strategies.
    pub fn weight(self) -> f64 {
        match self {
            Priority::Low => 1.0,
            Priority::Medium => 2.0,
            Priority::High => 3.0,
        }
    }
}

/// What a dependency waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// The dependency finished, however it ended.
    Completion,
    /// The dependency completed successfully.
    Success,
    /// The dependency produced results this job consumes.
    Data,
}

/// An edge to a job that has to finish first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    /// The job depended on.
    pub job_id: JobId,
    /// What it has to reach.
    pub kind: DependencyKind,
    /// Optional dependencies only lower scheduling priority.
    pub optional: bool,
}

impl Dependency {
    /// A required dependency.
    pub fn required(job_id: JobId, kind: DependencyKind) -> Self {
        Self {
            job_id,
            kind,
            optional: false,
        }
    }

    /// An optional dependency.
    pub fn optional(job_id: JobId, kind: DependencyKind) -> Self {
        Self {
            job_id,
            kind,
            optional: true,
        }
    }

    /// Whether a dependency in `status` satisfies this edge.
    pub fn is_satisfied_by(&self, status: JobStatus) -> bool {
        match self.kind {
            DependencyKind::Completion => status.is_terminal(),
            DependencyKind::Success | DependencyKind::Data => status == JobStatus::Completed,
        }
    }

    /// Whether a dependency in `status` can never satisfy this edge.
    pub fn is_dead(&self, status: JobStatus) -> bool {
        status.is_terminal() && !self.is_satisfied_by(status)
    }
}

/// Status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Stored, waiting on dependencies.
    Pending,
    /// Ready, waiting for a provider slot.
    Queued,
    /// The optimizer is running.
    Optimizing,
    /// Handed to the backend.
    Submitted,
    /// The backend is executing it.
    Running,
    /// Waiting to be resubmitted after a recoverable failure.
    Retrying,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Cancelled by the user.
    Cancelled,
}

impl JobStatus {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether the job holds a provider slot.
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            JobStatus::Optimizing | JobStatus::Submitted | JobStatus::Running | JobStatus::Retrying
        )
    }

    /// Whether the status machine allows `self -> next`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        match self {
            Pending => matches!(next, Queued | Failed | Cancelled),
            Queued => matches!(next, Optimizing | Failed | Cancelled),
            Optimizing => matches!(next, Submitted | Failed | Cancelled),
            Submitted => matches!(next, Running | Retrying | Failed | Cancelled),
            Running => matches!(next, Completed | Failed | Retrying | Cancelled),
            Retrying => matches!(next, Submitted | Failed | Cancelled),
            Completed | Failed | Cancelled => false,
        }
    }

    /// Get a human-readable status name.
    pub fn name(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Queued => "queued",
            JobStatus::Optimizing => "optimizing",
            JobStatus::Submitted => "submitted",
            JobStatus::Running => "running",
            JobStatus::Retrying => "retrying",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One entry of a job's status history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    /// Previous status.
    pub from: JobStatus,
    /// New status.
    pub to: JobStatus,
    /// When it happened.
    pub at: DateTime<Utc>,
    /// Why, if anything beyond the status itself.
    pub reason: Option<String>,
}

/// A circuit scheduled for execution on one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier.
    pub id: JobId,
    /// Human-readable name.
    pub name: String,
    /// The circuit to run.
    pub circuit: Circuit,
    /// Target provider.
    pub provider: String,
    /// Scheduling priority.
    pub priority: Priority,
    /// Submitting user, for fair-share scheduling.
    pub owner: String,
    /// Jobs that have to finish first.
    pub dependencies: Vec<Dependency>,
    /// Number of shots.
    pub shots: u32,
    status: JobStatus,
    retry_count: u32,
    error: Option<ErrorDetails>,
    optimization: Option<OptimizationResult>,
    fidelity: Option<FidelityEstimate>,
    history: Vec<StatusChange>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    sequence: u64,
}

impl Job {
    /// Create a new pending job.
    pub fn new(name: impl Into<String>, circuit: Circuit, provider: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            name: name.into(),
            circuit,
            provider: provider.into(),
            priority: Priority::default(),
            owner: "default".into(),
            dependencies: Vec::new(),
            shots: 1024,
            status: JobStatus::Pending,
            retry_count: 0,
            error: None,
            optimization: None,
            fidelity: None,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
            sequence: 0,
        }
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the owner.
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    /// Set the shot count.
    pub fn with_shots(mut self, shots: u32) -> Self {
        self.shots = shots;
        self
    }

    /// Add a dependency.
    pub fn depends_on(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Current status.
    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Retries performed so far.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Terminal error of a failed job.
    pub fn error(&self) -> Option<&ErrorDetails> {
        self.error.as_ref()
    }

    /// Optimizer output, once the job got past optimization.
    pub fn optimization(&self) -> Option<&OptimizationResult> {
        self.optimization.as_ref()
    }

    /// Fidelity estimate of the optimized circuit.
    pub fn fidelity(&self) -> Option<&FidelityEstimate> {
        self.fidelity.as_ref()
    }

    /// Every status change, oldest first.
    pub fn history(&self) -> &[StatusChange] {
        &self.history
    }

    /// Creation timestamp.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time of the last change.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Submission order within the scheduler.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Move to `next`, recording the change.
    pub fn transition(&mut self, next: JobStatus, reason: Option<String>) -> SchedResult<()> {
        if self.status.is_terminal() {
            return Err(SchedError::AlreadyTerminal {
                job: self.id.to_string(),
                status: self.status.to_string(),
            });
        }
        if !self.status.can_transition_to(next) {
            return Err(SchedError::InvalidTransition {
                job: self.id.to_string(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        let now = Utc::now();
        self.history.push(StatusChange {
            from: self.status,
            to: next,
            at: now,
            reason,
        });
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Fail with `error`.
    pub fn fail(&mut self, error: ErrorDetails) -> SchedResult<()> {
        let reason = error.to_string();
        self.transition(JobStatus::Failed, Some(reason))?;
        self.error = Some(error);
        Ok(())
    }

    pub(crate) fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }

    pub(crate) fn set_retry_count(&mut self, retry_count: u32) {
        self.retry_count = retry_count;
        self.updated_at = Utc::now();
    }

    pub(crate) fn set_optimization(&mut self, result: OptimizationResult) {
        self.optimization = Some(result);
    }

    pub(crate) fn set_fidelity(&mut self, estimate: FidelityEstimate) {
        self.fidelity = Some(estimate);
    }

    /// Qubits the job needs.
    pub fn num_qubits(&self) -> u32 {
        self.circuit.num_qubits()
    }

    /// Required dependencies.
    pub fn required_dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.dependencies.iter().filter(|d| !d.optional)
    }
}
