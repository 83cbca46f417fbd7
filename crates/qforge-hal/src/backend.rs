//! Execution backend trait.
//!
//! The [`Backend`] trait is the seam between the scheduler and whatever
//! actually runs a circuit:
//!
//! ```text
//!   submit(request) ──→ ExecutionHandle ──→ wait(handle) ──→ ExecutionReport
//!      (async)                                 (async)
//! ```
//!
//! | Method | Kind | Returns |
//! |--------|------|---------|
//! | `name()` | sync | `&str` |
//! | `submit()` | async | `HalResult<ExecutionHandle>` |
//! | `wait()` | async | `HalResult<ExecutionReport>` |
//! | `cancel()` | async | `HalResult<()>` |

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use qforge_ir::Circuit;

use crate::error::HalResult;

/// A circuit handed to a backend for execution.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// Label of the submitting job, for logs.
    pub label: String,
    /// Target provider.
    pub provider: String,
    /// Circuit to run (already optimized for the provider).
    pub circuit: Circuit,
    /// Estimated runtime on the provider, in microseconds.
    pub estimated_runtime_us: f64,
    /// Number of shots.
    pub shots: u32,
}

impl ExecutionRequest {
    /// Create a request with the default shot count.
    pub fn new(label: impl Into<String>, provider: impl Into<String>, circuit: Circuit) -> Self {
        Self {
            label: label.into(),
            provider: provider.into(),
            circuit,
            estimated_runtime_us: 0.0,
            shots: 1024,
        }
    }

    /// Set the estimated runtime.
    pub fn with_runtime_us(mut self, runtime_us: f64) -> Self {
        self.estimated_runtime_us = runtime_us;
        self
    }

    /// Set the shot count.
    pub fn with_shots(mut self, shots: u32) -> Self {
        self.shots = shots;
        self
    }
}

/// Opaque reference to an accepted execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionHandle {
    /// Backend-assigned identifier.
    pub id: String,
    /// Provider the execution runs on.
    pub provider: String,
    /// When the backend accepted it.
    pub submitted_at: DateTime<Utc>,
}

impl fmt::Display for ExecutionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.provider)
    }
}

/// Outcome of a finished execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Handle of the finished execution.
    pub handle: ExecutionHandle,
    /// Shots executed.
    pub shots: u32,
    /// Wall-clock time spent waiting for the backend.
    pub elapsed: Duration,
    /// When the execution finished.
    pub completed_at: DateTime<Utc>,
}

/// Trait for execution backends.
///
/// Implementations MUST be cancel-safe: the scheduler may drop a `wait`
/// future when the job is cancelled.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Name of this backend.
    fn name(&self) -> &str;

    /// Submit a circuit for execution.
    async fn submit(&self, request: &ExecutionRequest) -> HalResult<ExecutionHandle>;

    /// Wait for an accepted execution to finish.
    async fn wait(&self, handle: &ExecutionHandle) -> HalResult<ExecutionReport>;

    /// Cancel an accepted execution and release what the backend holds for it.
    async fn cancel(&self, handle: &ExecutionHandle) -> HalResult<()>;
}
