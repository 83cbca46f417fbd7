//! In-process simulated backend.
//!
//! [`SimulatedBackend`] accepts every request, sleeps for a scaled
//! version of the estimated runtime and reports success. Failures can be
//! injected deterministically with [`SimulatedBackend::inject_failures`],
//! which is how the scheduler's retry paths are exercised.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rustc_hash::FxHashMap;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::backend::{Backend, ExecutionHandle, ExecutionReport, ExecutionRequest};
use crate::error::{HalError, HalResult};

/// Where an injected failure fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    /// `Backend::submit`.
    Submit,
    /// `Backend::wait`.
    Wait,
}

#[derive(Debug)]
struct Fault {
    remaining: usize,
    message: String,
}

#[derive(Debug)]
struct Accepted {
    runtime: Duration,
    shots: u32,
}

/// Simulated execution backend with fault injection.
#[derive(Debug)]
pub struct SimulatedBackend {
    name: String,
    /// Real seconds slept per simulated second.
    time_scale: f64,
    /// Upper bound for a single simulated run.
    max_runtime: Duration,
    faults: Mutex<FxHashMap<FaultPoint, Fault>>,
    accepted: Mutex<FxHashMap<String, Accepted>>,
    next_id: AtomicU64,
    submissions: AtomicUsize,
}

impl SimulatedBackend {
    /// Create a backend that finishes every run immediately.
    pub fn new() -> Self {
        Self::with_time_scale(0.0)
    }

    /// Create a backend that sleeps `runtime × time_scale` per execution.
    pub fn with_time_scale(time_scale: f64) -> Self {
        Self {
            name: "simulated".into(),
            time_scale: time_scale.max(0.0),
            max_runtime: Duration::from_secs(5),
            faults: Mutex::new(FxHashMap::default()),
            accepted: Mutex::new(FxHashMap::default()),
            next_id: AtomicU64::new(1),
            submissions: AtomicUsize::new(0),
        }
    }

    /// Fail the next `count` calls at `point` with `message`.
    pub fn inject_failures(&self, point: FaultPoint, count: usize, message: impl Into<String>) {
        let mut faults = self
            .faults
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        faults.insert(
            point,
            Fault {
                remaining: count,
                message: message.into(),
            },
        );
    }

    /// Remove all pending injected failures.
    pub fn clear_failures(&self) {
        self.faults
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }

    /// Executions accepted but not yet finished, failed or cancelled.
    pub fn in_flight(&self) -> usize {
        self.accepted
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Number of `submit` calls seen, failed ones included.
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    fn forget(&self, id: &str) -> bool {
        self.accepted
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(id)
            .is_some()
    }

    fn take_fault(&self, point: FaultPoint) -> Option<String> {
        let mut faults = self
            .faults
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let fault = faults.get_mut(&point)?;
        if fault.remaining == 0 {
            return None;
        }
        fault.remaining -= 1;
        Some(fault.message.clone())
    }

    fn scaled_runtime(&self, runtime_us: f64) -> Duration {
        let secs = (runtime_us.max(0.0) * 1e-6 * self.time_scale).min(self.max_runtime.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for SimulatedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&self, request: &ExecutionRequest) -> HalResult<ExecutionHandle> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.take_fault(FaultPoint::Submit) {
            warn!(label = %request.label, provider = %request.provider, "Injected submit failure");
            return Err(HalError::SubmissionFailed(message));
        }

        let id = format!("sim-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let handle = ExecutionHandle {
            id: id.clone(),
            provider: request.provider.clone(),
            submitted_at: Utc::now(),
        };
        self.accepted
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(
                id,
                Accepted {
                    runtime: self.scaled_runtime(request.estimated_runtime_us),
                    shots: request.shots,
                },
            );
        debug!(label = %request.label, handle = %handle, "Accepted execution");
        Ok(handle)
    }

    async fn wait(&self, handle: &ExecutionHandle) -> HalResult<ExecutionReport> {
        let start = Instant::now();
        let (runtime, shots) = {
            let accepted = self
                .accepted
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let run = accepted
                .get(&handle.id)
                .ok_or_else(|| HalError::ExecutionNotFound(handle.id.clone()))?;
            (run.runtime, run.shots)
        };

        if !runtime.is_zero() {
            tokio::time::sleep(runtime).await;
        }

        if !self.forget(&handle.id) {
            return Err(HalError::JobCancelled);
        }
        if let Some(message) = self.take_fault(FaultPoint::Wait) {
            warn!(handle = %handle, "Injected execution failure");
            return Err(HalError::JobFailed(message));
        }

        Ok(ExecutionReport {
            handle: handle.clone(),
            shots,
            elapsed: start.elapsed(),
            completed_at: Utc::now(),
        })
    }

    async fn cancel(&self, handle: &ExecutionHandle) -> HalResult<()> {
        if !self.forget(&handle.id) {
            return Err(HalError::ExecutionNotFound(handle.id.clone()));
        }
        debug!(handle = %handle, "Cancelled execution");
        Ok(())
    }
}
