//! qforge Batch Scheduler
//!
//! Runs batches of circuits through optimization, fidelity estimation and
//! execution, honouring job dependencies and per-provider limits, and
//! handing failures to the recovery engine.
//!
//! | Piece | Role |
//! |-------|------|
//! | [`Job`] / [`JobStatus`] | One circuit on one provider and its status machine |
//! | [`BatchJob`] | Rollup metrics, derived status and merged view of a batch |
//! | [`SchedulingStrategy`] | Orders a batch's queued jobs |
//! | [`DependencyGraph`] | Rejects required-dependency cycles |
//! | [`ResourceManager`] | Static and dynamic provider limits |
//! | [`BatchScheduler`] | Scheduling rounds and execution tasks |
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use qforge_compile::{Optimizer, OptimizerConfig};
//! use qforge_hal::{ProviderRegistry, SimulatedBackend};
//! use qforge_ir::Circuit;
//! use qforge_recovery::{ErrorLedger, RecoveryEngine, StrategyRegistry};
//! use qforge_sched::{BatchScheduler, Job, JobStatus, Scheduler, SchedulerConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let registry = Arc::new(ProviderRegistry::with_defaults());
//! let optimizer = Arc::new(Optimizer::new(registry.clone(), OptimizerConfig::default()));
//! let recovery = RecoveryEngine::new(
//!     Arc::new(StrategyRegistry::with_defaults()),
//!     Arc::new(ErrorLedger::new()),
//! );
//! let scheduler = BatchScheduler::new(
//!     registry,
//!     optimizer,
//!     recovery,
//!     Arc::new(SimulatedBackend::new()),
//!     SchedulerConfig::default(),
//! )
//! .unwrap();
//!
//! let job = Job::new("bell", Circuit::bell().unwrap(), "A");
//! let batch = scheduler.submit_batch(vec![job], "fifo").await.unwrap();
//! let done = scheduler
//!     .wait_for_batch(&batch, Duration::from_secs(30))
//!     .await
//!     .unwrap();
//! assert_eq!(done.batch.status, JobStatus::Completed);
//! # }
//! ```

pub mod batch;
pub mod dependency;
pub mod error;
pub mod job;
pub mod limits;
pub mod scheduler;
pub mod strategy;

pub use batch::{BatchJob, BatchMetrics, BatchSnapshot, MergedCircuit, ResourceUsage, derive_status, merge_circuits};
pub use dependency::{DependencyGraph, Readiness};
pub use error::{SchedError, SchedResult};
pub use job::{
    BatchId, Dependency, DependencyKind, Job, JobId, JobStatus, Priority, StatusChange,
};
pub use limits::{Admission, ProviderLimits, ProviderUsage, ResourceManager};
pub use scheduler::{
    BatchScheduler, DEPENDENCY_FAILED, RoundReport, Scheduler, SchedulerConfig,
};
pub use strategy::{
    BuiltinStrategy, DEFAULT_OPTIONAL_DEPENDENCY_PENALTY, ScoreContext, SchedulingStrategy,
    StrategyRegistry, rank,
};
