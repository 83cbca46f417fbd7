//! qforge
//!
//! Provider-aware circuit optimization, fidelity estimation and batch
//! scheduling behind one service.
//!
//! # Overview
//!
//! [`QForge`] is built once from a [`QForgeConfig`] and answers four kinds
//! of requests:
//!
//! - [`QForge::optimize_circuit`]: run the optimization pipeline for a provider
//! - [`QForge::estimate_fidelity`]: predict the success probability on a provider
//! - [`QForge::submit_batch`] and [`QForge::get_batch_status`]: schedule jobs
//! - [`QForge::cancel_batch`]: stop a batch
//!
//! Configuration is read from YAML with `QFORGE_*` environment overrides;
//! see [`config`]. Logging goes through `tracing`; call [`init_tracing`] once
//! at startup.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use qforge::{Job, JobStatus, QForge, QForgeConfig};
//! use qforge_ir::Circuit;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), qforge::QForgeError> {
//! let qf = QForge::new(QForgeConfig::default())?;
//! let bell = Circuit::bell()?;
//!
//! let optimized = qf.optimize_circuit(&bell, "A", None)?;
//! assert!(optimized.expected_fidelity > 0.0);
//!
//! let batch = qf.submit_batch(vec![Job::new("bell", bell, "A")], None).await?;
//! let snapshot = qf.wait_for_batch(&batch, Duration::from_secs(30)).await?;
//! assert_eq!(snapshot.batch.status, JobStatus::Completed);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod service;
pub mod tracing_config;

pub use config::{QForgeConfig, RecoverySettings, SchedulerSettings, StrategyOverride};
pub use error::{QForgeError, QForgeResult};
pub use service::QForge;
pub use tracing_config::{
    DEFAULT_FILTER, TracingConfig, TracingFormat, init_default_tracing, init_tracing,
};

pub use qforge_compile::{OptimizationResult, OptimizationStage};
pub use qforge_noise::{CircuitAnalysis, FidelityEstimate, MitigationStrategy, ProviderCandidate};
pub use qforge_recovery::{ErrorDetails, ErrorKind, ErrorLedger};
pub use qforge_sched::{
    BatchId, BatchJob, BatchSnapshot, Dependency, DependencyKind, Job, JobId, JobStatus, Priority,
};
