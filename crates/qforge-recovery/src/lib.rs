//! qforge Error Recovery
//!
//! Turns raw failures into classified [`ErrorDetails`], picks a
//! [`RecoveryStrategy`] for them and drives cancellable retries.
//!
//! ```text
//!   RawError ──classify──→ ErrorDetails ──select──→ RecoveryStrategy
//!                               │                         │
//!                               └──────→ execute ←────────┘
//!                                          │
//!               Recovered | Exhausted | TimedOut | RequiresUser
//!                       | Unrecoverable | Cancelled
//! ```
//!
//! Every observed error lands in the append-only [`ErrorLedger`].
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use qforge_recovery::{
//!     ErrorContext, ErrorLedger, OperationPhase, RawError, RecoveryEngine, RetryScope,
//!     StrategyRegistry,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let engine = RecoveryEngine::new(
//!     Arc::new(StrategyRegistry::with_defaults()),
//!     Arc::new(ErrorLedger::new()),
//! );
//! let scope = RetryScope::new(
//!     ErrorContext::new(OperationPhase::Submission).with_provider("B"),
//!     CancellationToken::new(),
//! );
//! let raw = RawError::new("invalid credentials").with_status(401);
//! let outcome = engine.recover(&raw, scope, |_| async { Ok::<_, RawError>(()) }).await;
//! assert!(!outcome.is_recovered());
//! assert_eq!(outcome.strategy, "authentication-failure");
//! # }
//! ```

pub mod backoff;
pub mod classify;
pub mod details;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod raw;
pub mod strategy;

pub use backoff::{base_delay, growth_factor, retry_delay};
pub use classify::{classify, classify_kind};
pub use details::{ErrorContext, ErrorDetails, ErrorKind, OperationPhase, Severity};
pub use engine::{DEFAULT_JITTER, RecoveryEngine, RecoveryOutcome, RecoveryState, RetryScope};
pub use error::{RecoveryError, RecoveryResult};
pub use ledger::{ErrorLedger, LedgerSummary};
pub use raw::RawError;
pub use strategy::{BackoffKind, BuiltinStrategy, RecoveryStrategy, StrategyRegistry};
