//! Cancellable retry execution.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backoff::retry_delay;
use crate::classify::classify;
use crate::details::{ErrorContext, ErrorDetails, ErrorKind};
use crate::ledger::ErrorLedger;
use crate::raw::RawError;
use crate::strategy::{BackoffKind, RecoveryStrategy, StrategyRegistry};

/// Default upper bound for the random part of a retry delay.
pub const DEFAULT_JITTER: Duration = Duration::from_millis(100);

/// Window used by adaptive backoff to count recent failures.
const ADAPTIVE_WINDOW_HOURS: i64 = 1;

/// How a recovery attempt ended.
#[derive(Debug)]
pub enum RecoveryState<T> {
    /// A retry succeeded.
    Recovered(T),
    /// Every retry failed.
    Exhausted,
    /// The strategy timeout or the caller's deadline ran out.
    TimedOut,
    /// The strategy defers to the caller.
    RequiresUser,
    /// The error cannot be fixed by retrying.
    Unrecoverable,
    /// The caller cancelled.
    Cancelled,
}

/// Result of [`RecoveryEngine::execute`].
#[derive(Debug)]
pub struct RecoveryOutcome<T> {
    /// Final state.
    pub state: RecoveryState<T>,
    /// Strategy that drove the recovery.
    pub strategy: String,
    /// Operations attempted, the failed original included.
    pub attempts: u32,
    /// Retries actually run.
    pub retry_count: u32,
    /// Terminal error for every state but `Recovered`.
    pub follow_up: Option<ErrorDetails>,
}

impl<T> RecoveryOutcome<T> {
    fn finish(
        state: RecoveryState<T>,
        strategy: &RecoveryStrategy,
        retry_count: u32,
        follow_up: Option<ErrorDetails>,
    ) -> Self {
        Self {
            state,
            strategy: strategy.name.clone(),
            attempts: retry_count + 1,
            retry_count,
            follow_up,
        }
    }

    /// Whether a retry succeeded.
    pub fn is_recovered(&self) -> bool {
        matches!(self.state, RecoveryState::Recovered(_))
    }

    /// The recovered value, if any.
    pub fn into_value(self) -> Option<T> {
        match self.state {
            RecoveryState::Recovered(value) => Some(value),
            _ => None,
        }
    }
}

/// Where and under which limits a recovery runs.
#[derive(Debug, Clone)]
pub struct RetryScope {
    /// Context of the original failure.
    pub context: ErrorContext,
    /// Aborts waits and in-flight retries.
    pub token: CancellationToken,
    /// Cap on top of the strategy timeout.
    pub deadline: Option<Duration>,
}

impl RetryScope {
    /// A scope without an extra deadline.
    pub fn new(context: ErrorContext, token: CancellationToken) -> Self {
        Self {
            context,
            token,
            deadline: None,
        }
    }

    /// Cap the total recovery time.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Classifies failures, picks strategies and drives retries.
#[derive(Debug, Clone)]
pub struct RecoveryEngine {
    strategies: Arc<StrategyRegistry>,
    ledger: Arc<ErrorLedger>,
    jitter: Duration,
}

impl RecoveryEngine {
    /// Create an engine with [`DEFAULT_JITTER`].
    pub fn new(strategies: Arc<StrategyRegistry>, ledger: Arc<ErrorLedger>) -> Self {
        Self {
            strategies,
            ledger,
            jitter: DEFAULT_JITTER,
        }
    }

    /// Replace the jitter bound; zero disables jitter.
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// The strategy registry.
    pub fn strategies(&self) -> &StrategyRegistry {
        &self.strategies
    }

    /// The error ledger.
    pub fn ledger(&self) -> &Arc<ErrorLedger> {
        &self.ledger
    }

    /// Strategy for `details`, falling back to manual intervention.
    pub fn select_strategy(&self, details: &ErrorDetails) -> &RecoveryStrategy {
        self.strategies.select(details)
    }

    /// Classify `raw` and append it to the ledger.
    pub fn observe(&self, raw: &RawError, context: &ErrorContext) -> ErrorDetails {
        let details = classify(raw, context);
        self.ledger.record(details.clone());
        details
    }

    /// Classify `raw`, select a strategy and execute it.
    pub async fn recover<T, F, Fut>(
        &self,
        raw: &RawError,
        scope: RetryScope,
        retry: F,
    ) -> RecoveryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, RawError>>,
    {
        let details = classify(raw, &scope.context);
        let strategy = self.select_strategy(&details);
        self.execute(strategy, &details, scope, retry).await
    }

    fn recent_failures(&self, strategy: &RecoveryStrategy, last: &ErrorDetails) -> usize {
        if strategy.backoff != BackoffKind::Adaptive {
            return 0;
        }
        let since = Utc::now() - chrono::Duration::hours(ADAPTIVE_WINDOW_HOURS);
        self.ledger.count_since(last.kind(), last.provider(), since)
    }

    /// Run `strategy` for `error`.
    ///
    /// `error` is recorded in the ledger, as is every failure of a retry.
    /// `retry` receives the 1-based retry number. Each backoff wait and each
    /// retry races the scope's cancellation token. The time budget is the
    /// strategy timeout, capped by the scope deadline.
    pub async fn execute<T, F, Fut>(
        &self,
        strategy: &RecoveryStrategy,
        error: &ErrorDetails,
        scope: RetryScope,
        mut retry: F,
    ) -> RecoveryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, RawError>>,
    {
        self.ledger.record(error.clone());

        if strategy.requires_user_input || !strategy.automatic {
            let follow_up = error
                .follow_up(
                    error.kind(),
                    format!("{} (strategy '{}' requires user action)", error.message(), strategy.name),
                )
                .with_suggested_actions(error.suggested_actions().to_vec());
            info!(strategy = %strategy.name, kind = %error.kind(), "Recovery deferred to caller");
            return RecoveryOutcome::finish(RecoveryState::RequiresUser, strategy, 0, Some(follow_up));
        }
        if !error.recoverable() {
            return RecoveryOutcome::finish(
                RecoveryState::Unrecoverable,
                strategy,
                0,
                Some(error.clone().unrecoverable()),
            );
        }

        let start = Instant::now();
        let budget = scope
            .deadline
            .map_or(strategy.timeout, |d| d.min(strategy.timeout));
        let mut last = error.clone();

        for n in 1..=strategy.max_retries {
            let performed = n - 1;
            if scope.token.is_cancelled() {
                return cancelled(strategy, &last, performed);
            }

            let delay = retry_delay(strategy, n, self.recent_failures(strategy, &last), self.jitter);
            if start.elapsed() + delay > budget {
                return timed_out(strategy, &last, performed, budget);
            }

            warn!(
                strategy = %strategy.name,
                kind = %last.kind(),
                retry = n,
                "Retrying after failure (backoff {:?})",
                delay
            );
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = scope.token.cancelled() => return cancelled(strategy, &last, performed),
            }

            let remaining = budget.saturating_sub(start.elapsed());
            let attempt = tokio::select! {
                result = tokio::time::timeout(remaining, retry(n)) => result,
                () = scope.token.cancelled() => return cancelled(strategy, &last, performed),
            };

            match attempt {
                Ok(Ok(value)) => {
                    info!(strategy = %strategy.name, retries = n, "Recovered");
                    return RecoveryOutcome::finish(RecoveryState::Recovered(value), strategy, n, None);
                }
                Ok(Err(raw)) => {
                    let context = scope.context.clone().with_attempt(n);
                    let details = classify(&raw, &context);
                    self.ledger.record(details.clone());
                    debug!(retry = n, kind = %details.kind(), "Retry failed");
                    if !details.recoverable() {
                        return RecoveryOutcome::finish(
                            RecoveryState::Unrecoverable,
                            strategy,
                            n,
                            Some(details.unrecoverable()),
                        );
                    }
                    last = details;
                }
                Err(_) => {
                    let follow_up = last.follow_up(
                        ErrorKind::Timeout,
                        format!("retry {n} did not finish within {budget:?}"),
                    );
                    self.ledger.record(follow_up.clone());
                    return RecoveryOutcome::finish(RecoveryState::TimedOut, strategy, n, Some(follow_up));
                }
            }
        }

        let follow_up = last.follow_up(
            last.kind(),
            format!(
                "{} (gave up after {} retries)",
                last.message(),
                strategy.max_retries
            ),
        );
        warn!(strategy = %strategy.name, retries = strategy.max_retries, "Recovery exhausted");
        RecoveryOutcome::finish(
            RecoveryState::Exhausted,
            strategy,
            strategy.max_retries,
            Some(follow_up),
        )
    }
}

fn cancelled<T>(strategy: &RecoveryStrategy, last: &ErrorDetails, retries: u32) -> RecoveryOutcome<T> {
    debug!(strategy = %strategy.name, retries, "Recovery cancelled");
    let follow_up = last.follow_up(last.kind(), "recovery cancelled");
    RecoveryOutcome::finish(RecoveryState::Cancelled, strategy, retries, Some(follow_up))
}

fn timed_out<T>(
    strategy: &RecoveryStrategy,
    last: &ErrorDetails,
    retries: u32,
    budget: Duration,
) -> RecoveryOutcome<T> {
    warn!(strategy = %strategy.name, retries, "Recovery ran out of time");
    let follow_up = last.follow_up(
        ErrorKind::Timeout,
        format!("recovery exceeded its {budget:?} budget"),
    );
    RecoveryOutcome::finish(RecoveryState::TimedOut, strategy, retries, Some(follow_up))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::details::OperationPhase;

    fn engine() -> RecoveryEngine {
        RecoveryEngine::new(
            Arc::new(StrategyRegistry::with_defaults()),
            Arc::new(ErrorLedger::new()),
        )
        .with_jitter(Duration::ZERO)
    }

    fn scope() -> RetryScope {
        RetryScope::new(
            ErrorContext::new(OperationPhase::Submission).with_provider("A"),
            CancellationToken::new(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_on_second_retry() {
        let engine = engine();
        let raw = RawError::new("connection reset by peer");
        let outcome = engine
            .recover(&raw, scope(), |n| async move {
                if n < 2 { Err(RawError::new("connection reset")) } else { Ok(n) }
            })
            .await;
        assert_eq!(outcome.strategy, "network-timeout");
        assert_eq!(outcome.retry_count, 2);
        assert_eq!(outcome.attempts, 3);
        assert!(outcome.follow_up.is_none());
        assert_eq!(outcome.into_value(), Some(2));
        // original plus one failed retry
        assert_eq!(engine.ledger().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_never_retried() {
        let engine = engine();
        let raw = RawError::new("qubit 9 out of range").with_status(400);
        let mut calls = 0;
        let outcome: RecoveryOutcome<()> = engine
            .recover(&raw, scope(), |_| {
                calls += 1;
                async { Ok(()) }
            })
            .await;
        assert!(matches!(outcome.state, RecoveryState::RequiresUser));
        assert_eq!(calls, 0);
        let follow_up = outcome.follow_up.unwrap();
        assert!(!follow_up.recoverable());
        assert!(!follow_up.suggested_actions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrecoverable_retry_error_stops() {
        let engine = engine();
        let raw = RawError::new("service unavailable");
        let outcome: RecoveryOutcome<()> = engine
            .recover(&raw, scope(), |_| async {
                Err(RawError::new("token expired").with_status(401))
            })
            .await;
        assert!(matches!(outcome.state, RecoveryState::Unrecoverable));
        assert_eq!(outcome.retry_count, 1);
        assert_eq!(outcome.follow_up.unwrap().kind(), ErrorKind::Auth);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_kind_falls_back_to_manual() {
        let engine = engine();
        let details = classify(&RawError::new("cosmic ray"), &scope().context);
        assert_eq!(engine.select_strategy(&details).name, "manual-intervention");
    }
}
