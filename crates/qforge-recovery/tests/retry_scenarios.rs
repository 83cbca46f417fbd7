//! End-to-end recovery scenarios on paused time.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use qforge_hal::HalError;
use qforge_recovery::{
    BuiltinStrategy, ErrorContext, ErrorKind, ErrorLedger, OperationPhase, RawError,
    RecoveryEngine, RecoveryOutcome, RecoveryState, RetryScope, StrategyRegistry, classify,
};

fn engine() -> RecoveryEngine {
    RecoveryEngine::new(
        Arc::new(StrategyRegistry::with_defaults()),
        Arc::new(ErrorLedger::new()),
    )
    .with_jitter(Duration::ZERO)
}

fn submission_scope() -> RetryScope {
    RetryScope::new(
        ErrorContext::new(OperationPhase::Submission)
            .with_provider("A")
            .with_job("job-7"),
        CancellationToken::new(),
    )
}

fn timeout_error() -> RawError {
    HalError::SubmissionFailed("connection timed out".into()).into()
}

#[tokio::test(start_paused = true)]
async fn test_network_timeout_exhausts_after_three_retries() {
    let engine = engine();
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let outcome: RecoveryOutcome<()> = engine
        .recover(&timeout_error(), submission_scope(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(timeout_error()) }
        })
        .await;

    assert!(matches!(outcome.state, RecoveryState::Exhausted));
    assert_eq!(outcome.strategy, "network-timeout");
    assert_eq!(outcome.retry_count, 3);
    assert_eq!(outcome.attempts, 4);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let follow_up = outcome.follow_up.unwrap();
    assert_eq!(follow_up.kind(), ErrorKind::Timeout);
    assert!(!follow_up.recoverable());
    assert_eq!(follow_up.job_id(), Some("job-7"));

    // the original failure and three failed retries
    assert_eq!(engine.ledger().len(), 4);
    assert_eq!(engine.ledger().counts_by_kind()[&ErrorKind::Timeout], 4);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_waits_follow_exponential_growth() {
    let engine = engine();
    let start = Instant::now();
    let _: RecoveryOutcome<()> = engine
        .recover(&timeout_error(), submission_scope(), |_| async {
            Err(timeout_error())
        })
        .await;
    // 1 s + 2 s + 4 s
    assert_eq!(start.elapsed(), Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_cuts_recovery_short() {
    let engine = engine();
    let scope = submission_scope().with_deadline(Duration::from_secs(2));
    let outcome: RecoveryOutcome<()> = engine
        .recover(&timeout_error(), scope, |_| async { Err(timeout_error()) })
        .await;

    // the first 1 s wait fits, the second 2 s wait does not
    assert!(matches!(outcome.state, RecoveryState::TimedOut));
    assert_eq!(outcome.retry_count, 1);
    assert_eq!(outcome.follow_up.unwrap().kind(), ErrorKind::Timeout);
}

#[tokio::test(start_paused = true)]
async fn test_slow_retry_hits_the_budget() {
    let engine = engine();
    let scope = submission_scope().with_deadline(Duration::from_secs(10));
    let outcome: RecoveryOutcome<()> = engine
        .recover(&timeout_error(), scope, |_| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;
    assert!(matches!(outcome.state, RecoveryState::TimedOut));
    assert_eq!(outcome.retry_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_aborts_backoff() {
    let engine = engine();
    let scope = submission_scope();
    let token = scope.token.clone();
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        token.cancel();
    });

    let start = Instant::now();
    let outcome: RecoveryOutcome<()> = engine
        .recover(&timeout_error(), scope, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;
    canceller.await.unwrap();

    assert!(matches!(outcome.state, RecoveryState::Cancelled));
    assert_eq!(outcome.retry_count, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(start.elapsed(), Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_aborts_inflight_retry() {
    let engine = engine();
    let scope = submission_scope();
    let token = scope.token.clone();

    tokio::spawn(async move {
        // first backoff is 1 s, then the retry hangs
        tokio::time::sleep(Duration::from_secs(3)).await;
        token.cancel();
    });

    let outcome: RecoveryOutcome<()> = engine
        .recover(&timeout_error(), scope, |_| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        })
        .await;
    assert!(matches!(outcome.state, RecoveryState::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn test_auth_failure_requires_user() {
    let engine = engine();
    let raw = RawError::new("credential rejected").with_status(403);
    let outcome: RecoveryOutcome<()> = engine
        .recover(&raw, submission_scope(), |_| async { Ok(()) })
        .await;

    assert!(matches!(outcome.state, RecoveryState::RequiresUser));
    assert_eq!(outcome.strategy, "authentication-failure");
    assert_eq!(outcome.attempts, 1);
    let follow_up = outcome.follow_up.unwrap();
    assert_eq!(follow_up.kind(), ErrorKind::Auth);
    assert!(!follow_up.suggested_actions().is_empty());
    assert_eq!(engine.ledger().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_compilation_failure_uses_fixed_backoff() {
    let engine = engine();
    let ctx = ErrorContext::new(OperationPhase::Compilation).with_provider("B");
    let details = classify(&RawError::new("transpilation failed for oracle"), &ctx);
    let strategy = BuiltinStrategy::CompilationFailure.strategy();
    assert!(strategy.matches(&details));

    let start = Instant::now();
    let outcome = engine
        .execute(
            &strategy,
            &details,
            RetryScope::new(ctx, CancellationToken::new()),
            |n| async move {
                if n == 2 { Ok("conservative") } else { Err(RawError::new("compilation failed")) }
            },
        )
        .await;
    assert_eq!(outcome.retry_count, 2);
    assert_eq!(outcome.into_value(), Some("conservative"));
    assert_eq!(start.elapsed(), Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_adaptive_backoff_reads_the_ledger() {
    let ledger = Arc::new(ErrorLedger::new());
    let engine = RecoveryEngine::new(Arc::new(StrategyRegistry::with_defaults()), ledger.clone())
        .with_jitter(Duration::ZERO);
    let ctx = ErrorContext::new(OperationPhase::Submission).with_provider("C");
    for _ in 0..4 {
        ledger.record(classify(&RawError::new("quota exceeded"), &ctx));
    }

    let start = Instant::now();
    let outcome = engine
        .recover(
            &RawError::new("rate limit reached"),
            RetryScope::new(ctx, CancellationToken::new()),
            |_| async { Ok(()) },
        )
        .await;
    assert!(outcome.is_recovered());
    assert_eq!(outcome.strategy, "resource-exhaustion");
    // 10 s × 1.5^0 × (1 + 0.1 × 5 recent resource errors)
    assert_eq!(start.elapsed(), Duration::from_secs(15));
}
