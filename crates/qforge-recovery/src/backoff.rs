//! Retry delay computation.

use std::time::Duration;

use rand::Rng;

use crate::strategy::{BackoffKind, RecoveryStrategy};

/// Multiplier applied to the base delay before retry `retry` (1-based).
///
/// `recent_errors` only affects adaptive backoff.
pub fn growth_factor(kind: BackoffKind, retry: u32, recent_errors: usize) -> f64 {
    let n = retry.max(1);
    let exp = i32::try_from(n - 1).unwrap_or(i32::MAX);
    match kind {
        BackoffKind::Exponential => 2f64.powi(exp),
        BackoffKind::Linear => f64::from(n),
        BackoffKind::Fixed => 1.0,
        BackoffKind::Adaptive => 1.5f64.powi(exp) * (1.0 + 0.1 * recent_errors as f64),
    }
}

/// Delay before retry `retry`, capped at the strategy's `max_delay`.
pub fn base_delay(strategy: &RecoveryStrategy, retry: u32, recent_errors: usize) -> Duration {
    let secs = strategy.base_delay.as_secs_f64() * growth_factor(strategy.backoff, retry, recent_errors);
    Duration::from_secs_f64(secs.min(strategy.max_delay.as_secs_f64()))
}

/// [`base_delay`] plus uniform jitter in `[0, jitter)`.
pub fn retry_delay(
    strategy: &RecoveryStrategy,
    retry: u32,
    recent_errors: usize,
    jitter: Duration,
) -> Duration {
    let delay = base_delay(strategy, retry, recent_errors);
    if jitter.is_zero() {
        return delay;
    }
    let extra = rand::thread_rng().gen_range(0.0..jitter.as_secs_f64());
    delay + Duration::from_secs_f64(extra)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::details::ErrorKind;
    use proptest::prelude::*;

    fn strategy(backoff: BackoffKind) -> RecoveryStrategy {
        RecoveryStrategy::retrying(
            "t",
            vec![ErrorKind::Network],
            5,
            backoff,
            Duration::from_secs(1),
            Duration::from_secs(600),
        )
        .with_max_delay(Duration::from_secs(10))
    }

    #[test]
    fn test_growth_factors() {
        assert_eq!(growth_factor(BackoffKind::Exponential, 1, 0), 1.0);
        assert_eq!(growth_factor(BackoffKind::Exponential, 3, 0), 4.0);
        assert_eq!(growth_factor(BackoffKind::Linear, 3, 0), 3.0);
        assert_eq!(growth_factor(BackoffKind::Fixed, 7, 0), 1.0);
        assert_eq!(growth_factor(BackoffKind::Adaptive, 3, 0), 2.25);
        assert!((growth_factor(BackoffKind::Adaptive, 1, 5) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_delay_is_capped() {
        let s = strategy(BackoffKind::Exponential);
        assert_eq!(base_delay(&s, 2, 0), Duration::from_secs(2));
        assert_eq!(base_delay(&s, 10, 0), Duration::from_secs(10));
        assert_eq!(base_delay(&s, u32::MAX, 0), Duration::from_secs(10));
    }

    #[test]
    fn test_zero_jitter_is_exact() {
        let s = strategy(BackoffKind::Linear);
        assert_eq!(retry_delay(&s, 3, 0, Duration::ZERO), Duration::from_secs(3));
    }

    proptest! {
        #[test]
        fn jitter_stays_in_range(retry in 1u32..20, jitter_ms in 1u64..5000) {
            let s = strategy(BackoffKind::Exponential);
            let jitter = Duration::from_millis(jitter_ms);
            let base = base_delay(&s, retry, 0);
            let delay = retry_delay(&s, retry, 0, jitter);
            prop_assert!(delay >= base);
            prop_assert!(delay <= base + jitter);
        }
    }
}
