//! Per-provider resource limits.
//!
//! Two kinds of caps are enforced:
//! - static caps (qubits, depth) that a job either meets or never will;
//!   violating them is a validation failure;
//! - dynamic caps (concurrent jobs, submissions per hour) that only delay a
//!   job; it stays queued until a slot frees up.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::Instant;

use qforge_hal::{ProviderCapability, ProviderRegistry};

use crate::error::{SchedError, SchedResult};
use crate::job::JobId;

const HOUR: Duration = Duration::from_secs(3600);

/// Limits for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderLimits {
    /// Jobs optimizing, submitted, running or retrying at once.
    pub max_concurrent_jobs: usize,
    /// Widest circuit accepted.
    pub max_qubits: u32,
    /// Deepest optimized circuit accepted.
    pub max_depth: usize,
    /// Admissions within any sliding hour.
    pub max_submissions_per_hour: usize,
    /// Longest a job may spend retrying, in seconds.
    pub max_wait_time_secs: u64,
}

impl ProviderLimits {
    /// Default limits for `cap`.
    pub fn for_capability(cap: &ProviderCapability) -> Self {
        Self {
            max_concurrent_jobs: 4,
            max_qubits: cap.num_qubits,
            max_depth: 100_000,
            max_submissions_per_hour: 1_000,
            max_wait_time_secs: 1_800,
        }
    }

    /// Retry deadline.
    pub fn max_wait_time(&self) -> Duration {
        Duration::from_secs(self.max_wait_time_secs)
    }

    /// Reject limits no job could ever meet.
    pub fn validate(&self, provider: &str) -> SchedResult<()> {
        if self.max_concurrent_jobs == 0
            || self.max_qubits == 0
            || self.max_depth == 0
            || self.max_submissions_per_hour == 0
            || self.max_wait_time_secs == 0
        {
            return Err(SchedError::Validation(format!(
                "limits for provider '{provider}' must all be positive"
            )));
        }
        Ok(())
    }
}

/// Why a job could not be admitted right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A slot was taken.
    Admitted,
    /// Too many jobs in flight.
    ConcurrencyCap {
        /// Jobs in flight.
        in_flight: usize,
        /// Allowed.
        limit: usize,
    },
    /// Too many admissions within the last hour.
    HourlyCap {
        /// Admissions within the window.
        submitted: usize,
        /// Allowed.
        limit: usize,
    },
}

impl Admission {
    /// Whether a slot was taken.
    pub fn is_admitted(self) -> bool {
        self == Admission::Admitted
    }
}

/// Usage statistics for one provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderUsage {
    /// Provider name.
    pub provider: String,
    /// Jobs in flight.
    pub in_flight: usize,
    /// Admissions within the last hour.
    pub submissions_last_hour: usize,
    /// Configured limits.
    pub limits: ProviderLimits,
}

#[derive(Debug, Default)]
struct UsageState {
    in_flight: usize,
    admissions: VecDeque<Instant>,
}

impl UsageState {
    fn prune(&mut self, now: Instant) {
        while self
            .admissions
            .front()
            .is_some_and(|t| now.duration_since(*t) >= HOUR)
        {
            self.admissions.pop_front();
        }
    }
}

/// Resource manager for tracking and enforcing provider limits.
#[derive(Debug, Clone)]
pub struct ResourceManager {
    limits: Arc<FxHashMap<String, ProviderLimits>>,
    state: Arc<RwLock<FxHashMap<String, UsageState>>>,
}

impl ResourceManager {
    /// Limits for every provider in `registry`, with `overrides` taking
    /// precedence. Qubit caps never exceed the provider's qubit count.
    pub fn new(
        registry: &ProviderRegistry,
        overrides: &BTreeMap<String, ProviderLimits>,
    ) -> SchedResult<Self> {
        let mut limits = FxHashMap::default();
        for cap in registry.capabilities() {
            let mut l = overrides
                .get(&cap.name)
                .cloned()
                .unwrap_or_else(|| ProviderLimits::for_capability(&cap));
            l.max_qubits = l.max_qubits.min(cap.num_qubits);
            l.validate(&cap.name)?;
            limits.insert(cap.name.clone(), l);
        }
        Ok(Self {
            limits: Arc::new(limits),
            state: Arc::new(RwLock::new(FxHashMap::default())),
        })
    }

    /// Limits of `provider`.
    pub fn limits(&self, provider: &str) -> Option<&ProviderLimits> {
        self.limits.get(provider)
    }

    fn limits_or_err(&self, provider: &str) -> SchedResult<&ProviderLimits> {
        self.limits
            .get(provider)
            .ok_or_else(|| SchedError::Validation(format!("no limits for provider '{provider}'")))
    }

    /// Fail if a circuit of `qubits` qubits can never run on `provider`.
    pub fn check_qubits(&self, job: &JobId, provider: &str, qubits: u32) -> SchedResult<()> {
        let limits = self.limits_or_err(provider)?;
        if qubits > limits.max_qubits {
            return Err(SchedError::LimitExceeded {
                job: job.to_string(),
                provider: provider.to_string(),
                resource: "qubits",
                required: u64::from(qubits),
                limit: u64::from(limits.max_qubits),
            });
        }
        Ok(())
    }

    /// Fail if an optimized circuit is deeper than `provider` accepts.
    pub fn check_depth(&self, job: &JobId, provider: &str, depth: usize) -> SchedResult<()> {
        let limits = self.limits_or_err(provider)?;
        if depth > limits.max_depth {
            return Err(SchedError::LimitExceeded {
                job: job.to_string(),
                provider: provider.to_string(),
                resource: "depth",
                required: depth as u64,
                limit: limits.max_depth as u64,
            });
        }
        Ok(())
    }

    /// Retry deadline for `provider`.
    pub fn max_wait_time(&self, provider: &str) -> Option<Duration> {
        self.limits.get(provider).map(ProviderLimits::max_wait_time)
    }

    /// Take a slot on `provider` if both dynamic caps allow it.
    pub async fn try_admit(&self, provider: &str) -> Admission {
        let Some(limits) = self.limits.get(provider) else {
            return Admission::ConcurrencyCap {
                in_flight: 0,
                limit: 0,
            };
        };
        let now = Instant::now();
        let mut state = self.state.write().await;
        let usage = state.entry(provider.to_string()).or_default();
        usage.prune(now);

        if usage.in_flight >= limits.max_concurrent_jobs {
            return Admission::ConcurrencyCap {
                in_flight: usage.in_flight,
                limit: limits.max_concurrent_jobs,
            };
        }
        if usage.admissions.len() >= limits.max_submissions_per_hour {
            return Admission::HourlyCap {
                submitted: usage.admissions.len(),
                limit: limits.max_submissions_per_hour,
            };
        }
        usage.in_flight += 1;
        usage.admissions.push_back(now);
        Admission::Admitted
    }

    /// Give back a slot taken by [`try_admit`](Self::try_admit).
    pub async fn release(&self, provider: &str) {
        let mut state = self.state.write().await;
        if let Some(usage) = state.get_mut(provider) {
            usage.in_flight = usage.in_flight.saturating_sub(1);
        }
    }

    /// Current usage of every provider.
    pub async fn stats(&self) -> Vec<ProviderUsage> {
        let now = Instant::now();
        let state = self.state.read().await;
        let mut usage: Vec<ProviderUsage> = self
            .limits
            .iter()
            .map(|(provider, limits)| {
                let u = state.get(provider);
                ProviderUsage {
                    provider: provider.clone(),
                    in_flight: u.map_or(0, |u| u.in_flight),
                    submissions_last_hour: u.map_or(0, |u| {
                        u.admissions
                            .iter()
                            .filter(|t| now.duration_since(**t) < HOUR)
                            .count()
                    }),
                    limits: limits.clone(),
                }
            })
            .collect();
        usage.sort_by(|a, b| a.provider.cmp(&b.provider));
        usage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(overrides: BTreeMap<String, ProviderLimits>) -> ResourceManager {
        ResourceManager::new(&ProviderRegistry::with_defaults(), &overrides).unwrap()
    }

    #[test]
    fn test_qubit_cap_is_validation() {
        let rm = manager(BTreeMap::new());
        let id = JobId::new();
        assert!(rm.check_qubits(&id, "C", 1024).is_ok());
        let err = rm.check_qubits(&id, "C", 2000).unwrap_err();
        assert!(err.is_validation());
        assert!(matches!(
            err,
            SchedError::LimitExceeded {
                required: 2000,
                limit: 1024,
                ..
            }
        ));
    }

    #[test]
    fn test_override_cannot_exceed_device() {
        let cap = ProviderCapability::provider_a();
        let mut limits = ProviderLimits::for_capability(&cap);
        limits.max_qubits = 500;
        let rm = manager(BTreeMap::from([("A".to_string(), limits)]));
        assert_eq!(rm.limits("A").unwrap().max_qubits, 32);
    }

    #[test]
    fn test_zero_limit_rejected() {
        let cap = ProviderCapability::provider_b();
        let mut limits = ProviderLimits::for_capability(&cap);
        limits.max_concurrent_jobs = 0;
        let overrides = BTreeMap::from([("B".to_string(), limits)]);
        assert!(ResourceManager::new(&ProviderRegistry::with_defaults(), &overrides).is_err());
    }

    #[test]
    fn test_zero_wait_time_rejected() {
        let mut limits = ProviderLimits::for_capability(&ProviderCapability::provider_c());
        assert!(limits.validate("C").is_ok());
        limits.max_wait_time_secs = 0;
        assert!(limits.validate("C").unwrap_err().is_validation());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_cap_and_release() {
        let cap = ProviderCapability::provider_a();
        let mut limits = ProviderLimits::for_capability(&cap);
        limits.max_concurrent_jobs = 2;
        let rm = manager(BTreeMap::from([("A".to_string(), limits)]));

        assert!(rm.try_admit("A").await.is_admitted());
        assert!(rm.try_admit("A").await.is_admitted());
        assert_eq!(
            rm.try_admit("A").await,
            Admission::ConcurrencyCap {
                in_flight: 2,
                limit: 2
            }
        );
        rm.release("A").await;
        assert!(rm.try_admit("A").await.is_admitted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hourly_cap_slides() {
        let cap = ProviderCapability::provider_b();
        let mut limits = ProviderLimits::for_capability(&cap);
        limits.max_submissions_per_hour = 1;
        let rm = manager(BTreeMap::from([("B".to_string(), limits)]));

        assert!(rm.try_admit("B").await.is_admitted());
        rm.release("B").await;
        assert!(matches!(rm.try_admit("B").await, Admission::HourlyCap { .. }));

        tokio::time::advance(HOUR).await;
        assert!(rm.try_admit("B").await.is_admitted());
        let stats = rm.stats().await;
        let b = stats.iter().find(|u| u.provider == "B").unwrap();
        assert_eq!(b.in_flight, 1);
        assert_eq!(b.submissions_last_hour, 1);
    }
}
