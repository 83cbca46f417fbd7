//! Recovery strategies and their registry.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::details::{ErrorDetails, ErrorKind, OperationPhase};
use crate::error::{RecoveryError, RecoveryResult};

/// How the wait between retries grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    /// `2^(n-1)`.
    Exponential,
    /// `n`.
    Linear,
    /// Constant.
    Fixed,
    /// `1.5^(n-1)`, stretched by recent failures of the same kind.
    Adaptive,
}

/// A named policy for responding to a class of failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryStrategy {
    /// Registry key.
    pub name: String,
    /// Kinds this strategy handles; empty means any.
    pub kinds: Vec<ErrorKind>,
    /// Restrict to failures in this phase.
    pub phase: Option<OperationPhase>,
    /// Retries run without asking anyone.
    pub automatic: bool,
    /// The caller has to act before anything else happens.
    pub requires_user_input: bool,
    /// Retries after the initial failure.
    pub max_retries: u32,
    /// Delay growth.
    pub backoff: BackoffKind,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for a single delay, before jitter.
    pub max_delay: Duration,
    /// Budget for all retries together.
    pub timeout: Duration,
}

impl RecoveryStrategy {
    /// A strategy that hands the error straight back to the caller.
    pub fn manual(name: impl Into<String>, kinds: Vec<ErrorKind>) -> Self {
        Self {
            name: name.into(),
            kinds,
            phase: None,
            automatic: false,
            requires_user_input: true,
            max_retries: 0,
            backoff: BackoffKind::Fixed,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            timeout: Duration::ZERO,
        }
    }

    /// An automatic retry strategy.
    pub fn retrying(
        name: impl Into<String>,
        kinds: Vec<ErrorKind>,
        max_retries: u32,
        backoff: BackoffKind,
        base_delay: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            kinds,
            phase: None,
            automatic: true,
            requires_user_input: false,
            max_retries,
            backoff,
            base_delay,
            max_delay: base_delay * 30,
            timeout,
        }
    }

    /// Restrict to one phase.
    pub fn in_phase(mut self, phase: OperationPhase) -> Self {
        self.phase = Some(phase);
        self
    }

    /// Set the per-delay cap.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Whether this strategy handles `details`.
    pub fn matches(&self, details: &ErrorDetails) -> bool {
        let kind_ok = self.kinds.is_empty() || self.kinds.contains(&details.kind());
        let phase_ok = self.phase.is_none() || self.phase == details.phase();
        kind_ok && phase_ok
    }

    /// Whether the engine retries on its own.
    pub fn retries_automatically(&self) -> bool {
        self.automatic && !self.requires_user_input && self.max_retries > 0
    }

    /// Reject self-contradictory definitions.
    pub fn validate(&self) -> RecoveryResult<()> {
        let invalid = |reason: &str| {
            Err(RecoveryError::InvalidStrategy {
                name: self.name.clone(),
                reason: reason.into(),
            })
        };
        if self.name.trim().is_empty() {
            return invalid("name must not be empty");
        }
        if self.automatic && self.requires_user_input {
            return invalid("an automatic strategy cannot require user input");
        }
        if self.automatic && self.max_retries > 0 && self.timeout.is_zero() {
            return invalid("a retrying strategy needs a non-zero timeout");
        }
        if self.max_delay < self.base_delay {
            return invalid("max_delay is smaller than base_delay");
        }
        Ok(())
    }
}

/// Built-in strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinStrategy {
    /// Timeouts while a job runs.
    ExecutionTimeout,
    /// Transient transport failures and other timeouts.
    NetworkTimeout,
    /// The provider failed the job.
    ProviderFailure,
    /// Optimization failed.
    CompilationFailure,
    /// Capacity or quota exceeded.
    ResourceExhaustion,
    /// Credentials rejected.
    AuthenticationFailure,
    /// Malformed request.
    ValidationFailure,
    /// Fallback for anything unmatched.
    ManualIntervention,
}

impl BuiltinStrategy {
    /// Matching order; `ManualIntervention` is the fallback and comes last.
    pub const ALL: [BuiltinStrategy; 8] = [
        BuiltinStrategy::ExecutionTimeout,
        BuiltinStrategy::NetworkTimeout,
        BuiltinStrategy::ProviderFailure,
        BuiltinStrategy::CompilationFailure,
        BuiltinStrategy::ResourceExhaustion,
        BuiltinStrategy::AuthenticationFailure,
        BuiltinStrategy::ValidationFailure,
        BuiltinStrategy::ManualIntervention,
    ];

    /// Registry key.
    pub fn name(self) -> &'static str {
        match self {
            BuiltinStrategy::ExecutionTimeout => "execution-timeout",
            BuiltinStrategy::NetworkTimeout => "network-timeout",
            BuiltinStrategy::ProviderFailure => "provider-failure",
            BuiltinStrategy::CompilationFailure => "compilation-failure",
            BuiltinStrategy::ResourceExhaustion => "resource-exhaustion",
            BuiltinStrategy::AuthenticationFailure => "authentication-failure",
            BuiltinStrategy::ValidationFailure => "validation-failure",
            BuiltinStrategy::ManualIntervention => "manual-intervention",
        }
    }

    /// The strategy definition.
    pub fn strategy(self) -> RecoveryStrategy {
        let secs = Duration::from_secs;
        let name = self.name();
        match self {
            BuiltinStrategy::ExecutionTimeout => RecoveryStrategy::retrying(
                name,
                vec![ErrorKind::Timeout],
                3,
                BackoffKind::Exponential,
                secs(2),
                secs(600),
            )
            .in_phase(OperationPhase::Execution)
            .with_max_delay(secs(60)),
            BuiltinStrategy::NetworkTimeout => RecoveryStrategy::retrying(
                name,
                vec![ErrorKind::Network, ErrorKind::Timeout],
                3,
                BackoffKind::Exponential,
                secs(1),
                secs(300),
            ),
            BuiltinStrategy::ProviderFailure => RecoveryStrategy::retrying(
                name,
                vec![ErrorKind::Execution],
                2,
                BackoffKind::Linear,
                secs(5),
                secs(600),
            )
            .with_max_delay(secs(60)),
            BuiltinStrategy::CompilationFailure => RecoveryStrategy::retrying(
                name,
                vec![ErrorKind::Compilation],
                2,
                BackoffKind::Fixed,
                Duration::from_millis(500),
                secs(60),
            )
            .with_max_delay(secs(5)),
            BuiltinStrategy::ResourceExhaustion => RecoveryStrategy::retrying(
                name,
                vec![ErrorKind::Resource],
                5,
                BackoffKind::Adaptive,
                secs(10),
                secs(1800),
            )
            .with_max_delay(secs(300)),
            BuiltinStrategy::AuthenticationFailure => {
                RecoveryStrategy::manual(name, vec![ErrorKind::Auth])
            }
            BuiltinStrategy::ValidationFailure => {
                RecoveryStrategy::manual(name, vec![ErrorKind::Validation])
            }
            BuiltinStrategy::ManualIntervention => RecoveryStrategy::manual(name, vec![]),
        }
    }
}

impl fmt::Display for BuiltinStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BuiltinStrategy {
    type Err = RecoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BuiltinStrategy::ALL
            .into_iter()
            .find(|b| b.name() == s)
            .ok_or_else(|| RecoveryError::UnknownStrategy(s.to_string()))
    }
}

/// Strategies by name, matched in registration order.
///
/// The fallback strategy is kept apart from the match list and is returned
/// whenever nothing else matches.
#[derive(Debug, Clone)]
pub struct StrategyRegistry {
    strategies: Vec<RecoveryStrategy>,
    index: FxHashMap<String, usize>,
    fallback: RecoveryStrategy,
}

impl StrategyRegistry {
    /// An empty registry with the manual-intervention fallback.
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
            index: FxHashMap::default(),
            fallback: BuiltinStrategy::ManualIntervention.strategy(),
        }
    }

    /// A registry holding every built-in strategy.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for builtin in BuiltinStrategy::ALL {
            if builtin != BuiltinStrategy::ManualIntervention {
                registry.push(builtin.strategy());
            }
        }
        registry
    }

    fn push(&mut self, strategy: RecoveryStrategy) {
        self.index.insert(strategy.name.clone(), self.strategies.len());
        self.strategies.push(strategy);
    }

    /// Append `strategy` to the match list.
    pub fn register(&mut self, strategy: RecoveryStrategy) -> RecoveryResult<()> {
        strategy.validate()?;
        if self.index.contains_key(&strategy.name) || strategy.name == self.fallback.name {
            return Err(RecoveryError::DuplicateStrategy(strategy.name));
        }
        self.push(strategy);
        Ok(())
    }

    /// Replace the registered strategy of the same name, keeping its position.
    pub fn override_strategy(&mut self, strategy: RecoveryStrategy) -> RecoveryResult<()> {
        strategy.validate()?;
        if strategy.name == self.fallback.name {
            self.fallback = strategy;
            return Ok(());
        }
        match self.index.get(&strategy.name) {
            Some(&i) => {
                self.strategies[i] = strategy;
                Ok(())
            }
            None => Err(RecoveryError::UnknownStrategy(strategy.name)),
        }
    }

    /// Strategy by name, the fallback included.
    pub fn get(&self, name: &str) -> Option<&RecoveryStrategy> {
        if name == self.fallback.name {
            return Some(&self.fallback);
        }
        self.index.get(name).map(|&i| &self.strategies[i])
    }

    /// First registered strategy matching `details`, else the fallback.
    pub fn select(&self, details: &ErrorDetails) -> &RecoveryStrategy {
        self.strategies
            .iter()
            .find(|s| s.matches(details))
            .unwrap_or(&self.fallback)
    }

    /// The fallback strategy.
    pub fn fallback(&self) -> &RecoveryStrategy {
        &self.fallback
    }

    /// Registered strategies in match order, fallback excluded.
    pub fn iter(&self) -> impl Iterator<Item = &RecoveryStrategy> {
        self.strategies.iter()
    }

    /// Number of strategies, fallback excluded.
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Whether only the fallback is present.
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
