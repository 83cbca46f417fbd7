//! Scheduling strategies.
//!
//! A strategy scores queued jobs; higher scores run first. Ranking sorts
//! by submission order, then stable-sorts by score, so ties always keep
//! submission order whatever order the jobs were collected in.
//!
//! | Name | Score |
//! |------|-------|
//! | `fifo` | `-sequence` |
//! | `priority` | `100 × weight` |
//! | `resource-aware` | `100 × (1 - qubits / provider qubits) - 0.1 × depth` |
//! | `dependency-aware` | `10 × dependents + weight` |
//! | `cost-optimized` | `-estimated cost` |
//! | `fair-share` | `100 / (1 + owner's jobs in flight) + weight` |
//!
//! Every unsatisfied optional dependency subtracts the configured penalty.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use qforge_hal::ProviderRegistry;
use qforge_noise::circuit_cost;

use crate::error::{SchedError, SchedResult};
use crate::job::{Job, JobId};

/// Default score penalty per unsatisfied optional dependency.
pub const DEFAULT_OPTIONAL_DEPENDENCY_PENALTY: f64 = 5.0;

/// What strategies may look at besides the job itself.
#[derive(Debug, Clone, Copy)]
pub struct ScoreContext<'a> {
    /// Provider capabilities.
    pub registry: &'a ProviderRegistry,
    /// Number of jobs depending on each job.
    pub dependents: &'a FxHashMap<JobId, usize>,
    /// Jobs in flight per owner.
    pub in_flight_by_owner: &'a FxHashMap<String, usize>,
    /// Unsatisfied optional dependencies per job.
    pub unsatisfied_optional: &'a FxHashMap<JobId, usize>,
    /// Penalty per unsatisfied optional dependency.
    pub optional_penalty: f64,
}

/// A pluggable ordering for queued jobs.
pub trait SchedulingStrategy: Send + Sync + fmt::Debug {
    /// Registry key.
    fn name(&self) -> &str;

    /// Score `job`; higher runs first.
    fn score(&self, job: &Job, ctx: &ScoreContext<'_>) -> f64;
}

/// Built-in strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinStrategy {
    /// Submission order.
    Fifo,
    /// Priority weight.
    Priority,
    /// Small jobs on big providers first.
    ResourceAware,
    /// Jobs others wait on first.
    DependencyAware,
    /// Cheapest first.
    CostOptimized,
    /// Owners with fewer jobs in flight first.
    FairShare,
}

impl BuiltinStrategy {
    /// Every built-in strategy.
    pub const ALL: [BuiltinStrategy; 6] = [
        BuiltinStrategy::Fifo,
        BuiltinStrategy::Priority,
        BuiltinStrategy::ResourceAware,
        BuiltinStrategy::DependencyAware,
        BuiltinStrategy::CostOptimized,
        BuiltinStrategy::FairShare,
    ];

    /// Registry key.
    pub fn as_str(self) -> &'static str {
        match self {
            BuiltinStrategy::Fifo => "fifo",
            BuiltinStrategy::Priority => "priority",
            BuiltinStrategy::ResourceAware => "resource-aware",
            BuiltinStrategy::DependencyAware => "dependency-aware",
            BuiltinStrategy::CostOptimized => "cost-optimized",
            BuiltinStrategy::FairShare => "fair-share",
        }
    }
}

impl SchedulingStrategy for BuiltinStrategy {
    fn name(&self) -> &str {
        self.as_str()
    }

    fn score(&self, job: &Job, ctx: &ScoreContext<'_>) -> f64 {
        let weight = job.priority.weight();
        let cap = ctx.registry.lookup(&job.provider).ok();
        match self {
            BuiltinStrategy::Fifo => -(job.sequence() as f64),
            BuiltinStrategy::Priority => 100.0 * weight,
            BuiltinStrategy::ResourceAware => {
                let capacity = cap.map_or(0, |c| c.num_qubits).max(1);
                let usage = f64::from(job.num_qubits()) / f64::from(capacity);
                100.0 * (1.0 - usage.min(1.0)) - 0.1 * job.circuit.depth() as f64
            }
            BuiltinStrategy::DependencyAware => {
                let dependents = ctx.dependents.get(&job.id).copied().unwrap_or(0);
                10.0 * dependents as f64 + weight
            }
            BuiltinStrategy::CostOptimized => {
                -cap.map_or(0.0, |c| circuit_cost(&job.circuit, &c))
            }
            BuiltinStrategy::FairShare => {
                let in_flight = ctx.in_flight_by_owner.get(&job.owner).copied().unwrap_or(0);
                100.0 / (1.0 + in_flight as f64) + weight
            }
        }
    }
}

impl fmt::Display for BuiltinStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strategies by name.
#[derive(Debug, Clone)]
pub struct StrategyRegistry {
    strategies: FxHashMap<String, Arc<dyn SchedulingStrategy>>,
}

impl StrategyRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            strategies: FxHashMap::default(),
        }
    }

    /// A registry holding every built-in strategy.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for builtin in BuiltinStrategy::ALL {
            registry
                .strategies
                .insert(builtin.as_str().to_string(), Arc::new(builtin));
        }
        registry
    }

    /// Add a strategy under its own name.
    pub fn register(&mut self, strategy: Arc<dyn SchedulingStrategy>) -> SchedResult<()> {
        let name = strategy.name().to_string();
        if self.strategies.contains_key(&name) {
            return Err(SchedError::DuplicateStrategy(name));
        }
        self.strategies.insert(name, strategy);
        Ok(())
    }

    /// Strategy by name.
    pub fn get(&self, name: &str) -> SchedResult<Arc<dyn SchedulingStrategy>> {
        self.strategies
            .get(name)
            .cloned()
            .ok_or_else(|| SchedError::UnknownStrategy(name.to_string()))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.strategies.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Score including the optional-dependency penalty.
pub fn effective_score(strategy: &dyn SchedulingStrategy, job: &Job, ctx: &ScoreContext<'_>) -> f64 {
    let unsatisfied = ctx.unsatisfied_optional.get(&job.id).copied().unwrap_or(0);
    strategy.score(job, ctx) - ctx.optional_penalty * unsatisfied as f64
}

/// Order `jobs` for admission, best first.
pub fn rank<'j>(
    mut jobs: Vec<&'j Job>,
    strategy: &dyn SchedulingStrategy,
    ctx: &ScoreContext<'_>,
) -> Vec<&'j Job> {
    jobs.sort_by_key(|j| j.sequence());
    let mut scored: Vec<(f64, &'j Job)> = jobs
        .into_iter()
        .map(|j| (effective_score(strategy, j, ctx), j))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().map(|(_, j)| j).collect()
}
