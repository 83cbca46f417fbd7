//! Configuration management for qforge.
//!
//! Supports loading configuration from:
//! 1. Configuration files (YAML)
//! 2. Environment variables (with QFORGE_ prefix)
//!
//! Configuration precedence (highest to lowest):
//! 1. Environment variables
//! 2. Configuration file
//! 3. Default values

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use qforge_compile::{OptimizationStage, OptimizerConfig};
use qforge_recovery::{RecoveryStrategy, StrategyRegistry as RecoveryStrategies};
use qforge_sched::{
    BuiltinStrategy, DEFAULT_OPTIONAL_DEPENDENCY_PENALTY, ProviderLimits, SchedulerConfig,
};

use crate::error::{QForgeError, QForgeResult};
use crate::tracing_config::{TracingConfig, TracingFormat};

/// Complete qforge configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QForgeConfig {
    /// Optimizer pipeline settings.
    #[serde(default)]
    pub optimizer: OptimizerConfig,

    /// Recovery engine settings.
    #[serde(default)]
    pub recovery: RecoverySettings,

    /// Batch scheduler settings.
    #[serde(default)]
    pub scheduler: SchedulerSettings,

    /// Logging settings.
    #[serde(default)]
    pub tracing: TracingConfig,
}

/// Recovery engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoverySettings {
    /// Upper bound of the uniform jitter added to every backoff delay.
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    /// Entries the error ledger reserves room for up front.
    #[serde(default = "default_ledger_capacity_hint")]
    pub ledger_capacity_hint: usize,

    /// Overrides keyed by strategy name.
    #[serde(default)]
    pub strategies: BTreeMap<String, StrategyOverride>,
}

/// Partial override of a registered recovery strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyOverride {
    /// Retries after the initial failure.
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Delay before the first retry.
    #[serde(default)]
    pub base_delay_ms: Option<u64>,
    /// Budget for all retries together.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl StrategyOverride {
    /// `strategy` with the set fields replaced.
    pub fn apply(&self, mut strategy: RecoveryStrategy) -> RecoveryStrategy {
        if let Some(max_retries) = self.max_retries {
            strategy.max_retries = max_retries;
        }
        if let Some(ms) = self.base_delay_ms {
            strategy.base_delay = Duration::from_millis(ms);
            strategy.max_delay = strategy.max_delay.max(strategy.base_delay);
        }
        if let Some(ms) = self.timeout_ms {
            strategy.timeout = Duration::from_millis(ms);
        }
        strategy
    }
}

/// Batch scheduler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Interval between background scheduling rounds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Strategy used when a batch does not name one.
    #[serde(default = "default_strategy")]
    pub default_strategy: String,

    /// Score penalty per unsatisfied optional dependency.
    #[serde(default = "default_optional_dependency_penalty")]
    pub optional_dependency_penalty: f64,

    /// Per-provider limit overrides.
    #[serde(default)]
    pub limits: BTreeMap<String, ProviderLimits>,
}

// Default value functions
fn default_jitter_ms() -> u64 {
    100
}

fn default_ledger_capacity_hint() -> usize {
    1024
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_strategy() -> String {
    BuiltinStrategy::Fifo.as_str().to_string()
}

fn default_optional_dependency_penalty() -> f64 {
    DEFAULT_OPTIONAL_DEPENDENCY_PENALTY
}

impl Default for RecoverySettings {
    fn default() -> Self {
        Self {
            jitter_ms: default_jitter_ms(),
            ledger_capacity_hint: default_ledger_capacity_hint(),
            strategies: BTreeMap::new(),
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            default_strategy: default_strategy(),
            optional_dependency_penalty: default_optional_dependency_penalty(),
            limits: BTreeMap::new(),
        }
    }
}

impl RecoverySettings {
    /// Jitter as a duration.
    pub fn jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_ms)
    }

    /// The built-in strategies with the configured overrides applied.
    pub fn strategy_registry(&self) -> QForgeResult<RecoveryStrategies> {
        let mut registry = RecoveryStrategies::with_defaults();
        for (name, overrides) in &self.strategies {
            let current = registry
                .get(name)
                .cloned()
                .ok_or_else(|| QForgeError::Config(format!("Unknown recovery strategy: {name}")))?;
            registry.override_strategy(overrides.apply(current))?;
        }
        Ok(registry)
    }
}

impl SchedulerSettings {
    /// The scheduler's runtime configuration.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            optional_dependency_penalty: self.optional_dependency_penalty,
            limits: self.limits.clone(),
        }
    }
}

impl QForgeConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> QForgeResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| QForgeError::ConfigIo {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate YAML text.
    pub fn from_yaml(contents: &str) -> QForgeResult<Self> {
        let config: QForgeConfig = serde_yaml_ng::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> QForgeResult<Self> {
        let mut config = Self::default();
        config.merge_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration with the following precedence:
    /// 1. Load from file if provided
    /// 2. Apply environment variable overrides
    pub fn load<P: AsRef<Path>>(config_file: Option<P>) -> QForgeResult<Self> {
        let mut config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.merge_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `QFORGE_*` overrides read through `lookup`.
    ///
    /// Variables that are absent leave the corresponding fields unchanged.
    /// A value that does not parse is an error rather than silently ignored.
    pub fn merge_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> QForgeResult<()> {
        // Optimizer
        if let Some(v) = lookup("QFORGE_STAGES") {
            let names: Vec<&str> = v.split(',').filter(|s| !s.trim().is_empty()).collect();
            self.optimizer.enabled_stages = OptimizationStage::parse_list(&names[..])?;
        }
        if let Some(v) = lookup("QFORGE_MITIGATION_THRESHOLD") {
            self.optimizer.mitigation_error_threshold = parse_var("QFORGE_MITIGATION_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("QFORGE_MERGE_TOLERANCE") {
            self.optimizer.merge_tolerance = parse_var("QFORGE_MERGE_TOLERANCE", &v)?;
        }

        // Recovery
        if let Some(v) = lookup("QFORGE_JITTER_MS") {
            self.recovery.jitter_ms = parse_var("QFORGE_JITTER_MS", &v)?;
        }

        // Scheduler
        if let Some(v) = lookup("QFORGE_POLL_INTERVAL_MS") {
            self.scheduler.poll_interval_ms = parse_var("QFORGE_POLL_INTERVAL_MS", &v)?;
        }
        if let Some(v) = lookup("QFORGE_DEFAULT_STRATEGY") {
            self.scheduler.default_strategy = v;
        }
        if let Some(v) = lookup("QFORGE_OPTIONAL_DEPENDENCY_PENALTY") {
            self.scheduler.optional_dependency_penalty =
                parse_var("QFORGE_OPTIONAL_DEPENDENCY_PENALTY", &v)?;
        }

        // Logging
        if let Some(v) = lookup("QFORGE_LOG_FORMAT") {
            self.tracing.format = TracingFormat::parse_lossy(&v);
        }
        if let Some(v) = lookup("QFORGE_LOG") {
            self.tracing.filter = v;
        }

        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> QForgeResult<()> {
        self.optimizer.validate()?;

        if self.scheduler.poll_interval_ms == 0 {
            return Err(QForgeError::Config(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if !BuiltinStrategy::ALL
            .iter()
            .any(|s| s.as_str() == self.scheduler.default_strategy)
        {
            return Err(QForgeError::Config(format!(
                "Unknown default strategy: {}",
                self.scheduler.default_strategy
            )));
        }
        let penalty = self.scheduler.optional_dependency_penalty;
        if !(penalty.is_finite() && penalty >= 0.0) {
            return Err(QForgeError::Config(format!(
                "optional_dependency_penalty must be a non-negative number, got {penalty}"
            )));
        }
        for (provider, limits) in &self.scheduler.limits {
            limits.validate(provider)?;
        }

        // Unknown names and contradictory values both surface here.
        self.recovery.strategy_registry()?;

        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> QForgeResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| QForgeError::Config(format!("Invalid value for {key}: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = QForgeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler.default_strategy, "fifo");
        assert_eq!(config.scheduler.poll_interval_ms, 100);
        assert_eq!(config.recovery.jitter_ms, 100);
        assert_eq!(config.optimizer.enabled_stages.len(), 7);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r"
scheduler:
  default_strategy: priority
  limits:
    B:
      max_concurrent_jobs: 2
      max_qubits: 127
      max_depth: 500
      max_submissions_per_hour: 10
      max_wait_time_secs: 60
recovery:
  strategies:
    network-timeout:
      max_retries: 5
";
        let config = QForgeConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.scheduler.default_strategy, "priority");
        assert_eq!(config.scheduler.poll_interval_ms, 100);
        assert_eq!(config.scheduler.limits["B"].max_depth, 500);
        assert_eq!(config.tracing, TracingConfig::default());

        let registry = config.recovery.strategy_registry().unwrap();
        assert_eq!(registry.get("network-timeout").unwrap().max_retries, 5);
        assert_eq!(registry.get("provider-failure").unwrap().max_retries, 2);
    }

    #[test]
    fn test_unknown_stage_rejected() {
        let yaml = "optimizer:\n  enabled_stages: [gate-cancellation, teleportation]\n";
        assert!(matches!(
            QForgeConfig::from_yaml(yaml),
            Err(QForgeError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = QForgeConfig::default();
        config.scheduler.default_strategy = "random".into();
        assert!(matches!(config.validate(), Err(QForgeError::Config(_))));

        let mut config = QForgeConfig::default();
        config.optimizer.mitigation_error_threshold = -0.1;
        assert!(matches!(config.validate(), Err(QForgeError::Compile(_))));

        let mut config = QForgeConfig::default();
        config.scheduler.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = QForgeConfig::default();
        config.scheduler.limits.insert(
            "A".into(),
            ProviderLimits {
                max_concurrent_jobs: 0,
                max_qubits: 32,
                max_depth: 10,
                max_submissions_per_hour: 10,
                max_wait_time_secs: 10,
            },
        );
        assert!(matches!(config.validate(), Err(QForgeError::Sched(_))));

        let mut config = QForgeConfig::default();
        config
            .recovery
            .strategies
            .insert("bogus".into(), StrategyOverride::default());
        assert!(matches!(config.validate(), Err(QForgeError::Config(_))));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = QForgeConfig::default();
        config
            .merge_env(env(&[
                ("QFORGE_STAGES", "transpilation, gate_cancellation"),
                ("QFORGE_POLL_INTERVAL_MS", "25"),
                ("QFORGE_DEFAULT_STRATEGY", "fair-share"),
                ("QFORGE_LOG_FORMAT", "json"),
            ]))
            .unwrap();
        assert_eq!(
            config.optimizer.enabled_stages,
            vec![
                OptimizationStage::Transpilation,
                OptimizationStage::GateCancellation
            ]
        );
        assert_eq!(config.scheduler.poll_interval_ms, 25);
        assert_eq!(config.scheduler.default_strategy, "fair-share");
        assert_eq!(config.tracing.format, TracingFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_env_value() {
        let mut config = QForgeConfig::default();
        let err = config
            .merge_env(env(&[("QFORGE_JITTER_MS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("QFORGE_JITTER_MS"));

        let err = config
            .merge_env(env(&[("QFORGE_STAGES", "teleportation")]))
            .unwrap_err();
        assert!(matches!(err, QForgeError::Compile(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qforge.yaml");
        std::fs::write(&path, "scheduler:\n  poll_interval_ms: 50\n").unwrap();
        let config = QForgeConfig::from_file(&path).unwrap();
        assert_eq!(config.scheduler.poll_interval_ms, 50);

        let missing = dir.path().join("missing.yaml");
        assert!(matches!(
            QForgeConfig::from_file(&missing),
            Err(QForgeError::ConfigIo { .. })
        ));
    }
}
