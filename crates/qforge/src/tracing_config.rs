//! Tracing setup.
//!
//! Two output formats are supported:
//! - console output (development)
//! - JSON structured logging (production)

use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::error::{QForgeError, QForgeResult};

/// Filter used when neither the config nor `RUST_LOG` names one.
pub const DEFAULT_FILTER: &str = "qforge=info";

/// Tracing output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TracingFormat {
    /// Human-readable console output.
    #[default]
    Console,
    /// JSON structured logging.
    Json,
}

impl TracingFormat {
    /// Parse `console` or `json`; anything else is console.
    pub fn parse_lossy(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => TracingFormat::Json,
            _ => TracingFormat::Console,
        }
    }
}

/// Tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracingConfig {
    /// Output format.
    #[serde(default)]
    pub format: TracingFormat,
    /// `EnvFilter` directives, e.g. `qforge=debug,qforge_sched=trace`.
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    DEFAULT_FILTER.to_string()
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            format: TracingFormat::Console,
            filter: default_filter(),
        }
    }
}

impl TracingConfig {
    /// Create a config with the given format and filter.
    pub fn new(format: TracingFormat, filter: impl Into<String>) -> Self {
        Self {
            format,
            filter: filter.into(),
        }
    }

    /// Create config from environment variables.
    ///
    /// - `RUST_LOG`: filter directives (default: `qforge=info`)
    /// - `QFORGE_LOG_FORMAT`: `console` or `json` (default: `console`)
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    pub(crate) fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(filter) = lookup("RUST_LOG") {
            self.filter = filter;
        }
        if let Some(format) = lookup("QFORGE_LOG_FORMAT") {
            self.format = TracingFormat::parse_lossy(&format);
        }
        self
    }
}

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed or the filter does not parse.
pub fn init_tracing(config: &TracingConfig) -> QForgeResult<()> {
    let env_filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| QForgeError::Tracing(format!("invalid filter '{}': {e}", config.filter)))?;

    let fmt_layer = match config.format {
        TracingFormat::Console => fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_writer(std::io::stderr)
            .boxed(),
        TracingFormat::Json => fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .json()
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| QForgeError::Tracing(e.to_string()))?;

    tracing::debug!(format = ?config.format, filter = %config.filter, "Tracing initialized");
    Ok(())
}

/// Install the global subscriber configured from the environment.
pub fn init_default_tracing() -> QForgeResult<()> {
    init_tracing(&TracingConfig::from_env())
}
