//! Logging configuration and setup.
//!
//! Scaled down from a richer ancestor: this system has no log-file
//! rotation or request-scoped context to carry, just the scheduler's
//! `tracing` events (spec §6, "a flag to enable verbose scheduler
//! logging") going to stdout or stderr in one of a few formats.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{
    fmt::{self},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::error::{TelemetryError, TelemetryResult};

fn init_err<E: std::fmt::Display>(e: E) -> TelemetryError {
    TelemetryError::InitError(e.to_string())
}

/// Log format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, multi-line format (default).
    #[default]
    Pretty,
    /// Compact single-line format.
    Compact,
    /// JSON format for structured log ingestion.
    Json,
}

/// Log output target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    /// Log to stdout.
    Stdout,
    /// Log to stderr (default).
    #[default]
    Stderr,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level filter (e.g. `"info"`, `"debug"`, `"chorus_dispatch=trace"`).
    #[serde(default = "default_level")]
    pub level: String,
    /// Log format.
    #[serde(default)]
    pub format: LogFormat,
    /// Log target.
    #[serde(default)]
    pub target: LogTarget,
    /// Whether to include timestamps.
    #[serde(default = "default_true")]
    pub timestamps: bool,
    /// Whether to use ANSI colors.
    #[serde(default = "default_true")]
    pub ansi: bool,
    /// Additional per-module directive overrides (e.g. `chorus_dispatch=debug`).
    #[serde(default)]
    pub directives: Vec<String>,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            target: LogTarget::default(),
            timestamps: true,
            ansi: true,
            directives: Vec::new(),
        }
    }
}

impl LogConfig {
    /// Create a new log config with the given base level.
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    /// The verbose preset used when `CHORUS_VERBOSE` is set (spec §6):
    /// debug level, always including the high-frequency scheduler
    /// events that are otherwise suppressed.
    #[must_use]
    pub fn verbose() -> Self {
        Self::new("debug")
    }

    /// Set the log format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the log target.
    #[must_use]
    pub fn with_target(mut self, target: LogTarget) -> Self {
        self.target = target;
        self
    }

    /// Add a directive override.
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// Disable ANSI colors (useful when output is redirected to a file).
    #[must_use]
    pub fn without_ansi(mut self) -> Self {
        self.ansi = false;
        self
    }

    fn build_filter(&self) -> TelemetryResult<EnvFilter> {
        let mut filter =
            EnvFilter::try_new(&self.level).map_err(|e| TelemetryError::ConfigError(e.to_string()))?;
        for directive in &self.directives {
            filter = filter.add_directive(
                directive
                    .parse()
                    .map_err(|e: tracing_subscriber::filter::ParseError| {
                        TelemetryError::ConfigError(e.to_string())
                    })?,
            );
        }
        Ok(filter)
    }
}

/// Install the global `tracing` subscriber for the given configuration.
///
/// # Errors
///
/// Returns [`TelemetryError::ConfigError`] for an invalid level/directive,
/// or [`TelemetryError::InitError`] if a subscriber is already installed.
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = config.build_filter()?;

    macro_rules! init_with_writer {
        ($writer:expr) => {
            match config.format {
                LogFormat::Json => {
                    let layer = fmt::layer().json().with_writer($writer);
                    tracing_subscriber::registry().with(filter).with(layer).try_init().map_err(init_err)
                }
                LogFormat::Pretty => {
                    let layer = fmt::layer()
                        .pretty()
                        .with_writer($writer)
                        .with_ansi(config.ansi);
                    tracing_subscriber::registry().with(filter).with(layer).try_init().map_err(init_err)
                }
                LogFormat::Compact => {
                    let layer = fmt::layer()
                        .compact()
                        .with_writer($writer)
                        .with_ansi(config.ansi);
                    tracing_subscriber::registry().with(filter).with(layer).try_init().map_err(init_err)
                }
            }
        };
    }

    match config.target {
        LogTarget::Stdout => init_with_writer!(std::io::stdout),
        LogTarget::Stderr => init_with_writer!(std::io::stderr),
    }
}

/// Set up default logging (info level, stderr, pretty format).
///
/// # Errors
///
/// Returns an error if a subscriber is already installed.
pub fn setup_default_logging() -> TelemetryResult<()> {
    setup_logging(&LogConfig::default())
}
