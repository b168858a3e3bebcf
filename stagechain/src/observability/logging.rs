//! Structured logging setup.
//!
//! The engine and the built-in stages log through `tracing` with structured
//! `pipeline`, `stage` and `request_id` fields. Applications that do not
//! install their own subscriber can call [`init_logging`] once at startup.
//!
//! ```rust,ignore
//! use stagechain::observability::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development())?;
//! ```

use crate::errors::{Result, StagechainError};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,
    /// Filter directive (e.g. `info`, `stagechain=debug,warn`).
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json_format: bool,
    /// Log span open and close events.
    pub span_events: bool,
    /// Include file and line information.
    pub file_line_info: bool,
    /// Include the module path of each event.
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl LogConfig {
    /// Human-readable output at debug level.
    #[must_use]
    pub fn development() -> Self {
        Self {
            enabled: true,
            level: "debug".to_string(),
            json_format: false,
            span_events: true,
            file_line_info: true,
            include_target: true,
        }
    }

    /// JSON output at info level.
    #[must_use]
    pub fn production() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json_format: true,
            span_events: false,
            file_line_info: false,
            include_target: true,
        }
    }

    /// Sets the filter directive.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }
}

/// Installs a global `tracing` subscriber built from `config`.
///
/// # Errors
///
/// Returns `LoggingInit` if the filter directive is invalid or a global
/// subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = create_env_filter(&config.level)?;

    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_span_events(span_events)
        .with_file(config.file_line_info)
        .with_line_number(config.file_line_info)
        .with_target(config.include_target);

    let result = if config.json_format {
        tracing_subscriber::registry()
            .with(fmt_layer.json().with_filter(filter))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(fmt_layer.pretty().with_filter(filter))
            .try_init()
    };

    result.map_err(|e| StagechainError::LoggingInit(e.to_string()))
}

/// Parses a filter directive.
///
/// # Errors
///
/// Returns `LoggingInit` if the directive is invalid.
pub fn create_env_filter(filter: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(filter)
        .map_err(|e| StagechainError::LoggingInit(format!("Invalid log level: {e}")))
}
