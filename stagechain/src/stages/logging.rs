//! Request logging stage.

use super::Stage;
use crate::core::{Outcome, Request, StageKind};
use crate::errors::{Result, StagechainError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info, trace, Level};

/// Configuration for [`LoggingStage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level name (`trace`, `debug`, `info`).
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

/// A stage that logs every request it sees and always continues.
#[derive(Debug, Clone)]
pub struct LoggingStage {
    name: String,
    level: Level,
}

impl Default for LoggingStage {
    fn default() -> Self {
        Self {
            name: "logging".to_string(),
            level: Level::INFO,
        }
    }
}

impl LoggingStage {
    /// Creates an info-level logging stage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a logging stage from configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the level name is not recognized.
    pub fn from_config(config: &LoggingConfig) -> Result<Self> {
        let level = Level::from_str(&config.level).map_err(|_| {
            StagechainError::invalid_config(
                "logging",
                format!("unknown log level '{}'", config.level),
            )
        })?;
        Ok(Self::new().with_level(level))
    }

    /// Sets the stage name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the level requests are logged at.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Returns the configured level.
    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    fn log_request(&self, request: &Request) {
        let request_id = request.id();
        let header_count = request.headers().len();
        let body_len = request.body_len();

        match self.level {
            Level::TRACE => trace!(
                stage = %self.name,
                %request_id,
                method = request.method(),
                path = request.path(),
                header_count,
                body_len,
                "Request received"
            ),
            Level::DEBUG => debug!(
                stage = %self.name,
                %request_id,
                method = request.method(),
                path = request.path(),
                header_count,
                body_len,
                "Request received"
            ),
            _ => info!(
                stage = %self.name,
                %request_id,
                method = request.method(),
                path = request.path(),
                header_count,
                body_len,
                "Request received"
            ),
        }
    }
}

#[async_trait]
impl Stage for LoggingStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Observe
    }

    async fn process(&self, request: Request) -> Outcome {
        self.log_request(&request);
        Outcome::Continue(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_logging_stage_continues_unchanged() {
        let stage = LoggingStage::new();
        let request = Request::new("/health").with_header("x-a", "1");

        let outcome = stage.process(request.clone()).await;
        assert_eq!(outcome, Outcome::Continue(request));
    }

    #[test]
    fn test_from_config() {
        let stage = LoggingStage::from_config(&LoggingConfig {
            level: "debug".to_string(),
        })
        .unwrap();
        assert_eq!(stage.level(), Level::DEBUG);
        assert_eq!(stage.kind(), StageKind::Observe);
    }

    #[test]
    fn test_from_config_rejects_unknown_level() {
        let err = LoggingStage::from_config(&LoggingConfig {
            level: "loud".to_string(),
        })
        .unwrap_err();
        assert_eq!(err.code(), "INVALID_CONFIG");
    }
}
