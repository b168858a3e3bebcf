//! Error types for the stagechain framework.
//!
//! Every failure a pipeline can surface is a variant of [`StagechainError`].
//! Stage failures are wrapped in [`StagechainError::StageFailure`] carrying
//! the failing stage's name and position, so callers always learn exactly
//! which stage failed and why.

use serde_json::json;
use std::collections::HashMap;
use thiserror::Error;

/// Convenience result alias used throughout the crate.
pub type Result<T, E = StagechainError> = std::result::Result<T, E>;

/// The main error type for stagechain operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StagechainError {
    /// A stage received malformed input.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// The caller could not be authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The caller exceeded a rate limit.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// No factory is registered under the requested name.
    #[error("Unknown stage name '{0}'")]
    UnknownStageName(String),

    /// A factory is already registered under this name.
    #[error("Stage name '{0}' is already registered")]
    DuplicateStageName(String),

    /// A stage returned a failure while the pipeline was executing.
    #[error("Stage '{name}' at index {index} failed: {cause}")]
    StageFailure {
        /// Name of the failing stage.
        name: String,
        /// Zero-based position of the failing stage.
        index: usize,
        /// The error the stage produced.
        cause: Box<StagechainError>,
    },

    /// The execution deadline expired.
    #[error("Pipeline '{pipeline}' timed out after {timeout_ms}ms")]
    Timeout {
        /// The pipeline that timed out.
        pipeline: String,
        /// The stage that was in flight when the deadline expired.
        stage: Option<String>,
        /// The configured deadline in milliseconds.
        timeout_ms: u64,
    },

    /// The execution was cancelled by its caller.
    #[error("Pipeline '{pipeline}' cancelled: {reason}")]
    Cancelled {
        /// The pipeline that was cancelled.
        pipeline: String,
        /// The cancellation reason.
        reason: String,
    },

    /// A stage was appended after the pipeline was frozen.
    #[error("Pipeline '{pipeline}' is frozen; stages can no longer be appended")]
    PipelineFrozen {
        /// The frozen pipeline.
        pipeline: String,
    },

    /// A pipeline was executed before being frozen.
    #[error("Pipeline '{pipeline}' must be frozen before it can execute")]
    PipelineNotFrozen {
        /// The pipeline still being built.
        pipeline: String,
    },

    /// A stage factory rejected its configuration.
    #[error("Invalid configuration for stage '{stage}': {message}")]
    InvalidConfig {
        /// The stage being constructed.
        stage: String,
        /// What was wrong with the configuration.
        message: String,
    },

    /// The logging subsystem could not be initialized.
    #[error("Logging initialization failed: {0}")]
    LoggingInit(String),

    /// An unexpected internal condition, such as a panicking stage.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StagechainError {
    /// Wraps `cause` as the failure of the stage `name` at position `index`.
    #[must_use]
    pub fn stage_failure(name: impl Into<String>, index: usize, cause: Self) -> Self {
        Self::StageFailure {
            name: name.into(),
            index,
            cause: Box::new(cause),
        }
    }

    /// Creates an invalid-configuration error.
    #[must_use]
    pub fn invalid_config(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Returns the stable machine-readable code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ValidationFailed(_) => "VALIDATION_FAILED",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::RateLimited(_) => "RATE_LIMITED",
            Self::UnknownStageName(_) => "UNKNOWN_STAGE_NAME",
            Self::DuplicateStageName(_) => "DUPLICATE_STAGE_NAME",
            Self::StageFailure { .. } => "STAGE_FAILURE",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Cancelled { .. } => "CANCELLED",
            Self::PipelineFrozen { .. } => "PIPELINE_FROZEN",
            Self::PipelineNotFrozen { .. } => "PIPELINE_NOT_FROZEN",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::LoggingInit(_) => "LOGGING_INIT",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Returns the HTTP-style status a transport should map this error to.
    ///
    /// Stage failures map to the status of their root cause.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self.root_cause() {
            Self::ValidationFailed(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::RateLimited(_) => 429,
            Self::Timeout { .. } => 504,
            Self::Cancelled { .. } => 499,
            _ => 500,
        }
    }

    /// Returns the name and index of the outermost failing stage, if any.
    #[must_use]
    pub fn failing_stage(&self) -> Option<(&str, usize)> {
        match self {
            Self::StageFailure { name, index, .. } => Some((name.as_str(), *index)),
            _ => None,
        }
    }

    /// Follows nested stage failures down to the original error.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        let mut current = self;
        while let Self::StageFailure { cause, .. } = current {
            current = cause;
        }
        current
    }

    /// Returns the stage path from the outermost pipeline to the root cause.
    ///
    /// A failure inside a nested pipeline yields one entry per level.
    #[must_use]
    pub fn stage_path(&self) -> Vec<(&str, usize)> {
        let mut path = Vec::new();
        let mut current = self;
        while let Self::StageFailure { name, index, cause } = current {
            path.push((name.as_str(), *index));
            current = cause;
        }
        path
    }

    /// Returns true for deadline expiry.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns true for caller-initiated cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Returns true for errors raised while building pipelines or stages.
    #[must_use]
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownStageName(_)
                | Self::DuplicateStageName(_)
                | Self::PipelineFrozen { .. }
                | Self::InvalidConfig { .. }
        )
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), json!(self.code()));
        map.insert("message".to_string(), json!(self.to_string()));

        match self {
            Self::StageFailure { name, index, cause } => {
                map.insert("stage".to_string(), json!(name));
                map.insert("index".to_string(), json!(index));
                let cause_map: serde_json::Map<String, serde_json::Value> =
                    cause.to_dict().into_iter().collect();
                map.insert("cause".to_string(), serde_json::Value::Object(cause_map));
            }
            Self::Timeout {
                pipeline,
                stage,
                timeout_ms,
            } => {
                map.insert("pipeline".to_string(), json!(pipeline));
                if let Some(stage) = stage {
                    map.insert("stage".to_string(), json!(stage));
                }
                map.insert("timeout_ms".to_string(), json!(timeout_ms));
            }
            Self::Cancelled { pipeline, reason } => {
                map.insert("pipeline".to_string(), json!(pipeline));
                map.insert("reason".to_string(), json!(reason));
            }
            _ => {}
        }

        map
    }
}
