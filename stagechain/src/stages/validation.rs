//! Request shape validation stage.
//!
//! Malformed requests are a stage failure, not a short-circuit: the
//! pipeline aborts with `ValidationFailed` annotated with this stage's
//! position.

use super::Stage;
use crate::core::{Outcome, Request, StageKind};
use crate::errors::{Result, StagechainError};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Configuration for [`RequestValidator`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Headers every request must carry.
    #[serde(default)]
    pub required_headers: Vec<String>,
    /// Regular expression the whole path must match.
    #[serde(default)]
    pub path_pattern: Option<String>,
    /// Maximum body size in bytes.
    #[serde(default)]
    pub max_body_bytes: Option<usize>,
    /// Accepted methods. Empty accepts any method.
    #[serde(default)]
    pub allowed_methods: Vec<String>,
}

/// Stage that fails requests whose shape violates its configuration.
#[derive(Debug, Clone)]
pub struct RequestValidator {
    name: String,
    required_headers: Vec<String>,
    path_pattern: Option<Regex>,
    max_body_bytes: Option<usize>,
    allowed_methods: Vec<String>,
}

impl RequestValidator {
    /// Creates a validator from configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `path_pattern` is not a valid regex.
    pub fn new(config: &ValidationConfig) -> Result<Self> {
        let path_pattern = config
            .path_pattern
            .as_deref()
            .map(|pattern| Regex::new(&format!("^(?:{pattern})$")))
            .transpose()
            .map_err(|e| StagechainError::invalid_config("validate", e.to_string()))?;

        Ok(Self {
            name: "validate".to_string(),
            required_headers: config
                .required_headers
                .iter()
                .map(|h| h.to_ascii_lowercase())
                .collect(),
            path_pattern,
            max_body_bytes: config.max_body_bytes,
            allowed_methods: config
                .allowed_methods
                .iter()
                .map(|m| m.to_ascii_uppercase())
                .collect(),
        })
    }

    /// Sets the stage name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn check(&self, request: &Request) -> Result<()> {
        if !request.path().starts_with('/') {
            return Err(StagechainError::ValidationFailed(format!(
                "path '{}' must start with '/'",
                request.path()
            )));
        }

        if !self.allowed_methods.is_empty()
            && !self.allowed_methods.iter().any(|m| m == request.method())
        {
            return Err(StagechainError::ValidationFailed(format!(
                "method '{}' is not allowed",
                request.method()
            )));
        }

        if let Some(missing) = self
            .required_headers
            .iter()
            .find(|h| request.header(h).is_none())
        {
            return Err(StagechainError::ValidationFailed(format!(
                "missing required header '{missing}'"
            )));
        }

        if let Some(pattern) = &self.path_pattern {
            if !pattern.is_match(request.path()) {
                return Err(StagechainError::ValidationFailed(format!(
                    "path '{}' does not match '{}'",
                    request.path(),
                    pattern.as_str()
                )));
            }
        }

        if let Some(max) = self.max_body_bytes {
            if request.body_len() > max {
                return Err(StagechainError::ValidationFailed(format!(
                    "body of {} bytes exceeds limit of {max}",
                    request.body_len()
                )));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Stage for RequestValidator {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Guard
    }

    async fn process(&self, request: Request) -> Outcome {
        match self.check(&request) {
            Ok(()) => Outcome::Continue(request),
            Err(err) => Outcome::Fail(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator(config: serde_json::Value) -> RequestValidator {
        RequestValidator::new(&serde_json::from_value(config).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_default_accepts_well_formed_request() {
        let stage = validator(serde_json::json!({}));
        assert!(stage.process(Request::new("/ok")).await.is_continue());
    }

    #[tokio::test]
    async fn test_relative_path_fails() {
        let stage = validator(serde_json::json!({}));
        let outcome = stage.process(Request::new("relative")).await;
        assert!(matches!(
            outcome.error(),
            Some(StagechainError::ValidationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_required_header() {
        let stage = validator(serde_json::json!({"required_headers": ["X-Tenant"]}));

        assert!(stage.process(Request::new("/")).await.is_failure());
        assert!(stage
            .process(Request::new("/").with_header("x-tenant", "acme"))
            .await
            .is_continue());
    }

    #[tokio::test]
    async fn test_path_pattern_is_anchored() {
        let stage = validator(serde_json::json!({"path_pattern": "/api/v[0-9]+/.*"}));

        assert!(stage.process(Request::new("/api/v1/users")).await.is_continue());
        assert!(stage.process(Request::new("/static/api/v1/x")).await.is_failure());
    }

    #[tokio::test]
    async fn test_body_limit() {
        let stage = validator(serde_json::json!({"max_body_bytes": 4}));

        assert!(stage
            .process(Request::new("/").with_body("1234"))
            .await
            .is_continue());
        assert!(stage
            .process(Request::new("/").with_body("12345"))
            .await
            .is_failure());
    }

    #[tokio::test]
    async fn test_allowed_methods() {
        let stage = validator(serde_json::json!({"allowed_methods": ["get", "post"]}));

        assert!(stage
            .process(Request::new("/").with_method("POST"))
            .await
            .is_continue());
        assert!(stage
            .process(Request::new("/").with_method("DELETE"))
            .await
            .is_failure());
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let err = RequestValidator::new(&ValidationConfig {
            path_pattern: Some("([".to_string()),
            ..ValidationConfig::default()
        })
        .unwrap_err();
        assert!(err.is_construction_error());
    }
}
