//! Factories for the stages shipped with the crate.
//!
//! Every built-in factory accepts an optional `"name"` key overriding the
//! stage name, so one pipeline can hold several instances of a kind.

use super::StageRegistry;
use crate::config::StageConfig;
use crate::errors::Result;
use crate::stages::{
    AuthConfig, AuthStage, LoggingConfig, LoggingStage, NoOpStage, RateLimitConfig, RateLimiter,
    RequestValidator, Stage, ValidationConfig,
};
use std::sync::Arc;
use tracing::debug;

/// Registered name of [`LoggingStage`].
pub const LOGGING: &str = "logging";
/// Registered name of [`RateLimiter`].
pub const RATE_LIMIT: &str = "ratelimit";
/// Registered name of [`AuthStage`].
pub const AUTH: &str = "auth";
/// Registered name of [`RequestValidator`].
pub const VALIDATE: &str = "validate";
/// Registered name of [`NoOpStage`].
pub const NOOP: &str = "noop";

fn stage_name<'a>(config: &'a StageConfig, default: &'a str) -> &'a str {
    config.get_str("name").unwrap_or(default)
}

fn logging(config: &StageConfig) -> Result<Arc<dyn Stage>> {
    let parsed: LoggingConfig = config.parse(LOGGING)?;
    let stage = LoggingStage::from_config(&parsed)?.with_name(stage_name(config, LOGGING));
    Ok(Arc::new(stage))
}

fn rate_limit(config: &StageConfig) -> Result<Arc<dyn Stage>> {
    let parsed: RateLimitConfig = config.parse(RATE_LIMIT)?;
    let stage = RateLimiter::from_config(&parsed).with_name(stage_name(config, RATE_LIMIT));
    Ok(Arc::new(stage))
}

fn auth(config: &StageConfig) -> Result<Arc<dyn Stage>> {
    let parsed: AuthConfig = config.parse(AUTH)?;
    let stage = AuthStage::from_config(&parsed).with_name(stage_name(config, AUTH));
    Ok(Arc::new(stage))
}

fn validate(config: &StageConfig) -> Result<Arc<dyn Stage>> {
    let parsed: ValidationConfig = config.parse(VALIDATE)?;
    let stage = RequestValidator::new(&parsed)?.with_name(stage_name(config, VALIDATE));
    Ok(Arc::new(stage))
}

fn noop(config: &StageConfig) -> Result<Arc<dyn Stage>> {
    Ok(Arc::new(NoOpStage::new(stage_name(config, NOOP))))
}

impl StageRegistry {
    /// Creates a registry preloaded with the built-in stages:
    /// `logging`, `ratelimit`, `auth`, `validate` and `noop`.
    #[must_use]
    pub fn with_builtin_stages() -> Self {
        let registry = Self::new();
        registry.register_builtin_stages();
        registry
    }

    /// Registers every built-in stage whose name is still free.
    pub fn register_builtin_stages(&self) {
        let builtins: [(&str, fn(&StageConfig) -> Result<Arc<dyn Stage>>); 5] = [
            (LOGGING, logging),
            (RATE_LIMIT, rate_limit),
            (AUTH, auth),
            (VALIDATE, validate),
            (NOOP, noop),
        ];
        for (name, factory) in builtins {
            if self.contains(name) {
                continue;
            }
            if let Err(e) = self.register(name, factory) {
                debug!(stage = name, error = %e, "Skipped built-in stage factory");
            }
        }
    }
}
