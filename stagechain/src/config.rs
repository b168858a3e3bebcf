//! Stage configuration values.
//!
//! Factories in the [`StageRegistry`](crate::registry::StageRegistry)
//! receive a [`StageConfig`], an untyped JSON document, and parse it into
//! their own typed configuration struct.

use crate::errors::{Result, StagechainError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Configuration handed to a stage factory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageConfig(Value);

impl StageConfig {
    /// Wraps a JSON value.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Returns an empty configuration.
    #[must_use]
    pub fn empty() -> Self {
        Self(Value::Object(serde_json::Map::new()))
    }

    /// Parses the configuration into `T`.
    ///
    /// A null configuration is treated as an empty object, so structs whose
    /// fields all have defaults parse from nothing.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming `stage` if the value does not match `T`.
    pub fn parse<T: DeserializeOwned>(&self, stage: &str) -> Result<T> {
        let value = match &self.0 {
            Value::Null => Value::Object(serde_json::Map::new()),
            other => other.clone(),
        };
        serde_json::from_value(value).map_err(|e| StagechainError::invalid_config(stage, e.to_string()))
    }

    /// Returns a string field.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Returns an unsigned integer field.
    #[must_use]
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    /// Returns the underlying JSON value.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for StageConfig {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
