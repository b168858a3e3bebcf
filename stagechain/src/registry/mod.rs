//! Runtime stage registry.
//!
//! Maps stage names to factories so pipelines can be assembled from
//! configuration at runtime. The table sits behind a read-mostly lock:
//! lookups take a shared lock, and registration after startup is safe.

pub mod builtin;

use crate::config::StageConfig;
use crate::errors::{Result, StagechainError};
use crate::pipeline::Pipeline;
use crate::stages::Stage;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Factory function building a stage from its configuration.
pub type StageFactory = Arc<dyn Fn(&StageConfig) -> Result<Arc<dyn Stage>> + Send + Sync>;

/// One entry of a pipeline description: a registered name plus its config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    /// Registered factory name.
    pub name: String,
    /// Configuration passed to the factory.
    #[serde(default)]
    pub config: StageConfig,
}

impl StageSpec {
    /// Creates a spec with an empty configuration.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: StageConfig::empty(),
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: impl Into<StageConfig>) -> Self {
        self.config = config.into();
        self
    }
}

/// Registry of named stage factories.
#[derive(Default)]
pub struct StageRegistry {
    factories: RwLock<HashMap<String, StageFactory>>,
}

impl StageRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `name`.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateStageName` if `name` is already registered. The
    /// existing factory is left in place.
    pub fn register<F>(&self, name: impl Into<String>, factory: F) -> Result<()>
    where
        F: Fn(&StageConfig) -> Result<Arc<dyn Stage>> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut factories = self.factories.write();
        if factories.contains_key(&name) {
            return Err(StagechainError::DuplicateStageName(name));
        }
        debug!(stage = %name, "Registered stage factory");
        factories.insert(name, Arc::new(factory));
        Ok(())
    }

    /// Builds a new stage from the factory registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownStageName` if nothing is registered under `name`;
    /// factory errors propagate unchanged.
    pub fn instantiate(&self, name: &str, config: &StageConfig) -> Result<Arc<dyn Stage>> {
        // Clone the factory out so it runs without holding the lock.
        let factory = self
            .factories
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StagechainError::UnknownStageName(name.to_string()))?;
        factory(config)
    }

    /// Builds a frozen pipeline from `specs`, in order.
    ///
    /// # Errors
    ///
    /// Returns the error of the first spec that fails to instantiate.
    pub fn assemble(&self, pipeline_name: impl Into<String>, specs: &[StageSpec]) -> Result<Pipeline> {
        let mut pipeline = Pipeline::new(pipeline_name);
        for spec in specs {
            pipeline.add_stage(self.instantiate(&spec.name, &spec.config)?)?;
        }
        Ok(pipeline.freeze())
    }

    /// Returns true if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.read().contains_key(name)
    }

    /// Returns the registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the number of registered factories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.read().len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.read().is_empty()
    }
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRegistry")
            .field("names", &self.names())
            .finish()
    }
}
