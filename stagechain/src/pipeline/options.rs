//! Per-pipeline execution options.

use std::time::Duration;

/// Defaults applied by [`Pipeline::execute`](super::Pipeline::execute).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Deadline for a whole execution. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Convert stage panics into `StageFailure { cause: Internal }`.
    pub catch_panics: bool,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            catch_panics: true,
        }
    }
}

impl ExecutionOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the execution deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Enables or disables panic catching at the stage boundary.
    #[must_use]
    pub fn with_catch_panics(mut self, catch_panics: bool) -> Self {
        self.catch_panics = catch_panics;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ExecutionOptions::new();
        assert!(options.timeout.is_none());
        assert!(options.catch_panics);
    }

    #[test]
    fn test_builders() {
        let options = ExecutionOptions::new()
            .with_timeout(Duration::from_millis(250))
            .with_catch_panics(false);
        assert_eq!(options.timeout, Some(Duration::from_millis(250)));
        assert!(!options.catch_panics);
    }
}
