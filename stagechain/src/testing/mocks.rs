//! Scripted stages for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::core::{Outcome, Request, Response};
use crate::errors::StagechainError;
use crate::stages::Stage;

/// Header [`TaggingStage`] appends stage names to.
pub const TRAIL_HEADER: &str = "x-stage-trail";

/// A stage that counts its invocations and continues.
#[derive(Debug)]
pub struct CountingStage {
    name: String,
    calls: AtomicUsize,
}

impl CountingStage {
    /// Creates a new counting stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns the number of times the stage was invoked.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stage for CountingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, request: Request) -> Outcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Outcome::Continue(request)
    }
}

/// A stage that always fails.
#[derive(Debug)]
pub struct FailingStage {
    name: String,
    error: StagechainError,
    calls: AtomicUsize,
}

impl FailingStage {
    /// Creates a stage failing with an internal error.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let error = StagechainError::Internal(format!("{name} failed"));
        Self::with_error(name, error)
    }

    /// Creates a stage failing with `error`.
    #[must_use]
    pub fn with_error(name: impl Into<String>, error: StagechainError) -> Self {
        Self {
            name: name.into(),
            error,
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns the number of times the stage was invoked.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stage for FailingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, _request: Request) -> Outcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Outcome::Fail(self.error.clone())
    }
}

/// A stage that always answers with a fixed status.
#[derive(Debug)]
pub struct ShortCircuitStage {
    name: String,
    status: u16,
}

impl ShortCircuitStage {
    /// Creates a stage responding with `status`.
    #[must_use]
    pub fn new(name: impl Into<String>, status: u16) -> Self {
        Self {
            name: name.into(),
            status,
        }
    }
}

#[async_trait]
impl Stage for ShortCircuitStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, _request: Request) -> Outcome {
        Outcome::ShortCircuit(Response::with_status(self.status))
    }
}

/// A stage that sleeps before continuing.
#[derive(Debug)]
pub struct SlowStage {
    name: String,
    delay: Duration,
}

impl SlowStage {
    /// Creates a new slow stage.
    #[must_use]
    pub fn new(name: impl Into<String>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            delay,
        }
    }

    /// Creates a slow stage with delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(name: impl Into<String>, ms: u64) -> Self {
        Self::new(name, Duration::from_millis(ms))
    }
}

#[async_trait]
impl Stage for SlowStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, request: Request) -> Outcome {
        tokio::time::sleep(self.delay).await;
        Outcome::Continue(request)
    }
}

/// A stage that panics. Used to exercise panic containment.
#[derive(Debug)]
pub struct PanickingStage {
    name: String,
}

impl PanickingStage {
    /// Creates a new panicking stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Stage for PanickingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, _request: Request) -> Outcome {
        panic!("stage '{}' panicked on purpose", self.name)
    }
}

/// A stage that appends its name to [`TRAIL_HEADER`] and continues.
#[derive(Debug)]
pub struct TaggingStage {
    name: String,
}

impl TaggingStage {
    /// Creates a new tagging stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Stage for TaggingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, request: Request) -> Outcome {
        let trail = match request.header(TRAIL_HEADER) {
            Some(existing) => format!("{existing},{}", self.name),
            None => self.name.clone(),
        };
        Outcome::Continue(request.with_header(TRAIL_HEADER, trail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counting_stage() {
        let stage = CountingStage::new("count");
        stage.process(Request::new("/")).await;
        stage.process(Request::new("/")).await;
        assert_eq!(stage.calls(), 2);
    }

    #[tokio::test]
    async fn test_failing_stage() {
        let stage = FailingStage::with_error(
            "validate",
            StagechainError::ValidationFailed("bad".to_string()),
        );
        let outcome = stage.process(Request::new("/")).await;
        assert_eq!(
            outcome.error(),
            Some(&StagechainError::ValidationFailed("bad".to_string()))
        );
        assert_eq!(stage.calls(), 1);
    }

    #[tokio::test]
    async fn test_tagging_stage_builds_trail() {
        let first = TaggingStage::new("a").process(Request::new("/")).await;
        let second = TaggingStage::new("b")
            .process(first.request().cloned().unwrap())
            .await;
        assert_eq!(
            second.request().and_then(|r| r.header(TRAIL_HEADER)),
            Some("a,b")
        );
    }

    #[tokio::test]
    async fn test_short_circuit_and_slow_stages() {
        let outcome = ShortCircuitStage::new("deny", 451).process(Request::new("/")).await;
        assert_eq!(outcome.status(), Some(451));

        let outcome = SlowStage::with_delay_ms("slow", 1).process(Request::new("/")).await;
        assert!(outcome.is_continue());
    }
}
