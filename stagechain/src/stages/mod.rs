//! Stage trait and implementations.
//!
//! Stages are the fundamental units of request processing. A stage receives
//! ownership of the current [`Request`] and returns an [`Outcome`].

mod auth;
mod logging;
mod rate_limit;
mod validation;

pub use auth::{AuthConfig, AuthStage, AuthStore, StaticTokenStore, IDENTITY_ATTACHMENT};
pub use logging::{LoggingConfig, LoggingStage};
pub use rate_limit::{RateLimitConfig, RateLimiter, REMAINING_ATTACHMENT};
pub use validation::{RequestValidator, ValidationConfig};

#[cfg(test)]
pub use auth::MockAuthStore;

use crate::core::{Outcome, Request, StageKind};
use async_trait::async_trait;
use std::fmt::Debug;
use std::future::Future;
use std::marker::PhantomData;

/// Trait for pipeline stages.
///
/// Implementations must not panic; unexpected conditions are reported as
/// [`Outcome::Fail`]. Private mutable state is allowed but must be
/// synchronized internally, since one instance serves every concurrent
/// execution of the pipelines it belongs to.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Returns the kind of work the stage performs.
    fn kind(&self) -> StageKind {
        StageKind::Transform
    }

    /// Processes a request.
    async fn process(&self, request: Request) -> Outcome;
}

/// A simple function-based stage.
pub struct FnStage<F>
where
    F: Fn(Request) -> Outcome + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(Request) -> Outcome + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(Request) -> Outcome + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(Request) -> Outcome + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, request: Request) -> Outcome {
        (self.func)(request)
    }
}

/// An async function-based stage.
pub struct AsyncFnStage<F, Fut>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Outcome> + Send,
{
    name: String,
    func: F,
    _phantom: PhantomData<fn() -> Fut>,
}

impl<F, Fut> AsyncFnStage<F, Fut>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Outcome> + Send,
{
    /// Creates a new async function-based stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
            _phantom: PhantomData,
        }
    }
}

impl<F, Fut> Debug for AsyncFnStage<F, Fut>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Outcome> + Send,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncFnStage")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl<F, Fut> Stage for AsyncFnStage<F, Fut>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Outcome> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, request: Request) -> Outcome {
        (self.func)(request).await
    }
}

/// A stage that forwards every request unchanged.
#[derive(Debug, Clone)]
pub struct NoOpStage {
    name: String,
}

impl NoOpStage {
    /// Creates a new no-op stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Stage for NoOpStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, request: Request) -> Outcome {
        Outcome::Continue(request)
    }
}
