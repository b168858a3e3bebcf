//! # Stagechain
//!
//! Composable request-processing pipelines.
//!
//! A [`Pipeline`](pipeline::Pipeline) is an ordered list of
//! [`Stage`](stages::Stage)s. Each stage receives the current
//! [`Request`](core::Request) and decides whether to pass it on, answer it
//! early with a [`Response`](core::Response), or fail:
//!
//! - **Short-circuit control flow**: a stage that responds stops the
//!   pipeline; later stages never run
//! - **Shared-state stages**: rate limiting and authentication stages are
//!   safe to share across concurrent executions
//! - **Runtime assembly**: stages are built by name from configuration
//!   through the [`StageRegistry`](registry::StageRegistry)
//! - **Deadlines and cancellation**: executions can be bounded in time or
//!   cancelled by their caller
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stagechain::prelude::*;
//!
//! let pipeline = Pipeline::new("api")
//!     .stage(LoggingStage::new())?
//!     .stage(RateLimiter::new(100))?
//!     .stage(AuthStage::with_token("secret123"))?
//!     .freeze();
//!
//! let request = Request::new("/orders").with_header("Authorization", "secret123");
//! match pipeline.execute(request).await? {
//!     PipelineOutput::Completed(request) => { /* hand off to the handler */ }
//!     PipelineOutput::ShortCircuited(response) => { /* send response */ }
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod registry;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::StageConfig;
    pub use crate::core::{Outcome, OutcomeKind, Request, RequestId, Response, StageKind};
    pub use crate::errors::{Result, StagechainError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::{init_logging, LogConfig};
    pub use crate::pipeline::{ExecutionOptions, Pipeline, PipelineOutput};
    pub use crate::registry::{StageFactory, StageRegistry, StageSpec};
    pub use crate::stages::{
        AsyncFnStage, AuthConfig, AuthStage, AuthStore, FnStage, LoggingStage, NoOpStage,
        RateLimitConfig, RateLimiter, RequestValidator, Stage, StaticTokenStore,
        ValidationConfig,
    };
}
