//! Testing utilities for stagechain pipelines.
//!
//! This module provides:
//! - Scripted stages (counting, failing, short-circuiting, slow, panicking)
//! - Assertions over execution results
//! - Request fixtures

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_continued, assert_failed_at, assert_short_circuited};
pub use fixtures::{authorized_request, bearer_request, request, request_with_body};
pub use mocks::{
    CountingStage, FailingStage, PanickingStage, ShortCircuitStage, SlowStage, TaggingStage,
    TRAIL_HEADER,
};
