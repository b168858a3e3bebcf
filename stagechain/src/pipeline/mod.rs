//! Pipeline building and execution.
//!
//! This module provides:
//! - The sequential [`Pipeline`] engine
//! - Per-pipeline [`ExecutionOptions`]
//! - The [`PipelineOutput`] of a successful execution

mod engine;
mod options;
mod output;

#[cfg(test)]
mod integration_tests;

pub use engine::Pipeline;
pub use options::ExecutionOptions;
pub use output::PipelineOutput;
