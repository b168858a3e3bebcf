//! Test assertions for execution results.

use crate::core::Request;
use crate::errors::{Result, StagechainError};
use crate::pipeline::PipelineOutput;

/// Asserts that every stage continued and returns the final request.
///
/// # Panics
///
/// Panics if the execution short-circuited or failed.
#[track_caller]
pub fn assert_continued(result: &Result<PipelineOutput>) -> &Request {
    match result {
        Ok(PipelineOutput::Completed(request)) => request,
        Ok(PipelineOutput::ShortCircuited(response)) => panic!(
            "Expected completion, got short-circuit with status {}",
            response.status()
        ),
        Err(err) => panic!("Expected completion, got error: {err}"),
    }
}

/// Asserts that execution short-circuited with `status`.
///
/// # Panics
///
/// Panics if the execution completed, failed, or responded with another
/// status.
#[track_caller]
pub fn assert_short_circuited(result: &Result<PipelineOutput>, status: u16) {
    match result {
        Ok(PipelineOutput::ShortCircuited(response)) => assert_eq!(
            response.status(),
            status,
            "Expected short-circuit with status {status}, got {}",
            response.status()
        ),
        Ok(PipelineOutput::Completed(_)) => {
            panic!("Expected short-circuit with status {status}, got completion")
        }
        Err(err) => panic!("Expected short-circuit with status {status}, got error: {err}"),
    }
}

/// Asserts that execution failed at stage `name`, position `index`, and
/// returns the root cause.
///
/// # Panics
///
/// Panics if the execution succeeded or failed elsewhere.
#[track_caller]
pub fn assert_failed_at<'a>(
    result: &'a Result<PipelineOutput>,
    name: &str,
    index: usize,
) -> &'a StagechainError {
    match result {
        Err(err) => {
            assert_eq!(
                err.failing_stage(),
                Some((name, index)),
                "Expected failure at '{name}' (index {index}), got: {err}"
            );
            err.root_cause()
        }
        Ok(output) => panic!("Expected failure at '{name}' (index {index}), got: {output:?}"),
    }
}
