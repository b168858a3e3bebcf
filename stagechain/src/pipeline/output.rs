//! The successful result of a pipeline execution.

use crate::core::{Outcome, Request, Response};

/// What a successful execution produced.
///
/// Short-circuits are successes: the caller gets the response a stage chose
/// to send. Failures are reported as `Err` by the pipeline instead.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutput {
    /// Every stage continued; holds the final request.
    Completed(Request),
    /// A stage answered early with this response.
    ShortCircuited(Response),
}

impl PipelineOutput {
    /// Returns true if every stage continued.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Returns true if a stage short-circuited.
    #[must_use]
    pub fn is_short_circuited(&self) -> bool {
        matches!(self, Self::ShortCircuited(_))
    }

    /// Returns the final request of a completed execution.
    #[must_use]
    pub fn request(&self) -> Option<&Request> {
        match self {
            Self::Completed(request) => Some(request),
            Self::ShortCircuited(_) => None,
        }
    }

    /// Returns the short-circuit response.
    #[must_use]
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::ShortCircuited(response) => Some(response),
            Self::Completed(_) => None,
        }
    }

    /// Returns the short-circuit status.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.response().map(Response::status)
    }

    /// Converts into the equivalent stage outcome.
    #[must_use]
    pub fn into_outcome(self) -> Outcome {
        match self {
            Self::Completed(request) => Outcome::Continue(request),
            Self::ShortCircuited(response) => Outcome::ShortCircuit(response),
        }
    }
}
