//! The result of a single stage invocation.

use super::{OutcomeKind, Request, Response};
use crate::errors::StagechainError;

/// What a stage decided to do with a request.
///
/// Exactly one variant is produced per invocation:
///
/// - `Continue` hands the (possibly rewritten) request to the next stage.
/// - `ShortCircuit` ends execution with a response. This is not an error.
/// - `Fail` aborts execution; the pipeline annotates the error with the
///   stage's name and index.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Pass the request on.
    Continue(Request),
    /// Stop with a final response.
    ShortCircuit(Response),
    /// Stop with an error.
    Fail(StagechainError),
}

impl Outcome {
    /// Creates a short-circuit outcome with a bare status response.
    #[must_use]
    pub fn respond(status: u16) -> Self {
        Self::ShortCircuit(Response::with_status(status))
    }

    /// Creates a failure outcome from an internal error message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Fail(StagechainError::Internal(message.into()))
    }

    /// Returns the outcome discriminant.
    #[must_use]
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Continue(_) => OutcomeKind::Continue,
            Self::ShortCircuit(_) => OutcomeKind::ShortCircuit,
            Self::Fail(_) => OutcomeKind::Fail,
        }
    }

    /// Returns true if the outcome continues execution.
    #[must_use]
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue(_))
    }

    /// Returns true if the outcome is a short-circuit response.
    #[must_use]
    pub fn is_short_circuit(&self) -> bool {
        matches!(self, Self::ShortCircuit(_))
    }

    /// Returns true if the outcome is a failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Fail(_))
    }

    /// Returns the forwarded request, if any.
    #[must_use]
    pub fn request(&self) -> Option<&Request> {
        match self {
            Self::Continue(request) => Some(request),
            _ => None,
        }
    }

    /// Returns the short-circuit response, if any.
    #[must_use]
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::ShortCircuit(response) => Some(response),
            _ => None,
        }
    }

    /// Returns the failure, if any.
    #[must_use]
    pub fn error(&self) -> Option<&StagechainError> {
        match self {
            Self::Fail(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the status of a short-circuit response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.response().map(Response::status)
    }
}

impl From<StagechainError> for Outcome {
    fn from(err: StagechainError) -> Self {
        Self::Fail(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_continue() {
        let outcome = Outcome::Continue(Request::new("/a"));
        assert!(outcome.is_continue());
        assert_eq!(outcome.kind(), OutcomeKind::Continue);
        assert_eq!(outcome.request().map(Request::path), Some("/a"));
        assert!(outcome.response().is_none());
    }

    #[test]
    fn test_respond() {
        let outcome = Outcome::respond(429);
        assert!(outcome.is_short_circuit());
        assert_eq!(outcome.status(), Some(429));
        assert!(outcome.error().is_none());
    }

    #[test]
    fn test_fail_from_error() {
        let outcome: Outcome = StagechainError::ValidationFailed("bad".to_string()).into();
        assert!(outcome.is_failure());
        assert_eq!(outcome.kind(), OutcomeKind::Fail);
        assert_eq!(outcome.status(), None);
    }

    #[test]
    fn test_internal() {
        let outcome = Outcome::internal("unexpected");
        assert_eq!(
            outcome.error(),
            Some(&StagechainError::Internal("unexpected".to_string()))
        );
    }
}
