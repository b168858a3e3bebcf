//! Stage kind and outcome kind enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of work a stage performs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// A stage that admits or rejects requests (auth, rate limiting, validation).
    Guard,
    /// A stage that observes requests without changing them (logging).
    Observe,
    /// A stage that rewrites the request.
    #[default]
    Transform,
    /// A nested pipeline used as a single stage.
    Composite,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Guard => write!(f, "guard"),
            Self::Observe => write!(f, "observe"),
            Self::Transform => write!(f, "transform"),
            Self::Composite => write!(f, "composite"),
        }
    }
}

/// Discriminant of an [`Outcome`](super::Outcome).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// The stage passed a request on to the next stage.
    Continue,
    /// The stage produced a final response.
    ShortCircuit,
    /// The stage failed.
    Fail,
}

impl OutcomeKind {
    /// Returns true if execution stops after this outcome.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Continue)
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continue => write!(f, "continue"),
            Self::ShortCircuit => write!(f, "short_circuit"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_kind_display() {
        assert_eq!(StageKind::Guard.to_string(), "guard");
        assert_eq!(StageKind::Composite.to_string(), "composite");
        assert_eq!(StageKind::default(), StageKind::Transform);
    }

    #[test]
    fn test_outcome_kind_terminal() {
        assert!(!OutcomeKind::Continue.is_terminal());
        assert!(OutcomeKind::ShortCircuit.is_terminal());
        assert!(OutcomeKind::Fail.is_terminal());
    }

    #[test]
    fn test_outcome_kind_serialization() {
        let json = serde_json::to_string(&OutcomeKind::ShortCircuit).unwrap();
        assert_eq!(json, "\"short_circuit\"");
    }
}
