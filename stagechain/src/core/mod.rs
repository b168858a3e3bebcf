//! Core value types.
//!
//! This module provides:
//! - [`Request`] and [`Response`] values that flow through a pipeline
//! - [`Outcome`], the result of a single stage invocation
//! - Stage and outcome classification enums

mod outcome;
mod request;
mod response;
mod status;

pub use outcome::Outcome;
pub use request::{Request, RequestId};
pub use response::{Response, StatusClass};
pub use status::{OutcomeKind, StageKind};
