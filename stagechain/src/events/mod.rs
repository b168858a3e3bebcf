//! Execution events.
//!
//! A [`Pipeline`](crate::pipeline::Pipeline) reports its progress to an
//! [`EventSink`]. Every event carries a JSON payload with at least the
//! pipeline name, the request id, and an RFC 3339 timestamp.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use crate::core::RequestId;
use chrono::Utc;
use serde_json::{json, Map, Value};

/// Event type names emitted during execution.
pub mod types {
    /// Execution began.
    pub const PIPELINE_STARTED: &str = "pipeline.started";
    /// A stage is about to run.
    pub const STAGE_STARTED: &str = "stage.started";
    /// A stage forwarded the request.
    pub const STAGE_CONTINUED: &str = "stage.continued";
    /// A stage answered with a response.
    pub const STAGE_SHORT_CIRCUITED: &str = "stage.short_circuited";
    /// A stage failed.
    pub const STAGE_FAILED: &str = "stage.failed";
    /// Every stage continued.
    pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
    /// Execution ended with a short-circuit response.
    pub const PIPELINE_SHORT_CIRCUITED: &str = "pipeline.short_circuited";
    /// Execution ended with a stage failure.
    pub const PIPELINE_FAILED: &str = "pipeline.failed";
    /// The execution deadline expired.
    pub const PIPELINE_TIMED_OUT: &str = "pipeline.timed_out";
    /// The caller cancelled the execution.
    pub const PIPELINE_CANCELLED: &str = "pipeline.cancelled";
}

/// Builds an event payload for `pipeline` and `request_id`, merged with `extra`.
///
/// `extra` must be a JSON object; other values are ignored.
#[must_use]
pub fn event_payload(pipeline: &str, request_id: RequestId, extra: Value) -> Value {
    let mut payload = Map::new();
    payload.insert("pipeline".to_string(), json!(pipeline));
    payload.insert("request_id".to_string(), json!(request_id.to_string()));
    payload.insert("timestamp".to_string(), json!(Utc::now().to_rfc3339()));

    if let Value::Object(extra) = extra {
        payload.extend(extra);
    }

    Value::Object(payload)
}
