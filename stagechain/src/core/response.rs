//! Terminal response values.

use crate::errors::StagechainError;
use bytes::Bytes;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Coarse classification of a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    /// 1xx
    Informational,
    /// 2xx
    Success,
    /// 3xx
    Redirection,
    /// 4xx
    ClientError,
    /// 5xx and anything out of range.
    ServerError,
}

/// A response produced by a short-circuiting stage.
///
/// Responses are terminal: once a stage produces one, no further stages run
/// and the response is handed back to the caller unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    headers: IndexMap<String, String>,
    body: Option<Bytes>,
}

impl Response {
    /// Creates a response with the given status and no headers or body.
    #[must_use]
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            headers: IndexMap::new(),
            body: None,
        }
    }

    /// Creates a `200 OK` response.
    #[must_use]
    pub fn ok() -> Self {
        Self::with_status(200)
    }

    /// Creates a bare `401 Unauthorized` response.
    #[must_use]
    pub fn unauthorized() -> Self {
        Self::with_status(401)
    }

    /// Creates a bare `429 Too Many Requests` response.
    #[must_use]
    pub fn too_many_requests() -> Self {
        Self::with_status(429)
    }

    /// Creates a JSON error envelope response.
    #[must_use]
    pub fn json_error(status: u16, code: &str, message: &str) -> Self {
        let body = serde_json::json!({
            "error": {
                "code": code,
                "message": message
            }
        });

        Self::with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
    }

    /// Renders an error as a JSON error envelope with a matching status.
    #[must_use]
    pub fn from_error(error: &StagechainError) -> Self {
        Self::json_error(error.status_code(), error.code(), &error.to_string())
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Returns the status classification.
    #[must_use]
    pub fn status_class(&self) -> StatusClass {
        match self.status {
            100..=199 => StatusClass::Informational,
            200..=299 => StatusClass::Success,
            300..=399 => StatusClass::Redirection,
            400..=499 => StatusClass::ClientError,
            _ => StatusClass::ServerError,
        }
    }

    /// Returns true for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status_class() == StatusClass::Success
    }

    /// Returns true for 4xx statuses.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status_class() == StatusClass::ClientError
    }

    /// Returns the header `name`, ignoring case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns all headers.
    #[must_use]
    pub fn headers(&self) -> &IndexMap<String, String> {
        &self.headers
    }

    /// Returns the body, if any.
    #[must_use]
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Sets a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes() {
        assert_eq!(Response::ok().status_class(), StatusClass::Success);
        assert_eq!(Response::with_status(302).status_class(), StatusClass::Redirection);
        assert_eq!(Response::unauthorized().status_class(), StatusClass::ClientError);
        assert_eq!(Response::with_status(503).status_class(), StatusClass::ServerError);
        assert!(Response::too_many_requests().is_client_error());
        assert!(Response::ok().is_success());
    }

    #[test]
    fn test_json_error() {
        let response = Response::json_error(401, "UNAUTHORIZED", "missing credential");
        assert_eq!(response.status(), 401);
        assert_eq!(response.header("Content-Type"), Some("application/json"));

        let body: serde_json::Value =
            serde_json::from_slice(response.body().unwrap()).unwrap();
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }

    #[test]
    fn test_from_error_uses_root_cause_status() {
        let err = StagechainError::stage_failure(
            "validate",
            0,
            StagechainError::ValidationFailed("path must start with '/'".to_string()),
        );
        let response = Response::from_error(&err);
        assert_eq!(response.status(), 400);
    }
}
