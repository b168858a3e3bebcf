//! The request value that flows through a pipeline.

use bytes::Bytes;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Unique identifier assigned to every request on creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generates a new random request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An incoming request.
///
/// A `Request` is moved through the pipeline by value: each stage receives
/// ownership of the current request and hands a (possibly modified) request
/// to the next stage. No two executions ever observe the same request value,
/// so the `with_*` methods below rewrite in place without locking.
///
/// Header names are case-insensitive and stored lowercased; insertion order
/// is preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    id: RequestId,
    method: String,
    path: String,
    headers: IndexMap<String, String>,
    body: Option<Bytes>,
    attachments: HashMap<String, serde_json::Value>,
}

impl Request {
    /// Creates a `GET` request for `path` with no headers or body.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            id: RequestId::new(),
            method: "GET".to_string(),
            path: path.into(),
            headers: IndexMap::new(),
            body: None,
            attachments: HashMap::new(),
        }
    }

    /// Returns the request ID.
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Returns the request method.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the request path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the value of the header `name`, ignoring case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns all headers in insertion order.
    #[must_use]
    pub fn headers(&self) -> &IndexMap<String, String> {
        &self.headers
    }

    /// Returns the request body, if any.
    #[must_use]
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Returns the body length in bytes (zero when absent).
    #[must_use]
    pub fn body_len(&self) -> usize {
        self.body.as_ref().map_or(0, Bytes::len)
    }

    /// Returns the attachment stored under `key`.
    #[must_use]
    pub fn attachment(&self, key: &str) -> Option<&serde_json::Value> {
        self.attachments.get(key)
    }

    /// Returns all attachments.
    #[must_use]
    pub fn attachments(&self) -> &HashMap<String, serde_json::Value> {
        &self.attachments
    }

    /// Sets the request method.
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into().to_ascii_uppercase();
        self
    }

    /// Replaces the request path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets a header, replacing any existing value with the same name.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into().to_ascii_lowercase();
        self.headers.insert(name, value.into());
        self
    }

    /// Removes a header.
    #[must_use]
    pub fn without_header(mut self, name: &str) -> Self {
        self.headers.shift_remove(&name.to_ascii_lowercase());
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Stores an attachment for downstream stages.
    #[must_use]
    pub fn with_attachment(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attachments.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_request_defaults() {
        let request = Request::new("/users");
        assert_eq!(request.path(), "/users");
        assert_eq!(request.method(), "GET");
        assert!(request.headers().is_empty());
        assert!(request.body().is_none());
        assert_eq!(request.body_len(), 0);
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let request = Request::new("/").with_header("Authorization", "secret123");
        assert_eq!(request.header("authorization"), Some("secret123"));
        assert_eq!(request.header("AUTHORIZATION"), Some("secret123"));
    }

    #[test]
    fn test_header_keys_unique_and_ordered() {
        let request = Request::new("/")
            .with_header("x-b", "1")
            .with_header("x-a", "2")
            .with_header("X-B", "3");

        let keys: Vec<&str> = request.headers().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["x-b", "x-a"]);
        assert_eq!(request.header("x-b"), Some("3"));
    }

    #[test]
    fn test_without_header() {
        let request = Request::new("/")
            .with_header("x-a", "1")
            .without_header("X-A");
        assert!(request.header("x-a").is_none());
    }

    #[test]
    fn test_clone_is_independent() {
        let original = Request::new("/").with_header("x-a", "1");
        let modified = original.clone().with_header("x-a", "2");

        assert_eq!(original.header("x-a"), Some("1"));
        assert_eq!(modified.header("x-a"), Some("2"));
        assert_eq!(original.id(), modified.id());
    }

    #[test]
    fn test_attachments_and_body() {
        let request = Request::new("/upload")
            .with_method("post")
            .with_body("hello")
            .with_attachment("trace", serde_json::json!({"sampled": true}));

        assert_eq!(request.method(), "POST");
        assert_eq!(request.body_len(), 5);
        assert_eq!(
            request.attachment("trace"),
            Some(&serde_json::json!({"sampled": true}))
        );
    }

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(Request::new("/").id(), Request::new("/").id());
    }
}
