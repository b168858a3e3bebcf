//! Request fixtures.

use crate::core::Request;

/// A bare `GET /` request.
#[must_use]
pub fn request() -> Request {
    Request::new("/")
}

/// A request carrying `token` in the `Authorization` header.
#[must_use]
pub fn authorized_request(token: &str) -> Request {
    request().with_header("authorization", token)
}

/// A request carrying `Bearer <token>` in the `Authorization` header.
#[must_use]
pub fn bearer_request(token: &str) -> Request {
    request().with_header("authorization", format!("Bearer {token}"))
}

/// A `POST` request to `path` with a JSON body.
#[must_use]
pub fn request_with_body(path: &str, body: &serde_json::Value) -> Request {
    Request::new(path)
        .with_method("POST")
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures() {
        assert_eq!(authorized_request("t").header("Authorization"), Some("t"));
        assert_eq!(bearer_request("t").header("authorization"), Some("Bearer t"));

        let post = request_with_body("/items", &serde_json::json!({"id": 1}));
        assert_eq!(post.method(), "POST");
        assert_eq!(post.body_len(), r#"{"id":1}"#.len());
    }
}
