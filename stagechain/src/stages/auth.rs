//! Credential verification stage.
//!
//! [`AuthStage`] reads a credential from a designated header and asks an
//! [`AuthStore`] whether it is valid. Requests without a credential, or with
//! one the store rejects, are answered with `401`. Verified requests continue
//! with an identity attachment under [`IDENTITY_ATTACHMENT`].
//!
//! The stage holds no mutable state and can be shared freely.

use super::Stage;
use crate::core::{Outcome, Request, Response, StageKind};
use crate::errors::StagechainError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Attachment key holding the verified identity.
pub const IDENTITY_ATTACHMENT: &str = "auth.identity";

const BEARER_SCHEME: &str = "bearer";

/// Verifies credentials presented by callers.
///
/// Lookups may suspend (database, remote identity provider).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthStore: Send + Sync {
    /// Returns true if `credential` is valid.
    async fn verify(&self, credential: &str) -> bool;
}

/// An [`AuthStore`] accepting a fixed set of tokens.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenStore {
    tokens: HashSet<String>,
}

impl StaticTokenStore {
    /// Creates a store accepting exactly `tokens`.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a store accepting a single token.
    #[must_use]
    pub fn single(token: impl Into<String>) -> Self {
        Self::new([token.into()])
    }

    /// Returns the number of accepted tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns true if no token is accepted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl AuthStore for StaticTokenStore {
    async fn verify(&self, credential: &str) -> bool {
        self.tokens.contains(credential)
    }
}

/// Configuration for [`AuthStage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Header carrying the credential.
    #[serde(default = "default_header")]
    pub header: String,
    /// Tokens accepted by the built-in static store.
    #[serde(default)]
    pub tokens: Vec<String>,
    /// Expect and strip a `Bearer ` prefix.
    #[serde(default)]
    pub bearer: bool,
}

fn default_header() -> String {
    "authorization".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            header: default_header(),
            tokens: Vec::new(),
            bearer: false,
        }
    }
}

/// Stage that rejects unauthenticated requests with `401`.
pub struct AuthStage {
    name: String,
    header: String,
    bearer: bool,
    store: Arc<dyn AuthStore>,
}

impl AuthStage {
    /// Creates a stage verifying the `Authorization` header against `store`.
    pub fn new(store: Arc<dyn AuthStore>) -> Self {
        Self {
            name: "auth".to_string(),
            header: default_header(),
            bearer: false,
            store,
        }
    }

    /// Creates a stage accepting a single static token.
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self::new(Arc::new(StaticTokenStore::single(token)))
    }

    /// Creates a stage from configuration, backed by a [`StaticTokenStore`].
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(Arc::new(StaticTokenStore::new(config.tokens.iter().cloned())))
            .with_header(config.header.clone())
            .with_bearer(config.bearer)
    }

    /// Sets the stage name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Reads the credential from `header` instead of `Authorization`.
    #[must_use]
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into().to_ascii_lowercase();
        self
    }

    /// Requires and strips a `Bearer ` prefix.
    #[must_use]
    pub fn with_bearer(mut self, bearer: bool) -> Self {
        self.bearer = bearer;
        self
    }

    /// Returns the header the credential is read from.
    #[must_use]
    pub fn header(&self) -> &str {
        &self.header
    }

    fn credential<'r>(&self, request: &'r Request) -> Option<&'r str> {
        let raw = request.header(&self.header)?;
        let credential = if self.bearer {
            strip_bearer(raw)?
        } else {
            raw
        };
        (!credential.is_empty()).then_some(credential)
    }

    fn reject(&self, reason: &str) -> Outcome {
        let scheme = if self.bearer { "Bearer" } else { "Token" };
        let response = Response::from_error(&StagechainError::Unauthorized(reason.to_string()))
            .with_header("www-authenticate", scheme);
        Outcome::ShortCircuit(response)
    }
}

impl std::fmt::Debug for AuthStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthStage")
            .field("name", &self.name)
            .field("header", &self.header)
            .field("bearer", &self.bearer)
            .finish_non_exhaustive()
    }
}

/// Strips a `Bearer ` scheme, matched case-insensitively. The remainder is
/// returned untouched.
fn strip_bearer(raw: &str) -> Option<&str> {
    let (scheme, credential) = raw.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case(BEARER_SCHEME)
        .then_some(credential)
}

/// Derives a stable, non-reversible subject from a credential.
fn subject_for(credential: &str) -> String {
    let digest = Sha256::digest(credential.as_bytes());
    format!("sha256:{}", &hex::encode(digest)[..16])
}

#[async_trait]
impl Stage for AuthStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Guard
    }

    async fn process(&self, request: Request) -> Outcome {
        let Some(credential) = self.credential(&request).map(str::to_owned) else {
            debug!(stage = %self.name, header = %self.header, "Missing credential");
            return self.reject("missing credential");
        };

        if !self.store.verify(&credential).await {
            debug!(stage = %self.name, "Credential rejected by auth store");
            return self.reject("invalid credential");
        }

        let identity = serde_json::json!({
            "subject": subject_for(&credential),
            "header": self.header,
        });
        Outcome::Continue(request.with_attachment(IDENTITY_ATTACHMENT, identity))
    }
}
