//! Fixed-window rate limiting stage.
//!
//! [`RateLimiter`] caps the total number of requests it admits. Every call
//! counts against the cap, including rejected ones: the counter is never
//! rolled back. With a window configured, the counter resets once the
//! window has elapsed; without one, the cap applies for the lifetime of the
//! instance.
//!
//! The increment and the comparison against the cap happen inside one
//! critical section with no await point, so concurrent callers can neither
//! double count nor lose updates, and dropping an in-flight execution can
//! never leave the counter half updated.

use super::Stage;
use crate::core::{Outcome, Request, Response, StageKind};
use crate::errors::StagechainError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// Attachment key holding the number of requests still admitted.
pub const REMAINING_ATTACHMENT: &str = "ratelimit.remaining";

/// Rate limit header names.
mod headers {
    pub const LIMIT: &str = "x-ratelimit-limit";
    pub const RETRY_AFTER: &str = "retry-after";
}

/// Configuration for [`RateLimiter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum number of admitted requests per window.
    #[serde(default = "default_max")]
    pub max: u64,
    /// Window length in seconds. `None` means the counter never resets.
    #[serde(default)]
    pub window_secs: Option<u64>,
}

fn default_max() -> u64 {
    100
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max: default_max(),
            window_secs: None,
        }
    }
}

#[derive(Debug)]
struct WindowState {
    count: u64,
    window_start: Instant,
}

enum Decision {
    Admitted { remaining: u64 },
    Rejected { retry_after: Option<Duration> },
}

/// Stage that short-circuits with `429` once its cap is exceeded.
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    max: u64,
    window: Option<Duration>,
    state: Mutex<WindowState>,
}

impl RateLimiter {
    /// Creates a limiter admitting at most `max` requests over its lifetime.
    #[must_use]
    pub fn new(max: u64) -> Self {
        Self::from_config(&RateLimitConfig {
            max,
            window_secs: None,
        })
    }

    /// Creates a limiter from configuration.
    #[must_use]
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            name: "ratelimit".to_string(),
            max: config.max,
            window: config.window_secs.map(Duration::from_secs),
            state: Mutex::new(WindowState {
                count: 0,
                window_start: Instant::now(),
            }),
        }
    }

    /// Sets the stage name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Resets the counter after `window` has elapsed.
    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = Some(window);
        self
    }

    /// Returns the configured cap.
    #[must_use]
    pub fn max(&self) -> u64 {
        self.max
    }

    /// Returns the number of calls counted in the current window.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.state.lock().count
    }

    /// Returns how many more requests the current window admits.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.max.saturating_sub(self.count())
    }

    fn acquire(&self) -> Decision {
        let mut state = self.state.lock();

        if let Some(window) = self.window {
            if state.window_start.elapsed() >= window {
                state.count = 0;
                state.window_start = Instant::now();
            }
        }

        state.count = state.count.saturating_add(1);

        if state.count > self.max {
            let retry_after = self
                .window
                .map(|window| window.saturating_sub(state.window_start.elapsed()));
            Decision::Rejected { retry_after }
        } else {
            Decision::Admitted {
                remaining: self.max - state.count,
            }
        }
    }

    fn rejection(&self, retry_after: Option<Duration>) -> Response {
        let err = StagechainError::RateLimited(format!(
            "limit of {} requests exceeded",
            self.max
        ));
        let response =
            Response::from_error(&err).with_header(headers::LIMIT, self.max.to_string());

        match retry_after {
            // Round up so clients never retry before the window resets.
            Some(wait) => {
                let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
                response.with_header(headers::RETRY_AFTER, secs.to_string())
            }
            None => response,
        }
    }
}

#[async_trait]
impl Stage for RateLimiter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Guard
    }

    async fn process(&self, request: Request) -> Outcome {
        match self.acquire() {
            Decision::Admitted { remaining } => Outcome::Continue(
                request.with_attachment(REMAINING_ATTACHMENT, serde_json::json!(remaining)),
            ),
            Decision::Rejected { retry_after } => {
                debug!(
                    stage = %self.name,
                    limit = self.max,
                    path = request.path(),
                    "Rate limit exceeded"
                );
                Outcome::ShortCircuit(self.rejection(retry_after))
            }
        }
    }
}
