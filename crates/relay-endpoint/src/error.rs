//! Errors raised while assembling a payload or executing a call through
//! [`crate::Endpoint`].

use std::time::Duration;
use thiserror::Error;

/// Failure modes for an outbound endpoint call.
///
/// Mirrors the shape of [`relay_core::ApiClientError`] so the facade can
/// fold an `EndpointError` into that unified taxonomy with a cheap 1:1
/// mapping (see `impl From<EndpointError> for ApiClientError<E>` in
/// `relay-client`) rather than burying endpoint failures behind a single
/// `Application` variant.
#[derive(Debug, Clone, Error)]
pub enum EndpointError {
    /// Missing endpoint, invalid config, or an unresolved credential.
    #[error("endpoint configuration error: {0}")]
    Config(String),

    /// The assembled payload failed validation before being sent.
    #[error("payload validation error: {0}")]
    Validation(String),

    /// The transport (HTTP client or SDK stub) failed to complete the call.
    #[error("transport error: {0}")]
    Transport(String),

    /// The call did not complete within `timeout_seconds`.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// Upstream signaled 429 or an equivalent rate-limit response.
    #[error("rate limited by upstream{}", retry_after.map(|d| format!(", retry after {d:?}")).unwrap_or_default())]
    RateLimit {
        /// How long the caller should wait before retrying, if upstream said.
        retry_after: Option<Duration>,
    },

    /// Upstream rejected the credential.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Upstream returned a 5xx-class response.
    #[error("server error: {0}")]
    Server(String),

    /// Upstream returned 404 for a referenced resource.
    #[error("not found: {0}")]
    NotFound(String),

    /// The call was cancelled before it completed.
    #[error("call cancelled")]
    Cancelled,

    /// Anything else, wrapped with context.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EndpointError {
    /// Maps an HTTP status code to the matching variant, per spec.md §7.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            401 | 403 => Self::Auth(body),
            404 => Self::NotFound(body),
            429 => Self::RateLimit { retry_after: None },
            500..=599 => Self::Server(body),
            _ => Self::Transport(format!("unexpected status {status}: {body}")),
        }
    }
}

impl From<reqwest::Error> for EndpointError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(Duration::from_secs(0))
        } else {
            Self::Transport(err.to_string())
        }
    }
}
