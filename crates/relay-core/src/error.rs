//! Shared error taxonomy for the resilient request-execution stack.
//!
//! Every component crate (rate limiter, circuit breaker, retry, executor,
//! endpoint, client) defines its own narrow error enum. [`ApiClientError<E>`]
//! is the facade-level type each of those narrow errors converts into, so
//! callers composing several layers never have to hand-write `From` impls.
//!
//! The variant set matches the error *kinds* a caller needs to branch on:
//! configuration problems, request validation, transport failures, timeouts,
//! rate limiting, authentication, server-side failures, missing resources,
//! an open circuit breaker, cancellation, and a catch-all internal error.
//! `Application(E)` carries whatever the wrapped operation itself returned.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// A unified error type for the resilience stack.
///
/// # Type Parameters
///
/// - `E`: the application error type returned by the wrapped operation.
#[derive(Debug, Error)]
pub enum ApiClientError<E> {
    /// The endpoint or component was misconfigured (missing credential,
    /// invalid URL template, contradictory limits).
    #[error("configuration error: {0}")]
    Config(String),

    /// The request failed validation before being sent.
    #[error("validation error: {0}")]
    Validation(String),

    /// The underlying transport (HTTP or SDK) failed to complete the call.
    #[error("transport error: {0}")]
    Transport(String),

    /// The call did not complete within the configured timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// A rate limiter or upstream 429 rejected the call.
    #[error("rate limited{}", retry_after.map(|d| format!(", retry after {d:?}")).unwrap_or_default())]
    RateLimit {
        /// How long the caller should wait before retrying, if known.
        retry_after: Option<Duration>,
    },

    /// Authentication or authorization failed.
    #[error("authentication error: {0}")]
    Auth(String),

    /// The upstream server returned a 5xx-class failure.
    #[error("server error: {0}")]
    Server(String),

    /// The requested resource does not exist upstream.
    #[error("not found: {0}")]
    NotFound(String),

    /// The circuit breaker is open and rejected the call without attempting it.
    #[error("circuit breaker open{}", name.as_deref().map(|n| format!(" ({n})")).unwrap_or_default())]
    CircuitOpen {
        /// Circuit breaker name, if one was configured.
        name: Option<String>,
        /// Time remaining before the breaker transitions to half-open.
        retry_after: Option<Duration>,
    },

    /// The operation was cancelled before it completed.
    #[error("operation cancelled")]
    Cancelled,

    /// An internal invariant was violated; this should not normally occur.
    #[error("internal error: {0}")]
    Internal(String),

    /// The wrapped operation itself returned an application-level error.
    #[error("application error: {0}")]
    Application(E),
}

// thiserror's derive requires E: std::error::Error to blanket-derive Error,
// but we want ApiClientError<E> usable with any Display + Debug E (the
// call event stores errors as strings, not live error objects). Implement
// the std::error::Error bound manually instead of deriving it for every E.
impl<E> Clone for ApiClientError<E>
where
    E: Clone,
{
    fn clone(&self) -> Self {
        match self {
            Self::Config(s) => Self::Config(s.clone()),
            Self::Validation(s) => Self::Validation(s.clone()),
            Self::Transport(s) => Self::Transport(s.clone()),
            Self::Timeout(d) => Self::Timeout(*d),
            Self::RateLimit { retry_after } => Self::RateLimit {
                retry_after: *retry_after,
            },
            Self::Auth(s) => Self::Auth(s.clone()),
            Self::Server(s) => Self::Server(s.clone()),
            Self::NotFound(s) => Self::NotFound(s.clone()),
            Self::CircuitOpen { name, retry_after } => Self::CircuitOpen {
                name: name.clone(),
                retry_after: *retry_after,
            },
            Self::Cancelled => Self::Cancelled,
            Self::Internal(s) => Self::Internal(s.clone()),
            Self::Application(e) => Self::Application(e.clone()),
        }
    }
}

impl<E> ApiClientError<E> {
    /// Returns `true` if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Returns `true` if this is a circuit-open error.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Returns `true` if this is a rate-limit error.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimit { .. })
    }

    /// Returns `true` if the operation was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns `true` if this wraps an application-level error.
    pub fn is_application(&self) -> bool {
        matches!(self, Self::Application(_))
    }

    /// Extracts the application error, if this is the `Application` variant.
    pub fn application_error(self) -> Option<E> {
        match self {
            Self::Application(e) => Some(e),
            _ => None,
        }
    }

    /// Maps the application error using a function, leaving every other
    /// variant untouched.
    pub fn map_application<F, T>(self, f: F) -> ApiClientError<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            Self::Config(s) => ApiClientError::Config(s),
            Self::Validation(s) => ApiClientError::Validation(s),
            Self::Transport(s) => ApiClientError::Transport(s),
            Self::Timeout(d) => ApiClientError::Timeout(d),
            Self::RateLimit { retry_after } => ApiClientError::RateLimit { retry_after },
            Self::Auth(s) => ApiClientError::Auth(s),
            Self::Server(s) => ApiClientError::Server(s),
            Self::NotFound(s) => ApiClientError::NotFound(s),
            Self::CircuitOpen { name, retry_after } => {
                ApiClientError::CircuitOpen { name, retry_after }
            }
            Self::Cancelled => ApiClientError::Cancelled,
            Self::Internal(s) => ApiClientError::Internal(s),
            Self::Application(e) => ApiClientError::Application(f(e)),
        }
    }
}

/// A stable, short string for the error kind, useful for metric labels.
pub fn kind_label<E>(err: &ApiClientError<E>) -> &'static str {
    match err {
        ApiClientError::Config(_) => "config",
        ApiClientError::Validation(_) => "validation",
        ApiClientError::Transport(_) => "transport",
        ApiClientError::Timeout(_) => "timeout",
        ApiClientError::RateLimit { .. } => "rate_limit",
        ApiClientError::Auth(_) => "auth",
        ApiClientError::Server(_) => "server",
        ApiClientError::NotFound(_) => "not_found",
        ApiClientError::CircuitOpen { .. } => "circuit_open",
        ApiClientError::Cancelled => "cancelled",
        ApiClientError::Internal(_) => "internal",
        ApiClientError::Application(_) => "application",
    }
}
