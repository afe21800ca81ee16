//! Errors raised by [`crate::CircuitBreaker`].

use std::time::Duration;
use thiserror::Error;

/// The circuit breaker's own failure mode, generic over the wrapped
/// operation's error type `E`.
///
/// A circuit breaker never inspects or categorizes the error returned by
/// the operation it guards — it only counts whether the call succeeded or
/// failed. [`CircuitBreakerError::Open`] is produced only when the
/// circuit itself rejects a call without ever attempting it; a permitted
/// call that fails surfaces its own error unchanged through
/// [`CircuitBreakerError::Inner`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; the call was rejected without being attempted.
    #[error("circuit breaker open, retry after {retry_after:?}")]
    Open {
        /// Time remaining until the breaker will allow a half-open probe.
        retry_after: Duration,
    },
    /// The call was permitted and ran, but the wrapped operation failed.
    #[error("{0}")]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    /// Time remaining until the breaker transitions to half-open, if this
    /// is [`CircuitBreakerError::Open`].
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Open { retry_after } => Some(*retry_after),
            Self::Inner(_) => None,
        }
    }

    /// The wrapped operation's error, if this is [`CircuitBreakerError::Inner`].
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Open { .. } => None,
            Self::Inner(err) => Some(err),
        }
    }
}
