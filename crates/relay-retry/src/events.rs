//! Events emitted by [`crate::Retry`].

use relay_core::ResilienceEvent;
use std::time::{Duration, Instant};

/// Observability events for a retry loop.
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// An attempt failed and will be retried after `delay`.
    AttemptFailed {
        /// Retry loop name.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Zero-based attempt index that failed.
        attempt: u32,
        /// Delay before the next attempt.
        delay: Duration,
    },
    /// Every attempt was exhausted without success.
    RetriesExhausted {
        /// Retry loop name.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Total attempts made.
        attempts: u32,
    },
}

impl ResilienceEvent for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::AttemptFailed { .. } => "attempt_failed",
            Self::RetriesExhausted { .. } => "retries_exhausted",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::AttemptFailed { timestamp, .. } => *timestamp,
            Self::RetriesExhausted { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            Self::AttemptFailed { pattern_name, .. } => pattern_name,
            Self::RetriesExhausted { pattern_name, .. } => pattern_name,
        }
    }
}
