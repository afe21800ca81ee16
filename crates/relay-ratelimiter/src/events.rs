//! Events emitted by [`crate::TokenBucket`].

use relay_core::ResilienceEvent;
use std::time::{Duration, Instant};

/// Observability events for the token bucket.
#[derive(Debug, Clone)]
pub enum RateLimiterEvent {
    /// A permit was granted, optionally after waiting `wait_duration`.
    PermitAcquired {
        /// Name of the bucket instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// How long the caller waited before the permit was granted.
        wait_duration: Duration,
    },
    /// A permit request computed a nonzero wait.
    PermitRejected {
        /// Name of the bucket instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// How long the caller would need to wait.
        timeout_duration: Duration,
    },
}

impl ResilienceEvent for RateLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::PermitAcquired { .. } => "permit_acquired",
            Self::PermitRejected { .. } => "permit_rejected",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::PermitAcquired { timestamp, .. } => *timestamp,
            Self::PermitRejected { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            Self::PermitAcquired { pattern_name, .. } => pattern_name,
            Self::PermitRejected { pattern_name, .. } => pattern_name,
        }
    }
}
