//! Events emitted by [`crate::CircuitBreaker`].

use crate::CircuitState;
use relay_core::ResilienceEvent;
use std::time::Instant;

/// Observability events for a circuit breaker.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// The circuit transitioned from one state to another.
    StateTransition {
        /// Breaker name.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// State before the transition.
        from: CircuitState,
        /// State after the transition.
        to: CircuitState,
    },
    /// A call was permitted through.
    CallPermitted {
        /// Breaker name.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
    },
    /// A call was rejected because the circuit is open.
    CallRejected {
        /// Breaker name.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
    },
}

impl ResilienceEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::StateTransition { .. } => "state_transition",
            Self::CallPermitted { .. } => "call_permitted",
            Self::CallRejected { .. } => "call_rejected",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::StateTransition { timestamp, .. } => *timestamp,
            Self::CallPermitted { timestamp, .. } => *timestamp,
            Self::CallRejected { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            Self::StateTransition { pattern_name, .. } => pattern_name,
            Self::CallPermitted { pattern_name, .. } => pattern_name,
            Self::CallRejected { pattern_name, .. } => pattern_name,
        }
    }
}
