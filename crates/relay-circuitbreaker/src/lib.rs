//! A circuit breaker guarding an arbitrary async operation.
//!
//! Three states: closed (calls pass through), open (calls are rejected
//! immediately), half-open (a single probe call is allowed through to test
//! recovery). The breaker counts failures within the closed state; once
//! `failure_threshold` consecutive-window failures accumulate, or a
//! half-open probe fails, it opens for `recovery_time` before allowing
//! another probe.
//!
//! The breaker does not categorize the wrapped operation's error — any
//! `Err` counts as a failure, any `Ok` counts as a success. Callers that
//! want to exclude certain errors from tripping the breaker should filter
//! before calling [`CircuitBreaker::execute`].

mod error;
mod events;

pub use error::CircuitBreakerError;
pub use events::CircuitBreakerEvent;

use relay_core::EventListeners;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// The circuit breaker's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[non_exhaustive]
pub enum CircuitState {
    /// Calls pass through normally.
    Closed = 0,
    /// Calls are rejected without being attempted.
    Open = 1,
    /// A single probe call is allowed through.
    HalfOpen = 2,
}

impl CircuitState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Closed,
            1 => Self::Open,
            _ => Self::HalfOpen,
        }
    }
}

struct Inner {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<Instant>,
}

/// A circuit breaker wrapping failure-threshold + recovery-time semantics.
pub struct CircuitBreaker {
    failure_threshold: u32,
    recovery_time: Duration,
    inner: Mutex<Inner>,
    state_atomic: Arc<AtomicU8>,
    name: String,
    event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl CircuitBreaker {
    /// Creates a breaker that opens after `failure_threshold` consecutive
    /// failures and stays open for `recovery_time` before probing again.
    pub fn new(failure_threshold: u32, recovery_time: Duration) -> Self {
        Self {
            failure_threshold,
            recovery_time,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_at: None,
            }),
            state_atomic: Arc::new(AtomicU8::new(CircuitState::Closed as u8)),
            name: "circuit_breaker".to_string(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Assigns a name used in emitted events.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers an event listener.
    pub fn add_listener<L>(&mut self, listener: L)
    where
        L: relay_core::EventListener<CircuitBreakerEvent> + 'static,
    {
        self.event_listeners.add(listener);
    }

    /// Reads the current state without blocking on the async lock. Safe to
    /// call from sync code such as a health check or metrics scrape.
    pub fn state_sync(&self) -> CircuitState {
        CircuitState::from_u8(self.state_atomic.load(Ordering::Acquire))
    }

    /// Returns the current state.
    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    /// Forces the circuit open, as if the failure threshold had just been hit.
    pub async fn force_open(&self) {
        let mut inner = self.inner.lock().await;
        self.transition(&mut inner, CircuitState::Open);
        inner.last_failure_at = Some(Instant::now());
    }

    /// Forces the circuit closed and clears the failure count.
    pub async fn force_closed(&self) {
        let mut inner = self.inner.lock().await;
        self.transition(&mut inner, CircuitState::Closed);
        inner.failure_count = 0;
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        if inner.state == to {
            return;
        }
        let from = inner.state;
        inner.state = to;
        self.state_atomic.store(to as u8, Ordering::Release);

        #[cfg(feature = "tracing")]
        tracing::info!(breaker = %self.name, ?from, ?to, "circuit breaker state transition");
        #[cfg(feature = "metrics")]
        metrics::counter!(
            "relay_circuitbreaker_transitions_total",
            "name" => self.name.clone(),
            "to" => format!("{to:?}")
        )
        .increment(1);

        self.event_listeners.emit(&CircuitBreakerEvent::StateTransition {
            pattern_name: self.name.clone(),
            timestamp: Instant::now(),
            from,
            to,
        });
    }

    /// Runs `op` if the circuit permits it, recording the outcome
    /// afterward. The internal lock is held only while checking/updating
    /// state, never while `op` itself is running, so a slow wrapped
    /// operation never blocks other callers from observing the breaker's
    /// state.
    ///
    /// Only a call rejected unattempted (the circuit was open) produces
    /// [`CircuitBreakerError::Open`]. A call that was permitted and ran
    /// surfaces the wrapped operation's own error through
    /// [`CircuitBreakerError::Inner`] — the breaker never substitutes its
    /// own error for the op's.
    pub async fn execute<F, Fut, T, E>(&self, op: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        {
            let mut inner = self.inner.lock().await;
            match inner.state {
                CircuitState::Open => {
                    let elapsed = inner
                        .last_failure_at
                        .map(|t| t.elapsed())
                        .unwrap_or(Duration::ZERO);
                    if elapsed > self.recovery_time {
                        self.transition(&mut inner, CircuitState::HalfOpen);
                    } else {
                        let retry_after = self.recovery_time - elapsed;
                        self.event_listeners.emit(&CircuitBreakerEvent::CallRejected {
                            pattern_name: self.name.clone(),
                            timestamp: Instant::now(),
                        });
                        return Err(CircuitBreakerError::Open { retry_after });
                    }
                }
                CircuitState::Closed | CircuitState::HalfOpen => {}
            }
            self.event_listeners.emit(&CircuitBreakerEvent::CallPermitted {
                pattern_name: self.name.clone(),
                timestamp: Instant::now(),
            });
        }

        match op().await {
            Ok(value) => {
                let mut inner = self.inner.lock().await;
                if inner.state == CircuitState::HalfOpen {
                    self.transition(&mut inner, CircuitState::Closed);
                }
                inner.failure_count = 0;
                Ok(value)
            }
            Err(err) => {
                let mut inner = self.inner.lock().await;
                inner.failure_count += 1;
                inner.last_failure_at = Some(Instant::now());
                if inner.failure_count >= self.failure_threshold || inner.state == CircuitState::HalfOpen {
                    self.transition(&mut inner, CircuitState::Open);
                }
                Err(CircuitBreakerError::Inner(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(30));
        for _ in 0..2 {
            let result = breaker.execute(|| async { Err::<(), _>("boom") }).await;
            assert!(matches!(result, Err(CircuitBreakerError::Inner("boom"))));
            assert_eq!(breaker.state().await, CircuitState::Closed);
        }
        let result = breaker.execute(|| async { Err::<(), _>("boom") }).await;
        assert!(matches!(result, Err(CircuitBreakerError::Inner("boom"))));
        assert_eq!(breaker.state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn permitted_failure_propagates_the_wrapped_error_not_open() {
        // Sub-threshold failures (the circuit stays Closed) must surface
        // the underlying op's own error, not a fabricated `Open`.
        let breaker = CircuitBreaker::new(3, Duration::from_secs(30));
        let result = breaker.execute(|| async { Err::<(), _>("boom") }).await;
        assert_eq!(result, Err(CircuitBreakerError::Inner("boom")));
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn rejects_without_calling_inner_while_open() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(60));
        let _ = breaker.execute(|| async { Err::<(), _>("boom") }).await;
        assert_eq!(breaker.state().await, CircuitState::Open);

        let calls = std::sync::atomic::AtomicUsize::new(0);
        let result = breaker
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<(), &str>(())
            })
            .await;
        assert!(matches!(result, Err(CircuitBreakerError::Open { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn half_open_probe_success_closes_circuit() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(10));
        let _ = breaker.execute(|| async { Err::<(), _>("boom") }).await;
        assert_eq!(breaker.state().await, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(15)).await;

        let result = breaker.execute(|| async { Ok::<_, &str>(42) }).await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_probe_failure_reopens_circuit() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(10));
        let _ = breaker.execute(|| async { Err::<(), _>("boom") }).await;
        tokio::time::sleep(Duration::from_millis(15)).await;

        let result = breaker.execute(|| async { Err::<(), _>("still broken") }).await;
        assert!(result.is_err());
        assert_eq!(breaker.state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn manual_overrides_work() {
        let breaker = CircuitBreaker::new(5, Duration::from_secs(30));
        breaker.force_open().await;
        assert_eq!(breaker.state().await, CircuitState::Open);
        breaker.force_closed().await;
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn state_sync_matches_async_state() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(30));
        assert_eq!(breaker.state_sync(), CircuitState::Closed);
        breaker.force_open().await;
        assert_eq!(breaker.state_sync(), CircuitState::Open);
    }
}
