//! Continuous-refill token bucket.
//!
//! Tokens accumulate at `rate` tokens per `period`, capped at `max_tokens`,
//! refilled lazily the next time the bucket is touched rather than by a
//! background tick. `acquire` never sleeps; it reports how long the caller
//! would need to wait and leaves the sleeping to the caller (see
//! [`TokenBucket::execute`], which does both).

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::events::RateLimiterEvent;
use relay_core::EventListeners;

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// A token-bucket rate limiter.
///
/// Construct with [`TokenBucket::new`]; `max_tokens` defaults to `rate`
/// when not overridden, matching the common case of "N per period".
pub struct TokenBucket {
    rate: f64,
    period: Duration,
    max_tokens: f64,
    state: Mutex<BucketState>,
    name: String,
    event_listeners: EventListeners<RateLimiterEvent>,
}

impl TokenBucket {
    /// Creates a bucket refilling at `rate` tokens per `period`, holding
    /// at most `max_tokens` (or `rate` if `max_tokens` is `None`).
    pub fn new(rate: f64, period: Duration, max_tokens: Option<f64>) -> Self {
        let max_tokens = max_tokens.unwrap_or(rate);
        Self {
            rate,
            period,
            max_tokens,
            state: Mutex::new(BucketState {
                tokens: max_tokens,
                last_refill: Instant::now(),
            }),
            name: "token_bucket".to_string(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Assigns a name used in emitted events and metric labels.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers an event listener.
    pub fn add_listener<L>(&mut self, listener: L)
    where
        L: relay_core::EventListener<RateLimiterEvent> + 'static,
    {
        self.event_listeners.add(listener);
    }

    fn refill_locked(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        let new_tokens = elapsed * (self.rate / self.period.as_secs_f64());
        if new_tokens > 0.0 {
            state.tokens = (state.tokens + new_tokens).min(self.max_tokens);
            state.last_refill = now;
        }
    }

    /// Attempts to withdraw `tokens` from the bucket. Returns `Duration::ZERO`
    /// if the withdrawal succeeded immediately, otherwise the duration the
    /// caller would need to wait for enough tokens to accumulate. Never
    /// sleeps and never mutates bucket state when denying the request.
    pub async fn acquire(&self, tokens: f64) -> Duration {
        let mut state = self.state.lock().await;
        self.refill_locked(&mut state);

        if state.tokens >= tokens {
            state.tokens -= tokens;
            #[cfg(feature = "tracing")]
            tracing::trace!(bucket = %self.name, tokens, "token bucket permit granted");
            self.event_listeners.emit(&RateLimiterEvent::PermitAcquired {
                pattern_name: self.name.clone(),
                timestamp: Instant::now(),
                wait_duration: Duration::ZERO,
            });
            #[cfg(feature = "metrics")]
            metrics::gauge!("relay_ratelimiter_tokens", "name" => self.name.clone())
                .set(state.tokens);
            Duration::ZERO
        } else {
            let deficit = tokens - state.tokens;
            let wait_seconds = deficit * self.period.as_secs_f64() / self.rate;
            let wait = Duration::from_secs_f64(wait_seconds.max(0.0));
            self.event_listeners.emit(&RateLimiterEvent::PermitRejected {
                pattern_name: self.name.clone(),
                timestamp: Instant::now(),
                timeout_duration: wait,
            });
            wait
        }
    }

    /// Acquires one token, sleeping if necessary, then runs `fut`.
    pub async fn execute<F, Fut, T>(&self, fut: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let wait = self.acquire(1.0).await;
        if wait > Duration::ZERO {
            tokio::time::sleep(wait).await;
        }
        fut().await
    }

    /// Current token count, for diagnostics and tests. Triggers a refill
    /// as a side effect, same as `acquire` would.
    pub async fn available_tokens(&self) -> f64 {
        let mut state = self.state.lock().await;
        self.refill_locked(&mut state);
        state.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn grants_immediately_when_tokens_available() {
        let bucket = TokenBucket::new(10.0, Duration::from_secs(1), None);
        let wait = bucket.acquire(1.0).await;
        assert_eq!(wait, Duration::ZERO);
        assert!((bucket.available_tokens().await - 9.0).abs() < 0.5);
    }

    #[tokio::test]
    async fn reports_wait_when_exhausted() {
        let bucket = TokenBucket::new(1.0, Duration::from_secs(10), Some(1.0));
        assert_eq!(bucket.acquire(1.0).await, Duration::ZERO);
        let wait = bucket.acquire(1.0).await;
        assert!(wait > Duration::ZERO, "expected a nonzero wait, got {wait:?}");
        // Roughly 10s for one more token at rate 1/10s.
        assert!(wait <= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn refills_over_time() {
        let bucket = TokenBucket::new(100.0, Duration::from_millis(100), Some(1.0));
        assert_eq!(bucket.acquire(1.0).await, Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(50)).await;
        let tokens = bucket.available_tokens().await;
        assert!(tokens > 0.0, "expected partial refill, got {tokens}");
    }

    #[tokio::test]
    async fn never_exceeds_max_tokens() {
        let bucket = TokenBucket::new(1000.0, Duration::from_millis(1), Some(5.0));
        tokio::time::sleep(Duration::from_millis(50)).await;
        let tokens = bucket.available_tokens().await;
        assert!(tokens <= 5.0);
    }

    #[tokio::test]
    async fn execute_runs_closure_after_waiting() {
        let bucket = TokenBucket::new(1.0, Duration::from_millis(20), Some(1.0));
        let _ = bucket.acquire(1.0).await;
        let result = bucket.execute(|| async { 42 }).await;
        assert_eq!(result, 42);
    }
}
