//! Retry with exponential backoff and jitter around an arbitrary async
//! operation.
//!
//! `exclude` is checked before `retry_on`: an error excluded from retry
//! never retries, even if a `retry_on` predicate would otherwise match it.
//! Once `max_retries` attempts have all failed, the last error is returned
//! to the caller.

mod backoff;
mod events;
mod policy;

pub use events::RetryEvent;
pub use policy::RetryPolicy;

use relay_core::EventListeners;
use std::time::{Duration, Instant};

/// Retries an operation with exponential backoff.
pub struct Retry<E> {
    base_delay: Duration,
    max_delay: Duration,
    backoff_factor: f64,
    jitter: bool,
    policy: RetryPolicy<E>,
    name: String,
    event_listeners: EventListeners<RetryEvent>,
}

impl<E> Retry<E> {
    /// Creates a retry loop with the given policy and backoff parameters.
    pub fn new(
        policy: RetryPolicy<E>,
        base_delay: Duration,
        max_delay: Duration,
        backoff_factor: f64,
        jitter: bool,
    ) -> Self {
        Self {
            base_delay,
            max_delay,
            backoff_factor,
            jitter,
            policy,
            name: "retry".to_string(),
            event_listeners: EventListeners::new(),
        }
    }

    /// A retry loop with the common defaults: 3 retries, 1s base delay,
    /// 60s max delay, factor 2.0, jitter enabled.
    pub fn with_defaults() -> Self {
        Self::new(
            RetryPolicy::new(3),
            Duration::from_secs(1),
            Duration::from_secs(60),
            2.0,
            true,
        )
    }

    /// Assigns a name used in emitted events.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers an event listener.
    pub fn add_listener<L>(&mut self, listener: L)
    where
        L: relay_core::EventListener<RetryEvent> + 'static,
    {
        self.event_listeners.add(listener);
    }

    /// Runs `op`, retrying on failure per the configured policy and
    /// backoff. `op` is called again from scratch on every attempt.
    pub async fn execute<F, Fut, T>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !self.policy.should_retry(&err) {
                        return Err(err);
                    }
                    if attempt >= self.policy.max_retries {
                        self.event_listeners.emit(&RetryEvent::RetriesExhausted {
                            pattern_name: self.name.clone(),
                            timestamp: Instant::now(),
                            attempts: attempt + 1,
                        });
                        #[cfg(feature = "metrics")]
                        metrics::counter!(
                            "relay_retry_exhausted_total",
                            "name" => self.name.clone()
                        )
                        .increment(1);
                        return Err(err);
                    }

                    let delay = backoff::compute_delay(
                        attempt,
                        self.base_delay,
                        self.backoff_factor,
                        self.max_delay,
                        self.jitter,
                    );

                    #[cfg(feature = "tracing")]
                    tracing::debug!(retry = %self.name, attempt, ?delay, "retrying after failure");
                    self.event_listeners.emit(&RetryEvent::AttemptFailed {
                        pattern_name: self.name.clone(),
                        timestamp: Instant::now(),
                        attempt,
                        delay,
                    });

                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
