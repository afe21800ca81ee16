//! Observability guide for the request-execution stack.
//!
//! Every component crate carries the same two optional features: `tracing`
//! for structured logs at state transitions, rejections, and replenishment
//! cycles, and `metrics` for `metrics`-crate counters/gauges/histograms
//! labeled by the pattern's configured `name`. Enabling `relay`'s own
//! `tracing`/`metrics` features forwards them to every component crate
//! enabled alongside it.

/// Metrics documentation
pub mod metrics {
    //! # Metrics Guide
    //!
    //! ## Enabling Metrics
    //!
    //! ```toml
    //! [dependencies]
    //! relay = { version = "0.1", features = ["client", "metrics"] }
    //! metrics = "0.24"
    //! metrics-exporter-prometheus = "0.16"
    //! ```
    //!
    //! ## Instance Naming
    //!
    //! Every component's `with_name` sets the `name` label that
    //! distinguishes metrics from multiple instances of the same pattern:
    //!
    //! ```rust,ignore
    //! let user_breaker = CircuitBreaker::new(5, Duration::from_secs(30)).with_name("user-service");
    //! let payment_breaker = CircuitBreaker::new(5, Duration::from_secs(30)).with_name("payment-service");
    //! ```
    //!
    //! ```text
    //! relay_circuitbreaker_transitions_total{name="user-service",to="Open"} 1
    //! relay_circuitbreaker_transitions_total{name="payment-service",to="Open"} 0
    //! ```
    //!
    //! ## Metrics by Component
    //!
    //! ### Rate limiter (`relay-ratelimiter`)
    //!
    //! - `relay_ratelimiter_tokens{name}` — current token count gauge, updated on every refill.
    //!
    //! ### Circuit breaker (`relay-circuitbreaker`)
    //!
    //! - `relay_circuitbreaker_transitions_total{name, to}` — state transitions, labeled by the state entered.
    //!
    //! ### Retry (`relay-retry`)
    //!
    //! - `relay_retry_exhausted_total{name}` — operations that ran out of retries without succeeding.
    //!
    //! ### Executor (`relay-executor`)
    //!
    //! - `relay_executor_cancelled_total{name}` — in-flight tasks cancelled by a shutdown.
    //! - `relay_executor_task_duration_seconds{name}` — per-task wall time, from dequeue to terminal status.
    //!
    //! ### Cache (`relay-cache`)
    //!
    //! - `relay_cache_hits_total` — `get_or_set` calls resolved from a live entry.
    //! - `relay_cache_misses_total` — `get_or_set` calls that ran the producer.
    //!
    //! ## Example Prometheus Queries
    //!
    //! ```promql
    //! # Cache hit rate
    //! rate(relay_cache_hits_total[5m])
    //!   /
    //! (rate(relay_cache_hits_total[5m]) + rate(relay_cache_misses_total[5m])) * 100
    //!
    //! # P95 executor task duration
    //! histogram_quantile(0.95, rate(relay_executor_task_duration_seconds_bucket[5m]))
    //! ```
    //!
    //! ## Alert Examples
    //!
    //! ```yaml
    //! - alert: CircuitBreakerOpened
    //!   expr: increase(relay_circuitbreaker_transitions_total{to="Open"}[5m]) > 0
    //!   for: 1m
    //!
    //! - alert: RetriesExhausted
    //!   expr: rate(relay_retry_exhausted_total[5m]) > 0
    //!   for: 5m
    //! ```
}

/// Tracing documentation
pub mod tracing_guide {
    //! # Tracing Guide
    //!
    //! Enable detailed logging with the `tracing` feature:
    //!
    //! ```toml
    //! [dependencies]
    //! relay = { version = "0.1", features = ["client", "tracing"] }
    //! tracing-subscriber = "0.3"
    //! ```
    //!
    //! Each component emits structured logs at its key decision points:
    //!
    //! ```text
    //! INFO  circuit breaker state transition breaker="payment-service" from=Closed to=Open
    //! DEBUG retrying after failure retry="endpoint-call" attempt=1 delay=200ms
    //! TRACE permission denied, requeuing executor="api-client" task=3fae...
    //! TRACE cache miss, invoking producer cache_key=9f21...
    //! ```
}

/// Event system documentation
pub mod events {
    //! # Event System Guide
    //!
    //! Every component exposes `add_listener` for an [`relay_core::EventListener`]
    //! implementation, parallel to the `tracing`/`metrics` instrumentation
    //! but for callers that want to route state transitions into their own
    //! sink instead of (or in addition to) logs and metrics:
    //!
    //! ```rust,ignore
    //! struct LogToSink;
    //! impl relay_core::EventListener<relay_circuitbreaker::CircuitBreakerEvent> for LogToSink {
    //!     fn on_event(&self, event: &relay_circuitbreaker::CircuitBreakerEvent) {
    //!         // forward to an alerting system, a log sink, a test probe...
    //!     }
    //! }
    //!
    //! let mut breaker = CircuitBreaker::new(5, Duration::from_secs(30));
    //! breaker.add_listener(LogToSink);
    //! ```
    //!
    //! A listener that panics is caught so one misbehaving listener never
    //! prevents the others (or the pattern itself) from continuing.
}
