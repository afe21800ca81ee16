//! Rate-limited, concurrency-bounded, resilient request execution for
//! outbound calls to AI/search/reader services.
//!
//! `relay` is the meta-crate over the component crates that together make
//! up the request-execution core: a token-bucket rate limiter, a circuit
//! breaker, retry-with-backoff, a bounded task queue, a concurrency-bounded
//! executor, a rate-limited executor composing those two, a scoped
//! outbound endpoint (HTTP or a stubbed SDK transport), the call-event
//! lifecycle object, and the API client facade that ties all of the above
//! into one `invoke(request)` call. Each component is its own crate so a
//! caller who only needs, say, the circuit breaker can depend on just
//! `relay-circuitbreaker` instead of the whole stack; this crate exists to
//! re-export all of them behind one dependency and one feature set for the
//! common case of wanting the whole facade.
//!
//! # Quick Start
//!
//! ```toml
//! [dependencies]
//! relay = { version = "0.1", features = ["client"] }
//! ```
//!
//! # Components
//!
//! - **[Rate limiter](relay_ratelimiter)** — token-bucket limiter bounding call rate, bursts up to a configured capacity.
//! - **[Circuit breaker](relay_circuitbreaker)** — trips after a run of failures, rejects calls while open, admits one probe in half-open.
//! - **[Retry](relay_retry)** — re-runs a failed operation with exponential backoff, optional jitter, and per-error-kind filtering.
//! - **[Executor](relay_executor)** — bounded task queue plus a concurrency-capped runner, composed into a rate-limited executor with per-interval request/token budgets.
//! - **[Cache](relay_cache)** — in-memory TTL cache keyed by a payload/header fingerprint, used when a caller opts a call into `cache_control`.
//! - **[Endpoint](relay_endpoint)** — a scoped outbound transport (HTTP via `reqwest`, or a keyword-dispatched SDK stub) with guaranteed client teardown.
//! - **[Client](relay_client)** — the call-event lifecycle object and the `ApiClient` facade that submits work and waits for a terminal event.
//!
//! # Composing the full stack
//!
//! The facade's own composition order mirrors how the component crates
//! nest: a call event is appended to a rate-limited executor (token
//! bucket + bounded queue + concurrency cap), which dequeues it once
//! permitted and runs it through the endpoint, whose own retry loop wraps
//! the transport call.
//!
//! ```rust,no_run
//! # #[cfg(feature = "client")]
//! # {
//! use relay::client::{ApiClient, ApiClientOptions, InvokeOptions};
//! use relay::endpoint::credential::StaticCredentialProvider;
//! use relay::endpoint::{Endpoint, EndpointConfig, TransportKind};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EndpointConfig::builder("chat", "openai", "https://api.openai.com/v1", "/chat/completions")
//!     .transport(TransportKind::Sdk)
//!     .build();
//! let credentials = Arc::new(StaticCredentialProvider::new().with("openai", "sk-..."));
//! let endpoint = Arc::new(Endpoint::new(config, credentials));
//!
//! let client = ApiClient::new(endpoint, ApiClientOptions::default()).await?;
//! let event = client
//!     .invoke(serde_json::json!({"model": "gpt-4", "messages": []}), InvokeOptions::default())
//!     .await?;
//! println!("{:?} in {:?}", event.status(), event.duration());
//! client.shutdown().await;
//! # Ok(())
//! # }
//! # }
//! ```
//!
//! A caller that wants to wrap a breaker or an extra retry policy around
//! the call composes them explicitly around the operation passed to
//! [`relay_circuitbreaker::CircuitBreaker::execute`] /
//! [`relay_retry::Retry::execute`] — see `examples/combined.rs` in this
//! crate for a worked composition, and `examples/full_stack.rs` for every
//! component wired together end to end.
//!
//! # Observability
//!
//! Every component crate is instrumented the same way: a `tracing`
//! feature for structured logs at state transitions, rejections, and
//! replenishment cycles, and a `metrics` feature for `metrics`-crate
//! counters/gauges/histograms, labeled by the pattern's configured name.
//! Enabling `relay`'s own `tracing`/`metrics` features forwards them to
//! every enabled component crate.

// Re-export core (always available): shared error taxonomy and event system.
pub use relay_core as core;

#[cfg(feature = "ratelimiter")]
pub use relay_ratelimiter as ratelimiter;

#[cfg(feature = "circuitbreaker")]
pub use relay_circuitbreaker as circuitbreaker;

#[cfg(feature = "retry")]
pub use relay_retry as retry;

#[cfg(feature = "executor")]
pub use relay_executor as executor;

#[cfg(feature = "cache")]
pub use relay_cache as cache;

#[cfg(feature = "endpoint")]
pub use relay_endpoint as endpoint;

#[cfg(feature = "client")]
pub use relay_client as client;

pub mod observability;
