//! The rate-limited API client facade: submits a [`CallEvent`] through a
//! [`relay_executor::rate_limited::RateLimitedExecutor`] bound to a single
//! [`relay_endpoint::Endpoint`], and waits for it to reach a terminal
//! state.
//!
//! Grounded on `khive/services/endpoint.py`'s `iModel.invoke`, generalized
//! from its single-shot semaphore+limiter form into the full
//! ENTER → CONFIGURE → SUBMIT → DRAIN → RETURN state machine: `new`
//! performs ENTER (endpoint + executor scope) and CONFIGURE (limiter
//! setup), `invoke` performs SUBMIT (append + forward) and DRAIN (poll
//! for a terminal event with a bounded budget), then RETURN.

pub mod as_event;
pub mod event;

pub use as_event::{as_event as wrap_as_event, BoxFuture, GenericEvent};
pub use event::{CallEvent, Cancelled, EventStatus, LogRecord};

use relay_core::error::ApiClientError;
use relay_endpoint::{Endpoint, EndpointGuard};
use relay_executor::rate_limited::RateLimitedExecutor;
use serde_json::Value;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

/// The error type surfaced synchronously by [`ApiClient::new`]/[`ApiClient::invoke`].
/// No application-level callback runs inside this facade, so the
/// `Application` variant of [`ApiClientError`] is uninhabited here.
pub type ClientError = ApiClientError<Infallible>;

/// How many times [`ApiClient::invoke`]'s DRAIN loop polls for a terminal
/// event before giving up, per spec.md §9 ("up to 1000 iterations with a
/// 0.1 s yield" — named here rather than hand-waved).
pub const DEFAULT_MAX_POLL_ITERATIONS: u32 = 1000;

/// The yield between DRAIN polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Construction-time limits for an [`ApiClient`]'s rate-limited executor.
#[derive(Debug, Clone)]
pub struct ApiClientOptions {
    pub name: Option<String>,
    pub max_concurrency: Option<usize>,
    pub queue_capacity: usize,
    pub limit_interval: Duration,
    pub request_limit: Option<u64>,
    pub token_limit: Option<u64>,
}

impl Default for ApiClientOptions {
    /// Mirrors `iModel`'s defaults: `request_limit=100`,
    /// `concurrency_limit=20`, `limit_interval=60s`.
    fn default() -> Self {
        Self {
            name: None,
            max_concurrency: Some(20),
            queue_capacity: 1024,
            limit_interval: Duration::from_secs(60),
            request_limit: Some(100),
            token_limit: None,
        }
    }
}

/// Per-call overrides for [`ApiClient::invoke`].
#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    pub headers: Option<HashMap<String, String>>,
    pub cache_control: bool,
    pub required_tokens: Option<u64>,
}

/// The API client facade (spec.md §4.9, component C9).
pub struct ApiClient {
    endpoint: Arc<Endpoint>,
    endpoint_guard: Option<EndpointGuard>,
    rate_limited: RateLimitedExecutor<CallEvent>,
    max_poll_iterations: u32,
    poll_interval: Duration,
}

impl ApiClient {
    /// ENTER + CONFIGURE: enters the endpoint's scope, builds the
    /// rate-limited executor from `options`, and starts it. The returned
    /// client owns both scopes for its lifetime; [`ApiClient::shutdown`]
    /// tears them down deterministically, or they fall back to a
    /// best-effort release on drop.
    pub async fn new(endpoint: Arc<Endpoint>, options: ApiClientOptions) -> Result<Self, ClientError> {
        let endpoint_guard = endpoint
            .enter()
            .await
            .map_err(|err| ClientError::Config(err.to_string()))?;

        let name = options.name.clone().unwrap_or_else(|| "api_client".to_string());
        let rate_limited: RateLimitedExecutor<CallEvent> = RateLimitedExecutor::new(
            options.max_concurrency,
            options.queue_capacity,
            options.limit_interval,
            options.request_limit,
            options.token_limit,
        )
        .with_name(name);
        rate_limited.enter();

        Ok(Self {
            endpoint,
            endpoint_guard: Some(endpoint_guard),
            rate_limited,
            max_poll_iterations: DEFAULT_MAX_POLL_ITERATIONS,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Overrides the DRAIN loop's poll budget (defaults to
    /// [`DEFAULT_MAX_POLL_ITERATIONS`] / [`DEFAULT_POLL_INTERVAL`]).
    pub fn with_poll_budget(mut self, max_iterations: u32, interval: Duration) -> Self {
        self.max_poll_iterations = max_iterations;
        self.poll_interval = interval;
        self
    }

    /// SUBMIT + DRAIN + RETURN: builds a [`CallEvent`] for `request`,
    /// appends it to the rate-limited executor, and polls until it
    /// reaches a terminal status or the poll budget is exhausted.
    ///
    /// Returns the event itself (never the raw response), so the caller
    /// reads `status`/`error`/`duration`/`response` uniformly whether the
    /// call succeeded, failed, or was cancelled. Only a budget exhaustion
    /// surfaces as `Err`; the event still records its last known status.
    pub async fn invoke(&self, request: Value, opts: InvokeOptions) -> Result<CallEvent, ClientError> {
        let mut event = CallEvent::new(Arc::clone(&self.endpoint), request)
            .with_cache_control(opts.cache_control);
        if let Some(headers) = opts.headers {
            event = event.with_headers(headers);
        }
        if let Some(tokens) = opts.required_tokens {
            event = event.with_required_tokens(tokens);
        }

        let id = self.rate_limited.append(event).await;

        for _ in 0..self.max_poll_iterations {
            if let Some(finished) = self.rate_limited.pop(id).await {
                return Ok(finished);
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        Err(ClientError::Timeout(self.poll_interval * self.max_poll_iterations))
    }

    /// Stops the rate-limited executor (replenisher + queue) and closes
    /// the endpoint's transport, in that order. Safe to call at most
    /// once; a client that is simply dropped instead releases both
    /// through their own best-effort `Drop` fallbacks.
    pub async fn shutdown(mut self) {
        self.rate_limited.exit().await;
        if let Some(guard) = self.endpoint_guard.take() {
            guard.close().await;
        }
    }
}
