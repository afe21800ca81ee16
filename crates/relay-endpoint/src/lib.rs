//! A scoped outbound endpoint: payload assembly, credential resolution,
//! transport dispatch, and guaranteed client teardown.
//!
//! [`Endpoint`] wraps one [`EndpointConfig`] plus the collaborators a call
//! needs (a [`CredentialProvider`], an optional [`relay_cache::InMemoryCache`]).
//! The transport client is constructed lazily the first time
//! [`Endpoint::enter`] is called and torn down exactly once when the
//! returned [`EndpointGuard`] is closed — explicitly via
//! [`EndpointGuard::close`], or as a best-effort fallback from `Drop` if
//! the caller's scope unwound without closing it.

pub mod config;
pub mod credential;
pub mod error;
pub mod transport;

pub use config::{EndpointConfig, EndpointConfigBuilder, Method, Transport as TransportKind};
pub use credential::{CredentialProvider, EnvCredentialProvider, StaticCredentialProvider};
pub use error::EndpointError;
pub use transport::{HttpTransport, SdkTransport, Transport};

use relay_cache::InMemoryCache;
use relay_retry::{Retry, RetryPolicy};
use secrecy::ExposeSecret;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// A request payload failed the optional declared-schema check wired
/// through [`Endpoint::with_validator`].
pub type Validator = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// A scoped outbound endpoint.
///
/// Cheap to wrap in an `Arc` and share across many [`crate`] callers; the
/// transport client itself is exclusively owned by this instance (spec.md
/// §5's "no cross-endpoint sharing").
pub struct Endpoint {
    config: EndpointConfig,
    credentials: Arc<dyn CredentialProvider>,
    cache: Option<Arc<InMemoryCache>>,
    cache_ttl: Duration,
    validator: Option<Validator>,
    transport: Mutex<Option<Arc<dyn Transport>>>,
}

/// Default TTL used for cached responses when a caller sets
/// `cache_control=true` but no explicit TTL was configured.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

impl Endpoint {
    /// Builds an endpoint bound to `config`, resolving `api_key_ref`
    /// through `credentials` at call time.
    pub fn new(config: EndpointConfig, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            config,
            credentials,
            cache: None,
            cache_ttl: DEFAULT_CACHE_TTL,
            validator: None,
            transport: Mutex::new(None),
        }
    }

    /// Wires an in-memory cache used when a caller sets
    /// `cache_control=true` on [`Endpoint::call`].
    pub fn with_cache(mut self, cache: Arc<InMemoryCache>, ttl: Duration) -> Self {
        self.cache = Some(cache);
        self.cache_ttl = ttl;
        self
    }

    /// Installs a request-payload validator, the Rust stand-in for
    /// "validate against the endpoint's declared request schema (if
    /// any)" (spec.md §4.7). Returning `Err` surfaces as
    /// [`EndpointError::Validation`].
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// The endpoint's configuration.
    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// Lazily constructs the transport client (if this is the first call
    /// since construction or the last [`EndpointGuard::close`]) and
    /// returns a scope guard whose closure releases it. Calling `enter`
    /// again before closing reuses the already-constructed client.
    pub async fn enter(self: &Arc<Self>) -> Result<EndpointGuard, EndpointError> {
        self.ensure_transport().await?;
        Ok(EndpointGuard {
            endpoint: Arc::clone(self),
            closed: false,
        })
    }

    /// Releases the transport client, if one is constructed. Idempotent:
    /// calling `close` with no live client is a no-op.
    pub async fn close(&self) {
        let transport = self.transport.lock().await.take();
        if let Some(transport) = transport {
            transport.close().await;
        }
    }

    async fn ensure_transport(&self) -> Result<Arc<dyn Transport>, EndpointError> {
        let mut guard = self.transport.lock().await;
        if let Some(transport) = guard.as_ref() {
            return Ok(Arc::clone(transport));
        }
        let transport: Arc<dyn Transport> = match self.config.transport {
            config::Transport::Http => Arc::new(HttpTransport::new(self.config.timeout())?),
            config::Transport::Sdk => Arc::new(SdkTransport),
        };
        *guard = Some(Arc::clone(&transport));
        Ok(transport)
    }

    /// Merges defaults, caller extras, and the resolved credential header
    /// into a `(payload, headers)` pair, substituting the literal
    /// `$API_KEY` token in `auth_template` values.
    pub fn create_payload(
        &self,
        request: &Value,
        extra_headers: Option<&HashMap<String, String>>,
    ) -> Result<(Value, HashMap<String, String>), EndpointError> {
        let mut headers = self.config.default_headers.clone();
        if let Some(extra) = extra_headers {
            headers.extend(extra.clone());
        }

        if !self.config.auth_template.is_empty() {
            let secret = match &self.config.api_key_ref {
                Some(api_key_ref) => Some(self.credentials.resolve(api_key_ref)?),
                None => None,
            };
            for (key, template) in &self.config.auth_template {
                let value = if template.contains("$API_KEY") {
                    let secret = secret.as_ref().ok_or_else(|| {
                        EndpointError::Config(format!(
                            "auth header {key:?} references $API_KEY but no api_key_ref is configured"
                        ))
                    })?;
                    template.replace("$API_KEY", secret.expose_secret())
                } else {
                    template.clone()
                };
                headers.insert(key.clone(), value);
            }
        }

        let mut params = Map::new();
        for (k, v) in &self.config.extra {
            params.insert(k.clone(), v.clone());
        }
        match request {
            Value::Object(map) => {
                for (k, v) in map {
                    params.insert(k.clone(), v.clone());
                }
            }
            Value::Null => {}
            other => {
                return Err(EndpointError::Validation(format!(
                    "request payload must be a JSON object, got {other}"
                )));
            }
        }
        let payload = Value::Object(params);

        if let Some(validator) = &self.validator {
            validator(&payload).map_err(EndpointError::Validation)?;
        }

        Ok((payload, headers))
    }

    /// Assembles the payload, then executes it through the transport,
    /// retrying transport/server failures with exponential backoff
    /// (`2^k` seconds, per spec.md §4.7), optionally resolving from cache
    /// when `cache_control` is set.
    pub async fn call(
        &self,
        request: &Value,
        extra_headers: Option<&HashMap<String, String>>,
        cache_control: bool,
    ) -> Result<Value, EndpointError> {
        let (payload, headers) = self.create_payload(request, extra_headers)?;

        let transport = {
            let guard = self.transport.lock().await;
            guard.as_ref().cloned().ok_or_else(|| {
                EndpointError::Config(
                    "endpoint is not entered; call Endpoint::enter before Endpoint::call".into(),
                )
            })?
        };

        let retry = Retry::new(
            RetryPolicy::new(self.config.max_retries).retry_on(|err: &EndpointError| {
                matches!(err, EndpointError::Transport(_) | EndpointError::Server(_))
            }),
            Duration::from_secs(1),
            Duration::from_secs(60),
            2.0,
            false,
        )
        .with_name(self.config.name.clone());

        let config = self.config.clone();
        let op = move || {
            let transport = Arc::clone(&transport);
            let config = config.clone();
            let payload = payload.clone();
            let headers = headers.clone();
            async move { transport.call(&config, &payload, &headers).await }
        };

        if cache_control {
            let cache = self.cache.as_ref().ok_or_else(|| {
                EndpointError::Config("cache_control=true but no cache is configured".into())
            })?;
            let header_map: BTreeMap<String, String> =
                op_headers_snapshot(&self.config, extra_headers);
            let key = relay_cache::fingerprint(&payload_snapshot(&self.config, request)?, &header_map);
            let producer = move || async move { retry.execute(op).await };
            cache.get_or_set(key, producer, self.cache_ttl).await
        } else {
            retry.execute(op).await
        }
    }
}

/// Recomputes the `(payload, headers)` pair purely to build a cache
/// fingerprint ahead of the retry-wrapped call, without resolving
/// credentials twice for the retry path itself (the fingerprint only
/// needs a stable key, not the literal resolved secret).
fn payload_snapshot(config: &EndpointConfig, request: &Value) -> Result<Value, EndpointError> {
    let mut params = Map::new();
    for (k, v) in &config.extra {
        params.insert(k.clone(), v.clone());
    }
    if let Value::Object(map) = request {
        for (k, v) in map {
            params.insert(k.clone(), v.clone());
        }
    }
    Ok(Value::Object(params))
}

fn op_headers_snapshot(
    config: &EndpointConfig,
    extra_headers: Option<&HashMap<String, String>>,
) -> BTreeMap<String, String> {
    let mut headers: BTreeMap<String, String> = config
        .default_headers
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if let Some(extra) = extra_headers {
        for (k, v) in extra {
            headers.insert(k.clone(), v.clone());
        }
    }
    headers
}

/// An RAII scope guard returned by [`Endpoint::enter`].
///
/// Call [`EndpointGuard::close`] to release the transport client
/// deterministically. If the guard is dropped without being closed (an
/// early return, a panic, a cancelled task), `Drop` spawns the same
/// close on the runtime as a best-effort fallback so the endpoint never
/// leaks an open client past the guard's lifetime.
pub struct EndpointGuard {
    endpoint: Arc<Endpoint>,
    closed: bool,
}

impl EndpointGuard {
    /// Releases the transport client. Idempotent: closing twice (or
    /// closing after `Drop` already ran the fallback) is a no-op.
    pub async fn close(mut self) {
        self.endpoint.close().await;
        self.closed = true;
    }

    /// The endpoint this guard holds open.
    pub fn endpoint(&self) -> &Arc<Endpoint> {
        &self.endpoint
    }
}

impl Drop for EndpointGuard {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let endpoint = Arc::clone(&self.endpoint);
        // Best effort: runs only if a runtime is still around to poll it.
        // `Endpoint::close` is idempotent, so a caller that already
        // awaited `EndpointGuard::close` never observes a second effect.
        let _ = tokio::runtime::Handle::try_current().map(|handle| {
            handle.spawn(async move {
                endpoint.close().await;
            })
        });
    }
}
