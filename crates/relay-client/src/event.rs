//! The call event: the lifecycle object for one outbound request.
//!
//! Grounded on `khive/services/endpoint.py`'s `APICalling(Event)` and
//! `khive/protocols/event.py`'s `Event`/`to_log`. Where the original
//! composes `Identifiable + Embedable + Invokable` through multiple
//! inheritance, [`CallEvent`] implements the narrow
//! [`relay_core::identity`] traits directly on one struct.

use chrono::{DateTime, Utc};
use relay_core::identity::{Execution, Identity, Invokable, Temporal};
use relay_endpoint::Endpoint;
use relay_executor::rate_limited::TokenCost;
use serde_json::Value;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Where a call event is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventStatus::Pending => "PENDING",
            EventStatus::Processing => "PROCESSING",
            EventStatus::Completed => "COMPLETED",
            EventStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Returned by [`CallEvent::invoke`] only to propagate cancellation; every
/// other failure mode is recorded on the event itself and observed
/// through [`Execution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("call event invocation cancelled")]
pub struct Cancelled;

/// A flat record suitable for an external log sink (spec.md §4.8's
/// `to_log`).
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: EventStatus,
    pub duration: Option<Duration>,
    pub error: Option<String>,
    /// A compact, stable digest of `{request, response}`, not the raw
    /// payload — cheap to index or compare without shipping full bodies.
    pub content_digest: u64,
}

/// The lifecycle object for one outbound call through an [`Endpoint`].
///
/// Constructing one binds the target endpoint, request payload, and
/// optional cache control / extra headers, and sets `status = PENDING`.
/// [`CallEvent::invoke`] never returns an `Err` except to propagate
/// cancellation; any other failure is recorded as `error`/`status =
/// FAILED` on the event itself.
pub struct CallEvent {
    id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    status: EventStatus,
    request: Value,
    response: Option<Value>,
    error: Option<String>,
    duration: Option<Duration>,
    endpoint: Arc<Endpoint>,
    headers: Option<HashMap<String, String>>,
    cache_control: bool,
    required_tokens: Option<u64>,
    cancellation: CancellationToken,
}

impl CallEvent {
    /// Binds `request` to `endpoint`, ready to be appended to an executor.
    pub fn new(endpoint: Arc<Endpoint>, request: Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            status: EventStatus::Pending,
            request,
            response: None,
            error: None,
            duration: None,
            endpoint,
            headers: None,
            cache_control: false,
            required_tokens: None,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn with_cache_control(mut self, cache_control: bool) -> Self {
        self.cache_control = cache_control;
        self
    }

    /// Estimated cost consumed from a rate-limited executor's token
    /// budget ([`TokenCost`]), e.g. a request's expected token count.
    pub fn with_required_tokens(mut self, required_tokens: u64) -> Self {
        self.required_tokens = Some(required_tokens);
        self
    }

    /// A token observers can cancel to interrupt this call while it is
    /// in flight; shared with the surrounding executor scope.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn status(&self) -> EventStatus {
        self.status
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, EventStatus::Completed | EventStatus::Failed)
    }

    pub fn request(&self) -> &Value {
        &self.request
    }

    /// Produces a flat record for an external log sink.
    pub fn to_log(&self) -> LogRecord {
        LogRecord {
            id: self.id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            status: self.status,
            duration: self.duration,
            error: self.error.clone(),
            content_digest: self.content_digest(),
        }
    }

    fn content_digest(&self) -> u64 {
        let content = serde_json::json!({
            "request": self.request,
            "response": self.response,
        });
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        content.to_string().hash(&mut hasher);
        hasher.finish()
    }
}

impl Identity for CallEvent {
    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Temporal for CallEvent {
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Execution for CallEvent {
    fn duration(&self) -> Option<Duration> {
        self.duration
    }

    fn response(&self) -> Option<&Value> {
        self.response.as_ref()
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

impl TokenCost for CallEvent {
    fn required_tokens(&self) -> Option<u64> {
        self.required_tokens
    }
}

#[async_trait::async_trait]
impl Invokable for CallEvent {
    type Error = Cancelled;

    /// Calls the endpoint, recording start/end timing and the outcome.
    /// Per spec.md §4.8/§7, this resolves to `Ok(())` for every transport
    /// or application failure (recorded on the event as `error` +
    /// `status = FAILED`); it returns `Err(Cancelled)` only when the
    /// event's cancellation token fires, after marking the event FAILED.
    async fn invoke(&mut self) -> Result<(), Self::Error> {
        self.status = EventStatus::Processing;
        self.touch();
        let start = Instant::now();

        let outcome = tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => {
                self.duration = Some(start.elapsed());
                self.error = Some("call cancelled".to_string());
                self.status = EventStatus::Failed;
                self.touch();
                #[cfg(feature = "tracing")]
                tracing::warn!(call_id = %self.id, "invoke() canceled by external request");
                return Err(Cancelled);
            }
            result = self.endpoint.call(&self.request, self.headers.as_ref(), self.cache_control) => result,
        };

        self.duration = Some(start.elapsed());
        match outcome {
            Ok(response) => {
                self.response = Some(response);
                self.status = EventStatus::Completed;
            }
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::error!(call_id = %self.id, error = %err, "api call failed");
                self.error = Some(err.to_string());
                self.status = EventStatus::Failed;
            }
        }
        self.touch();
        Ok(())
    }

    fn mark_cancelled(&mut self) {
        self.error = Some("call cancelled".to_string());
        self.status = EventStatus::Failed;
        self.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_endpoint::credential::StaticCredentialProvider;
    use relay_endpoint::{EndpointConfig, TransportKind};

    fn endpoint() -> Arc<Endpoint> {
        let config = EndpointConfig::builder("n", "openai", "https://api.openai.com/v1", "/chat")
            .transport(TransportKind::Sdk)
            .build();
        let credentials = Arc::new(StaticCredentialProvider::new());
        Arc::new(Endpoint::new(config, credentials))
    }

    #[test]
    fn new_event_starts_pending() {
        let event = CallEvent::new(endpoint(), serde_json::json!({"model": "gpt-4"}));
        assert_eq!(event.status(), EventStatus::Pending);
        assert!(!event.is_terminal());
    }

    #[tokio::test]
    async fn invoke_completes_successfully_through_sdk_transport() {
        let ep = endpoint();
        let _guard = ep.enter().await.unwrap();
        let mut event = CallEvent::new(Arc::clone(&ep), serde_json::json!({"model": "gpt-4"}));
        event.invoke().await.unwrap();
        assert_eq!(event.status(), EventStatus::Completed);
        assert!(event.duration().is_some());
        assert!(event.response().is_some());
        assert!(event.error().is_none());
    }

    #[tokio::test]
    async fn invoke_without_enter_records_failure_not_err() {
        let ep = endpoint();
        let mut event = CallEvent::new(ep, serde_json::json!({}));
        let result = event.invoke().await;
        assert!(result.is_ok());
        assert_eq!(event.status(), EventStatus::Failed);
        assert!(event.error().is_some());
    }

    #[tokio::test]
    async fn cancellation_marks_failed_and_returns_cancelled() {
        let ep = endpoint();
        let _guard = ep.enter().await.unwrap();
        let mut event = CallEvent::new(Arc::clone(&ep), serde_json::json!({"model": "gpt-4"}));
        let token = event.cancellation_token();
        token.cancel();
        let result = event.invoke().await;
        assert!(result.is_err());
        assert_eq!(event.status(), EventStatus::Failed);
    }

    #[test]
    fn to_log_carries_identity_and_digest() {
        let event = CallEvent::new(endpoint(), serde_json::json!({"model": "gpt-4"}));
        let log = event.to_log();
        assert_eq!(log.id, event.id());
        assert_eq!(log.status, EventStatus::Pending);
    }
}
