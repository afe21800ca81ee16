//! The two transport backends an [`crate::Endpoint`] can dispatch through.

use crate::config::EndpointConfig;
use crate::error::EndpointError;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Runs the call that HTTP/SDK retries wrap, given an already-assembled
/// payload and header map.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn call(
        &self,
        config: &EndpointConfig,
        payload: &Value,
        headers: &HashMap<String, String>,
    ) -> Result<Value, EndpointError>;

    /// Releases any resources the transport holds. Idempotent.
    async fn close(&self);
}

/// A pooled `reqwest::Client`, one per [`crate::Endpoint`].
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, EndpointError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EndpointError::Internal(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn call(
        &self,
        config: &EndpointConfig,
        payload: &Value,
        headers: &HashMap<String, String>,
    ) -> Result<Value, EndpointError> {
        let mut header_map = reqwest::header::HeaderMap::new();
        for (k, v) in headers {
            let name = reqwest::header::HeaderName::from_bytes(k.as_bytes())
                .map_err(|e| EndpointError::Validation(e.to_string()))?;
            let value = reqwest::header::HeaderValue::from_str(v)
                .map_err(|e| EndpointError::Validation(e.to_string()))?;
            header_map.insert(name, value);
        }

        let response = self
            .client
            .request(config.method.as_reqwest(), config.full_url())
            .headers(header_map)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EndpointError::from_status(status.as_u16(), body));
        }

        response.json::<Value>().await.map_err(EndpointError::from)
    }

    async fn close(&self) {
        // reqwest::Client has no explicit close; the connection pool is
        // torn down when the last clone drops.
    }
}

/// A stand-in for a vendor SDK client, dispatching by keyword the way the
/// original's OpenAI integration does: `"chat"` selects the chat
/// completion path, `"responses"` the responses API, `"embed"`
/// embeddings. No real vendor SDK is pulled in; this documents the seam a
/// concrete SDK client would plug into.
pub struct SdkTransport;

#[async_trait::async_trait]
impl Transport for SdkTransport {
    async fn call(
        &self,
        config: &EndpointConfig,
        payload: &Value,
        _headers: &HashMap<String, String>,
    ) -> Result<Value, EndpointError> {
        let path = &config.endpoint_path;
        let has_response_format = payload.get("response_format").is_some();

        let variant = if path.contains("chat") {
            if has_response_format {
                "chat.parse"
            } else {
                "chat.create"
            }
        } else if path.contains("responses") {
            if has_response_format {
                "responses.parse"
            } else {
                "responses.create"
            }
        } else if path.contains("embed") {
            "embeddings.create"
        } else {
            return Err(EndpointError::Config(format!(
                "sdk transport cannot dispatch endpoint_path {path:?}: expected a \
                 \"chat\", \"responses\", or \"embed\" keyword"
            )));
        };

        let mut stripped = payload.clone();
        if !has_response_format {
            if let Some(obj) = stripped.as_object_mut() {
                obj.remove("response_format");
            }
        }

        Ok(serde_json::json!({
            "sdk_variant": variant,
            "provider": config.provider,
            "echo": stripped,
        }))
    }

    async fn close(&self) {}
}
