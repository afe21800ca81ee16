//! Endpoint configuration: every field spec.md §3 enumerates, assembled
//! through a builder rather than a constructor with many positional
//! arguments.

use std::collections::HashMap;
use std::time::Duration;

/// Which transport a call goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// A pooled `reqwest` HTTP client.
    Http,
    /// A vendor SDK, dispatched by a keyword in `endpoint_path` (stubbed).
    Sdk,
}

/// HTTP method for [`Transport::Http`] calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub(crate) fn as_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Default per-call timeout, in seconds, matching the original's default.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 600;

/// Default retry attempts for the endpoint's own HTTP retry loop.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Configuration for one outbound endpoint.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub name: String,
    pub provider: String,
    pub transport: Transport,
    pub base_url: String,
    pub endpoint_path: String,
    pub path_params: Option<Vec<String>>,
    pub method: Method,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub default_headers: HashMap<String, String>,
    pub auth_template: HashMap<String, String>,
    pub api_key_ref: Option<String>,
    pub openai_compatible: bool,
    pub extra: HashMap<String, serde_json::Value>,
}

impl EndpointConfig {
    /// Starts a builder for `name`/`provider`/`base_url`/`endpoint_path`,
    /// the four fields with no sensible default.
    pub fn builder(
        name: impl Into<String>,
        provider: impl Into<String>,
        base_url: impl Into<String>,
        endpoint_path: impl Into<String>,
    ) -> EndpointConfigBuilder {
        EndpointConfigBuilder {
            name: name.into(),
            provider: provider.into(),
            base_url: base_url.into(),
            endpoint_path: endpoint_path.into(),
            transport: Transport::Http,
            path_params: None,
            method: Method::Post,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            max_retries: DEFAULT_MAX_RETRIES,
            default_headers: HashMap::from([(
                "content-type".to_string(),
                "application/json".to_string(),
            )]),
            auth_template: HashMap::from([(
                "Authorization".to_string(),
                "Bearer $API_KEY".to_string(),
            )]),
            api_key_ref: None,
            openai_compatible: false,
            extra: HashMap::new(),
        }
    }

    /// The per-call timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// `base_url` joined with `endpoint_path`, substituting any
    /// `path_params` placeholders of the form `{name}`.
    pub fn full_url(&self) -> String {
        let mut path = self.endpoint_path.clone();
        if let Some(params) = &self.path_params {
            for param in params {
                let placeholder = format!("{{{param}}}");
                if let Some(value) = self.extra.get(param).and_then(|v| v.as_str()) {
                    path = path.replace(&placeholder, value);
                }
            }
        }
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Builds an [`EndpointConfig`] field by field.
#[derive(Debug, Clone)]
pub struct EndpointConfigBuilder {
    name: String,
    provider: String,
    base_url: String,
    endpoint_path: String,
    transport: Transport,
    path_params: Option<Vec<String>>,
    method: Method,
    timeout_seconds: u64,
    max_retries: u32,
    default_headers: HashMap<String, String>,
    auth_template: HashMap<String, String>,
    api_key_ref: Option<String>,
    openai_compatible: bool,
    extra: HashMap<String, serde_json::Value>,
}

impl EndpointConfigBuilder {
    pub fn transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    pub fn path_params(mut self, params: Vec<String>) -> Self {
        self.path_params = Some(params);
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn default_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.default_headers = headers;
        self
    }

    pub fn auth_template(mut self, template: HashMap<String, String>) -> Self {
        self.auth_template = template;
        self
    }

    /// Opaque handle resolved by a [`crate::CredentialProvider`] at call
    /// time. Never logged; the resolved secret lives only in a
    /// [`secrecy::SecretString`].
    pub fn api_key_ref(mut self, api_key_ref: impl Into<String>) -> Self {
        self.api_key_ref = Some(api_key_ref.into());
        self
    }

    pub fn openai_compatible(mut self, openai_compatible: bool) -> Self {
        self.openai_compatible = openai_compatible;
        self
    }

    pub fn extra(mut self, extra: HashMap<String, serde_json::Value>) -> Self {
        self.extra = extra;
        self
    }

    pub fn build(self) -> EndpointConfig {
        EndpointConfig {
            name: self.name,
            provider: self.provider,
            transport: self.transport,
            base_url: self.base_url,
            endpoint_path: self.endpoint_path,
            path_params: self.path_params,
            method: self.method,
            timeout_seconds: self.timeout_seconds,
            max_retries: self.max_retries,
            default_headers: self.default_headers,
            auth_template: self.auth_template,
            api_key_ref: self.api_key_ref,
            openai_compatible: self.openai_compatible,
            extra: self.extra,
        }
    }
}
