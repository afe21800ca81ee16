//! Credential resolution. `api_key_ref` is an opaque handle; resolving it
//! to an actual secret is delegated to a [`CredentialProvider`] so callers
//! can back it with an environment variable, a vault lookup, or a test
//! double without the endpoint knowing the difference.

use crate::error::EndpointError;
use secrecy::SecretString;
use std::collections::HashMap;

/// Resolves an opaque `api_key_ref` to a secret. Implementations must
/// never `Display`/log the returned value; wrapping it in
/// [`secrecy::SecretString`] makes that a compile-time property rather
/// than a convention.
pub trait CredentialProvider: Send + Sync {
    /// Resolves `api_key_ref`, or fails with [`EndpointError::Config`] if
    /// it is unknown.
    fn resolve(&self, api_key_ref: &str) -> Result<SecretString, EndpointError>;
}

/// A [`CredentialProvider`] backed by a static in-memory map, the same
/// role the teacher's tests play for injecting fixed credentials.
#[derive(Default)]
pub struct StaticCredentialProvider {
    credentials: HashMap<String, SecretString>,
}

impl StaticCredentialProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, api_key_ref: impl Into<String>, secret: impl Into<String>) -> Self {
        self.credentials
            .insert(api_key_ref.into(), SecretString::from(secret.into()));
        self
    }
}

impl CredentialProvider for StaticCredentialProvider {
    fn resolve(&self, api_key_ref: &str) -> Result<SecretString, EndpointError> {
        self.credentials
            .get(api_key_ref)
            .cloned()
            .ok_or_else(|| EndpointError::Config(format!("unknown api_key_ref: {api_key_ref}")))
    }
}

/// A [`CredentialProvider`] that resolves `api_key_ref` against an
/// environment variable of the same name, falling back to treating the
/// ref itself as the literal secret — mirroring the original's
/// `getenv(api_key, api_key)` fallback.
pub struct EnvCredentialProvider;

impl CredentialProvider for EnvCredentialProvider {
    fn resolve(&self, api_key_ref: &str) -> Result<SecretString, EndpointError> {
        let value = std::env::var(api_key_ref).unwrap_or_else(|_| api_key_ref.to_string());
        Ok(SecretString::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn static_provider_resolves_known_ref() {
        let provider = StaticCredentialProvider::new().with("openai", "sk-test-123");
        let secret = provider.resolve("openai").unwrap();
        assert_eq!(secret.expose_secret(), "sk-test-123");
    }

    #[test]
    fn static_provider_rejects_unknown_ref() {
        let provider = StaticCredentialProvider::new();
        assert!(provider.resolve("missing").is_err());
    }

    #[test]
    fn env_provider_falls_back_to_literal_ref() {
        let provider = EnvCredentialProvider;
        let secret = provider.resolve("RELAY_TEST_DOES_NOT_EXIST_XYZ").unwrap();
        assert_eq!(secret.expose_secret(), "RELAY_TEST_DOES_NOT_EXIST_XYZ");
    }
}
