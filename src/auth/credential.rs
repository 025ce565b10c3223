//! Credential provider abstraction.
//!
//! A [`CredentialProvider`] mints bearer tokens for a set of scopes. One
//! instance is constructed at startup and shared; the identity to mint with is
//! chosen per request via [`TokenRequest::client_id`].

use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

use crate::error::{RelayError, Result};

/// One or more token scopes.
///
/// Accepts a single scope or an explicit set; both normalize to a list.
///
/// ```
/// use agentrelay::auth::Scopes;
///
/// let one: Scopes = "https://graph.microsoft.com/.default".into();
/// let many: Scopes = vec!["a/.default", "b/.default"].into();
/// assert_eq!(one.as_slice().len(), 1);
/// assert_eq!(many.as_slice().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Scopes(Vec<String>);

impl Scopes {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<&str> for Scopes {
    fn from(scope: &str) -> Self {
        Scopes(vec![scope.to_string()])
    }
}

impl From<String> for Scopes {
    fn from(scope: String) -> Self {
        Scopes(vec![scope])
    }
}

impl From<Vec<String>> for Scopes {
    fn from(scopes: Vec<String>) -> Self {
        Scopes(scopes)
    }
}

impl From<Vec<&str>> for Scopes {
    fn from(scopes: Vec<&str>) -> Self {
        Scopes(scopes.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for Scopes {
    fn from(scopes: &[&str]) -> Self {
        Scopes(scopes.iter().map(|s| s.to_string()).collect())
    }
}

/// A token acquisition request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    pub scopes: Scopes,
    /// Tenant to mint the token in, when the backend supports it.
    pub tenant_id: Option<String>,
    /// Identity to mint with. `None` selects the provider's default identity.
    pub client_id: Option<String>,
}

impl TokenRequest {
    pub fn new(scopes: impl Into<Scopes>) -> Self {
        Self {
            scopes: scopes.into(),
            tenant_id: None,
            client_id: None,
        }
    }

    pub fn with_tenant(mut self, tenant_id: Option<&str>) -> Self {
        self.tenant_id = tenant_id.map(str::to_string);
        self
    }

    pub fn with_client_id(mut self, client_id: Option<&str>) -> Self {
        self.client_id = client_id.map(str::to_string);
        self
    }
}

/// Source of bearer tokens.
///
/// Implementations fail with [`RelayError::Credential`] when the identity
/// backend is unreachable or refuses the requested scopes.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    async fn acquire(&self, request: &TokenRequest) -> Result<String>;
}

/// Bounds every acquisition of an inner provider.
///
/// A timeout surfaces as [`RelayError::Credential`], so it takes part in the
/// resolver's fallback like any other acquisition failure.
pub struct TimeoutCredential<P> {
    inner: P,
    timeout: Duration,
}

impl<P: CredentialProvider> TimeoutCredential<P> {
    pub fn new(inner: P, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<P: CredentialProvider> CredentialProvider for TimeoutCredential<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn acquire(&self, request: &TokenRequest) -> Result<String> {
        match tokio::time::timeout(self.timeout, self.inner.acquire(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    provider = self.inner.name(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Token acquisition timed out"
                );
                Err(RelayError::Credential(format!(
                    "token acquisition timed out after {} ms",
                    self.timeout.as_millis()
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowCredential;

    #[async_trait]
    impl CredentialProvider for SlowCredential {
        fn name(&self) -> &str {
            "slow"
        }

        async fn acquire(&self, _request: &TokenRequest) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".into())
        }
    }

    struct FastCredential;

    #[async_trait]
    impl CredentialProvider for FastCredential {
        fn name(&self) -> &str {
            "fast"
        }

        async fn acquire(&self, request: &TokenRequest) -> Result<String> {
            Ok(format!("token-for-{}", request.scopes.as_slice().join(",")))
        }
    }

    #[test]
    fn test_scopes_from_single_string() {
        let scopes: Scopes = String::from("x/.default").into();
        assert_eq!(scopes.into_vec(), vec!["x/.default".to_string()]);
    }

    #[test]
    fn test_scopes_from_slice() {
        let scopes: Scopes = (&["a", "b"][..]).into();
        assert_eq!(scopes.as_slice(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_token_request_builder() {
        let req = TokenRequest::new("s")
            .with_tenant(Some("t"))
            .with_client_id(None);
        assert_eq!(req.tenant_id.as_deref(), Some("t"));
        assert!(req.client_id.is_none());
    }

    #[tokio::test]
    async fn test_timeout_credential_times_out() {
        let provider = TimeoutCredential::new(SlowCredential, Duration::from_millis(20));
        let err = provider.acquire(&TokenRequest::new("s")).await.unwrap_err();
        assert!(matches!(err, RelayError::Credential(_)));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_timeout_credential_passes_through() {
        let provider = TimeoutCredential::new(FastCredential, Duration::from_secs(1));
        let token = provider.acquire(&TokenRequest::new("s")).await.unwrap();
        assert_eq!(token, "token-for-s");
        assert_eq!(provider.name(), "fast");
    }
}
