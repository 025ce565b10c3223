//! Managed identity token source.
//!
//! Mints tokens from the platform identity endpoint without any stored
//! secret. Two endpoint flavours are supported:
//!
//! - **IMDS** (VMs, container hosts): `GET http://169.254.169.254/metadata/identity/oauth2/token`
//!   with a `Metadata: true` header.
//! - **App Service / Functions**: `GET $IDENTITY_ENDPOINT` with the
//!   `X-IDENTITY-HEADER: $IDENTITY_HEADER` header.
//!
//! Both take a single `resource` (the scope minus its `/.default` suffix) and
//! an optional `client_id` selecting a user-assigned identity.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::error::{RelayError, Result};
use crate::utils::string::preview;

use super::{CredentialProvider, TokenRequest};

/// Instance Metadata Service token endpoint.
pub const IMDS_TOKEN_URL: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";

/// Connect timeout for the identity endpoint. The overall bound is applied by
/// [`super::TimeoutCredential`].
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the identity endpoint lives and how to authenticate to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityEndpoint {
    Imds { url: String },
    AppService { url: String, header: String },
}

impl IdentityEndpoint {
    /// Pick the endpoint from the hosting environment.
    ///
    /// `IDENTITY_ENDPOINT` + `IDENTITY_HEADER` select App Service; anything
    /// else falls back to IMDS.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        match (lookup("IDENTITY_ENDPOINT"), lookup("IDENTITY_HEADER")) {
            (Some(url), Some(header)) if !url.is_empty() && !header.is_empty() => {
                IdentityEndpoint::AppService { url, header }
            }
            _ => IdentityEndpoint::Imds {
                url: IMDS_TOKEN_URL.to_string(),
            },
        }
    }

    fn url(&self) -> &str {
        match self {
            IdentityEndpoint::Imds { url } | IdentityEndpoint::AppService { url, .. } => url,
        }
    }

    fn api_version(&self) -> &'static str {
        match self {
            IdentityEndpoint::Imds { .. } => IMDS_API_VERSION,
            IdentityEndpoint::AppService { .. } => APP_SERVICE_API_VERSION,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IdentityTokenResponse {
    access_token: String,
}

/// Managed identity [`CredentialProvider`].
///
/// Requests without a `client_id` use `default_client_id`; when that is also
/// unset the host's system-assigned identity is used.
pub struct ManagedIdentityCredential {
    client: Client,
    endpoint: IdentityEndpoint,
    default_client_id: Option<String>,
}

impl ManagedIdentityCredential {
    pub fn new(endpoint: IdentityEndpoint, default_client_id: Option<String>) -> Result<Self> {
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint,
            default_client_id,
        })
    }

    /// Endpoint from the environment, default identity from config.
    pub fn from_env(default_client_id: Option<String>) -> Result<Self> {
        Self::new(IdentityEndpoint::from_env(), default_client_id)
    }

    /// Convert a scope to the identity endpoint's `resource` parameter.
    pub fn scope_to_resource(scope: &str) -> &str {
        scope.strip_suffix("/.default").unwrap_or(scope)
    }
}

#[async_trait]
impl CredentialProvider for ManagedIdentityCredential {
    fn name(&self) -> &str {
        "managed-identity"
    }

    async fn acquire(&self, request: &TokenRequest) -> Result<String> {
        let scope = match request.scopes.as_slice() {
            [single] => single,
            [] => return Err(RelayError::Credential("no scope requested".into())),
            _ => {
                return Err(RelayError::Credential(
                    "managed identity supports a single scope per request".into(),
                ))
            }
        };
        let resource = Self::scope_to_resource(scope);

        let mut query: Vec<(&str, &str)> = vec![
            ("api-version", self.endpoint.api_version()),
            ("resource", resource),
        ];
        let client_id = request
            .client_id
            .as_deref()
            .or(self.default_client_id.as_deref());
        if let Some(id) = client_id {
            query.push(("client_id", id));
        }
        if let Some(tenant) = request.tenant_id.as_deref() {
            // The identity endpoint always mints in the host's tenant.
            debug!(tenant_id = tenant, "Ignoring tenant hint for managed identity");
        }

        let builder = self.client.get(self.endpoint.url()).query(&query);
        let builder = match &self.endpoint {
            IdentityEndpoint::Imds { .. } => builder.header("Metadata", "true"),
            IdentityEndpoint::AppService { header, .. } => {
                builder.header("X-IDENTITY-HEADER", header.as_str())
            }
        };

        debug!(resource, client_id = ?client_id, "Requesting managed identity token");

        let response = builder
            .send()
            .await
            .map_err(|e| RelayError::Credential(format!("identity endpoint unreachable: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RelayError::Credential(format!("identity response unreadable: {}", e)))?;

        if !status.is_success() {
            return Err(RelayError::Credential(format!(
                "identity endpoint returned {}: {}",
                status.as_u16(),
                preview(&body, 200)
            )));
        }

        let parsed: IdentityTokenResponse = serde_json::from_str(&body)
            .map_err(|e| RelayError::Credential(format!("malformed identity response: {}", e)))?;
        Ok(parsed.access_token)
    }
}
