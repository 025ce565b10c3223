//! Per-message bearer token selection.
//!
//! Priority order:
//! 1. a session token delegated by the channel on the inbound activity;
//! 2. a managed identity token for the agent loop audience
//!    (`<endpoint>/.default`), minted with the agent-loop identity;
//! 3. one fallback attempt for [`FALLBACK_SCOPE`] with the default identity.
//!
//! When both 2 and 3 fail, the error from 2 is returned.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::bus::InboundActivity;
use crate::config::{Config, FALLBACK_SCOPE};
use crate::error::{RelayError, Result};
use crate::utils::string::token_fingerprint;

use super::{CredentialProvider, TokenRequest};

/// Which step produced the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Session,
    Primary,
    Fallback,
}

/// A bearer token chosen for one message.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedToken {
    pub token: String,
    pub source: TokenSource,
}

impl fmt::Debug for ResolvedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedToken")
            .field("token", &token_fingerprint(&self.token))
            .field("source", &self.source)
            .finish()
    }
}

pub struct TokenResolver {
    credentials: Arc<dyn CredentialProvider>,
    /// `<endpoint>/.default`, absent when no endpoint is configured
    primary_scope: Option<String>,
    /// Identity for the primary audience (`LOGIC_APP_CLIENT_ID`, else `CLIENT_ID`)
    primary_client_id: Option<String>,
    /// Default identity (`CLIENT_ID`), used for the fallback audience
    default_client_id: Option<String>,
}

impl TokenResolver {
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        primary_scope: Option<String>,
        primary_client_id: Option<String>,
        default_client_id: Option<String>,
    ) -> Self {
        Self {
            credentials,
            primary_scope,
            primary_client_id,
            default_client_id,
        }
    }

    pub fn from_config(config: &Config, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self::new(
            credentials,
            config.logic_app.scope(),
            config.agent_client_id().map(str::to_string),
            config.identity.client_id.clone(),
        )
    }

    /// Produce exactly one bearer token for `activity`.
    pub async fn resolve(&self, activity: &InboundActivity) -> Result<ResolvedToken> {
        if let Some(token) = activity.session_token() {
            debug!("Using channel-delegated session token");
            return Ok(ResolvedToken {
                token: token.to_string(),
                source: TokenSource::Session,
            });
        }

        let primary_err = match self.acquire_primary().await {
            Ok(token) => {
                return Ok(ResolvedToken {
                    token,
                    source: TokenSource::Primary,
                })
            }
            Err(e) => e,
        };

        warn!(
            provider = self.credentials.name(),
            error = %primary_err,
            "Primary token acquisition failed, trying fallback audience"
        );

        let fallback = TokenRequest::new(FALLBACK_SCOPE)
            .with_client_id(self.default_client_id.as_deref());
        match self.credentials.acquire(&fallback).await {
            Ok(token) => {
                info!(scope = FALLBACK_SCOPE, "Using fallback audience token");
                Ok(ResolvedToken {
                    token,
                    source: TokenSource::Fallback,
                })
            }
            Err(fallback_err) => {
                error!(error = %fallback_err, "Fallback token acquisition failed");
                Err(primary_err)
            }
        }
    }

    async fn acquire_primary(&self) -> Result<String> {
        let scope = self
            .primary_scope
            .as_deref()
            .ok_or_else(|| RelayError::Config("LOGIC_APP_ENDPOINT not configured".into()))?;
        let request =
            TokenRequest::new(scope).with_client_id(self.primary_client_id.as_deref());
        self.credentials.acquire(&request).await
    }
}
