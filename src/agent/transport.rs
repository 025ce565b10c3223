//! HTTP transport for the agent loop.
//!
//! The transport only moves bytes: it POSTs JSON with a bearer token and
//! hands back the status and body. Status interpretation lives in
//! [`super::AgentClient`].

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::error::{RelayError, Result};

/// Raw HTTP outcome of a call that reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outbound POST capability.
///
/// Connection failures and timeouts are returned as
/// [`RelayError::AgentCall`] with no status; any HTTP status, including
/// errors, is returned as `Ok`.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        bearer_token: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<TransportResponse>;
}

/// `reqwest`-backed transport.
#[derive(Clone)]
pub struct HttpAgentTransport {
    client: Client,
}

impl HttpAgentTransport {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: Client::builder().build()?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AgentTransport for HttpAgentTransport {
    async fn post_json(
        &self,
        url: &str,
        bearer_token: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<TransportResponse> {
        let response = self
            .client
            .post(url)
            .bearer_auth(bearer_token)
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RelayError::agent_transport(format!(
                        "agent loop timed out after {} ms",
                        timeout.as_millis()
                    ))
                } else {
                    RelayError::agent_transport(format!("agent loop unreachable: {}", e))
                }
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| RelayError::agent_transport(format!("agent loop body unreadable: {}", e)))?;

        debug!(status, body_len = body.len(), "Agent loop responded");
        Ok(TransportResponse { status, body })
    }
}
