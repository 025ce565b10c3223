//! Agent loop client.
//!
//! Sends the user's query to the configured agent loop endpoint and turns the
//! HTTP outcome into reply text:
//!
//! | Outcome | Result |
//! |---|---|
//! | 2xx | `response`, else `answer`, else [`NO_RESPONSE_REPLY`] |
//! | 401 | `Ok(`[`AUTH_FAILED_REPLY`]`)` |
//! | 403 | `Ok(`[`ACCESS_DENIED_REPLY`]`)` |
//! | other status, transport error, timeout | `Err(RelayError::AgentCall)` |

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{Config, RetryConfig};
use crate::error::{RelayError, Result};
use crate::utils::string::preview;

use super::transport::{AgentTransport, TransportResponse};

/// Reply when the agent loop answers without a usable field.
pub const NO_RESPONSE_REPLY: &str = "No response from agent loop";

/// Reply for HTTP 403 from the agent loop.
pub const ACCESS_DENIED_REPLY: &str =
    "Access denied. You may not have permission to access this information.";

/// Reply for HTTP 401 from the agent loop.
pub const AUTH_FAILED_REPLY: &str = "Authentication failed. Please try again.";

/// Request body POSTed to the agent loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRequest {
    pub query: String,
    pub user_context: UserContext,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    /// ISO-8601 UTC timestamp of the call
    pub timestamp: String,
}

impl AgentRequest {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            user_context: UserContext {
                timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            },
        }
    }
}

/// Success body from the agent loop. Either field may be absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentResponse {
    #[serde(default)]
    pub response: Option<Value>,
    #[serde(default)]
    pub answer: Option<Value>,
}

impl AgentResponse {
    /// Parse a success body. Anything that is not a JSON object yields an
    /// empty response, which maps to [`NO_RESPONSE_REPLY`].
    pub fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }

    /// Reply text: `response` first, then `answer`, then the fixed fallback.
    ///
    /// Only non-empty strings count; `null`, `""` and non-string values are
    /// treated as missing.
    pub fn into_text(self) -> String {
        fn text(value: Option<Value>) -> Option<String> {
            match value {
                Some(Value::String(s)) if !s.is_empty() => Some(s),
                _ => None,
            }
        }
        text(self.response)
            .or_else(|| text(self.answer))
            .unwrap_or_else(|| NO_RESPONSE_REPLY.to_string())
    }
}

pub struct AgentClient {
    endpoint: Option<String>,
    transport: Arc<dyn AgentTransport>,
    timeout: Duration,
    retry: RetryConfig,
}

impl AgentClient {
    pub fn new(
        endpoint: Option<String>,
        transport: Arc<dyn AgentTransport>,
        timeout: Duration,
    ) -> Self {
        Self {
            endpoint,
            transport,
            timeout,
            retry: RetryConfig::default(),
        }
    }

    pub fn from_config(config: &Config, transport: Arc<dyn AgentTransport>) -> Self {
        Self::new(
            config.logic_app.endpoint().map(str::to_string),
            transport,
            Duration::from_millis(config.timeouts.agent_ms),
        )
        .with_retry(config.retry.clone())
    }

    /// Enable bounded retry for transport and 5xx failures (builder pattern).
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Send `query` to the agent loop with `token` and return the reply text.
    ///
    /// # Errors
    /// - [`RelayError::Config`] when no endpoint is configured, before any
    ///   network call.
    /// - [`RelayError::AgentCall`] for transport failures, timeouts and
    ///   statuses other than 2xx/401/403.
    pub async fn invoke(&self, query: &str, token: &str) -> Result<String> {
        let endpoint = self
            .endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| RelayError::Config("LOGIC_APP_ENDPOINT not configured".into()))?;

        let body = serde_json::to_value(AgentRequest::new(query))?;

        let mut attempt = 0u32;
        loop {
            match self.call_once(endpoint, token, &body).await {
                Ok(reply) => return Ok(reply),
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    warn!(
                        attempt = attempt + 1,
                        max_retries = self.retry.max_retries,
                        error = %e,
                        "Agent loop call failed, retrying"
                    );
                    delay_with_jitter(attempt, self.retry.base_delay_ms, self.retry.max_delay_ms)
                        .await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn call_once(&self, endpoint: &str, token: &str, body: &Value) -> Result<String> {
        let call = self.transport.post_json(endpoint, token, body, self.timeout);
        let response = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(RelayError::agent_transport(format!(
                    "agent loop timed out after {} ms",
                    self.timeout.as_millis()
                )))
            }
        };
        Self::interpret(response)
    }

    fn interpret(response: TransportResponse) -> Result<String> {
        if response.is_success() {
            let reply = AgentResponse::parse(&response.body).into_text();
            debug!(reply = %preview(&reply, 80), "Agent loop reply");
            return Ok(reply);
        }
        match response.status {
            401 => {
                warn!("Agent loop rejected the token (401)");
                Ok(AUTH_FAILED_REPLY.to_string())
            }
            403 => {
                warn!("Agent loop denied access (403)");
                Ok(ACCESS_DENIED_REPLY.to_string())
            }
            status => Err(RelayError::agent_status(
                status,
                format!(
                    "agent loop returned HTTP {}: {}",
                    status,
                    preview(&response.body, 200)
                ),
            )),
        }
    }
}

/// Backoff for retry `attempt` (0-indexed):
/// `min(base_delay_ms * 2^attempt + jitter, max_delay_ms)`.
pub fn compute_delay(attempt: u32, base_delay_ms: u64, max_delay_ms: u64, jitter_ms: u64) -> u64 {
    let exponential = base_delay_ms.saturating_mul(1u64 << attempt.min(16));
    exponential.saturating_add(jitter_ms).min(max_delay_ms)
}

/// Sleep for the backoff delay. Jitter comes from the clock's nanoseconds.
async fn delay_with_jitter(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) {
    let jitter_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64 % base_delay_ms.max(1))
        .unwrap_or(0);
    let delay = compute_delay(attempt, base_delay_ms, max_delay_ms, jitter_ms);
    tokio::time::sleep(Duration::from_millis(delay)).await;
}
