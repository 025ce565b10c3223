//! Error types for AgentRelay
//!
//! This module defines all error types used throughout the relay.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.
//!
//! HTTP 401 and 403 from the agent loop are deliberately absent here: the
//! agent client turns them into textual replies instead of errors.

use thiserror::Error;

/// The primary error type for AgentRelay operations.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Configuration errors (missing agent loop endpoint, invalid values, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Identity backend unreachable, timed out, or refused the requested scope.
    #[error("Credential error: {0}")]
    Credential(String),

    /// Outbound agent loop call failed for a reason other than 401/403.
    ///
    /// `status` is `None` for transport failures (connect errors, timeouts).
    #[error("Agent call error: {message}")]
    AgentCall {
        status: Option<u16>,
        message: String,
    },

    /// Conversation store failures.
    ///
    /// The in-memory store never fails; this is what external
    /// [`ConversationStore`](crate::session::ConversationStore) backends return.
    #[error("Store error: {0}")]
    Store(String),

    /// Response sink failures (the channel could not accept the reply).
    ///
    /// Returned by channel-facing [`ResponseSink`](crate::agent::ResponseSink)
    /// implementations; the bus itself reports [`RelayError::BusClosed`].
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Message bus channel closed unexpectedly
    #[error("Bus error: channel closed")]
    BusClosed,
}

impl RelayError {
    /// Build an [`RelayError::AgentCall`] for a non-success HTTP status.
    pub fn agent_status(status: u16, message: impl Into<String>) -> Self {
        RelayError::AgentCall {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Build an [`RelayError::AgentCall`] for a transport-level failure.
    pub fn agent_transport(message: impl Into<String>) -> Self {
        RelayError::AgentCall {
            status: None,
            message: message.into(),
        }
    }

    /// Returns `true` if a bounded retry may help.
    ///
    /// Only agent call failures are retried; configuration and credential
    /// errors fail the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            RelayError::AgentCall { status: None, .. } => true,
            RelayError::AgentCall {
                status: Some(code), ..
            } => *code == 408 || *code == 429 || *code >= 500,
            _ => false,
        }
    }

    /// Returns the HTTP status code associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RelayError::AgentCall { status, .. } => *status,
            _ => None,
        }
    }
}

/// A specialized `Result` type for AgentRelay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
