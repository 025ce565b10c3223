//! Agent module - relaying user messages to the agent loop
//!
//! - [`AgentClient`] calls the remote agent loop over an [`AgentTransport`]
//!   and turns the HTTP outcome into reply text.
//! - [`MessageHandler`] runs one inbound message through history, token
//!   resolution, the agent call, and dispatch.
//! - [`FeedbackHandler`] records feedback on earlier replies.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌────────────────┐     ┌──────────────┐
//! │ Inbound     │────>│ MessageHandler │────>│ AgentClient  │──> agent loop
//! │ activity    │     │                │     └──────────────┘
//! └─────────────┘     └────────────────┘
//!                       │      │      │
//!                       ▼      ▼      ▼
//!          ConversationStore  TokenResolver  ResponseSink
//! ```

pub mod client;
pub mod feedback;
pub mod handler;
pub mod transport;

pub use client::{
    AgentClient, AgentRequest, AgentResponse, ACCESS_DENIED_REPLY, AUTH_FAILED_REPLY,
    NO_RESPONSE_REPLY,
};
pub use feedback::FeedbackHandler;
pub use handler::{HandleOutcome, MessageHandler, SAFE_FAIL_REPLY};
pub use transport::{AgentTransport, HttpAgentTransport, TransportResponse};

use async_trait::async_trait;

use crate::bus::OutboundMessage;
use crate::error::Result;

/// Where replies go.
///
/// A failed `send` means the user did not receive the message.
#[async_trait]
pub trait ResponseSink: Send + Sync {
    async fn send(&self, msg: OutboundMessage) -> Result<()>;
}
