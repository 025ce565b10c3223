//! AgentRelay - relays chat messages to a remote agent loop
//!
//! One inbound user message becomes one authenticated call to the agent
//! loop, one reply back to the user, and one turn pair appended to the
//! conversation history. Failures never leak details to the user.

pub mod agent;
pub mod auth;
pub mod bus;
pub mod config;
pub mod error;
pub mod session;
pub mod utils;

#[cfg(test)]
mod testing;

pub use agent::{
    AgentClient, AgentTransport, FeedbackHandler, HandleOutcome, HttpAgentTransport,
    MessageHandler, ResponseSink, SAFE_FAIL_REPLY,
};
pub use auth::{CredentialProvider, ManagedIdentityCredential, TokenResolver};
pub use bus::{InboundActivity, InboundEvent, MessageBus, OutboundMessage};
pub use config::Config;
pub use error::{RelayError, Result};
pub use session::{ConversationKey, ConversationStore, MemoryConversationStore, Role, Turn};
