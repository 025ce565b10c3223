//! Message Bus Module
//!
//! The `MessageBus` carries outbound replies from the relay back to the
//! channel host. It is the [`ResponseSink`] the message handler dispatches to.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ MessageHandler │────>│  MessageBus │────>│ Channel host│
//! │                │     │  (outbound) │     │             │
//! └────────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use agentrelay::bus::{MessageBus, OutboundMessage};
//!
//! #[tokio::main]
//! async fn main() {
//!     let bus = MessageBus::new();
//!
//!     bus.publish_outbound(OutboundMessage::plain("conv-1", "Hello")).await.unwrap();
//!
//!     if let Some(reply) = bus.consume_outbound().await {
//!         println!("Reply: {}", reply.text);
//!     }
//! }
//! ```

pub mod message;

pub use message::{
    ChannelAccount, ConversationRef, FeedbackEvent, InboundActivity, InboundEvent,
    OutboundMessage,
};

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::Mutex;

use crate::agent::ResponseSink;
use crate::error::{RelayError, Result};

/// Default buffer size for the outbound queue
const DEFAULT_BUFFER_SIZE: usize = 100;

/// Queues replies for the channel host.
///
/// Uses a bounded Tokio MPSC queue. Cloning the bus shares the same
/// underlying queue.
pub struct MessageBus {
    outbound_tx: mpsc::Sender<OutboundMessage>,
    outbound_rx: Arc<Mutex<mpsc::Receiver<OutboundMessage>>>,
}

impl MessageBus {
    /// Creates a new `MessageBus` with the default buffer size (100).
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    /// Creates a new `MessageBus` with a custom buffer size.
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(buffer_size);

        Self {
            outbound_tx,
            outbound_rx: Arc::new(Mutex::new(outbound_rx)),
        }
    }

    /// Publishes an outbound reply to the bus.
    ///
    /// # Errors
    /// Returns `RelayError::BusClosed` if the receiver has been dropped.
    pub async fn publish_outbound(&self, msg: OutboundMessage) -> Result<()> {
        self.outbound_tx
            .send(msg)
            .await
            .map_err(|_| RelayError::BusClosed)
    }

    /// Consumes the next outbound reply. `None` once all senders are dropped.
    pub async fn consume_outbound(&self) -> Option<OutboundMessage> {
        self.outbound_rx.lock().await.recv().await
    }

    /// Takes an already-queued outbound reply without waiting.
    pub async fn try_consume_outbound(&self) -> Option<OutboundMessage> {
        self.outbound_rx.lock().await.try_recv().ok()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MessageBus {
    fn clone(&self) -> Self {
        Self {
            outbound_tx: self.outbound_tx.clone(),
            outbound_rx: Arc::clone(&self.outbound_rx),
        }
    }
}

#[async_trait]
impl ResponseSink for MessageBus {
    async fn send(&self, msg: OutboundMessage) -> Result<()> {
        self.publish_outbound(msg).await
    }
}
