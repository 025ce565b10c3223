//! Session module - per-conversation history storage
//!
//! The relay only needs a keyed get/set store; eviction and durability are
//! the backend's concern. [`MemoryConversationStore`] is the in-process
//! backend used by the CLI host and tests.
//!
//! # Example
//!
//! ```
//! use agentrelay::session::{ConversationKey, ConversationStore, MemoryConversationStore, Turn};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MemoryConversationStore::new();
//!     let key = ConversationKey::new("conv-1", "user-1");
//!
//!     store.set(&key, vec![Turn::user("hi"), Turn::assistant("hello")]).await.unwrap();
//!     let turns = store.get(&key).await.unwrap().unwrap();
//!     assert_eq!(turns.len(), 2);
//! }
//! ```

pub mod types;

pub use types::{ConversationKey, Role, Turn};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::Result;

/// Keyed storage for conversation histories.
///
/// `get` on an unknown key returns `Ok(None)`, not an error. `set` replaces
/// the whole sequence. No per-key locking is implied: two concurrent
/// read-modify-write passes on one key may lose an append.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get(&self, key: &ConversationKey) -> Result<Option<Vec<Turn>>>;

    async fn set(&self, key: &ConversationKey, turns: Vec<Turn>) -> Result<()>;
}

/// In-memory conversation store.
///
/// Uses `Arc<RwLock>` internally, so clones share the same histories.
#[derive(Clone, Default)]
pub struct MemoryConversationStore {
    histories: Arc<RwLock<HashMap<String, Vec<Turn>>>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored histories.
    pub async fn len(&self) -> usize {
        self.histories.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.histories.read().await.is_empty()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn get(&self, key: &ConversationKey) -> Result<Option<Vec<Turn>>> {
        let histories = self.histories.read().await;
        Ok(histories.get(&key.storage_key()).cloned())
    }

    async fn set(&self, key: &ConversationKey, turns: Vec<Turn>) -> Result<()> {
        let mut histories = self.histories.write().await;
        histories.insert(key.storage_key(), turns);
        Ok(())
    }
}
