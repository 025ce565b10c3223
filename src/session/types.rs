//! Conversation history types
//!
//! A history is an ordered list of [`Turn`]s stored under a
//! [`ConversationKey`]. Turns are never edited once appended.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one user's history within one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey {
    pub conversation_id: String,
    pub user_id: String,
}

impl ConversationKey {
    /// # Example
    /// ```
    /// use agentrelay::session::ConversationKey;
    ///
    /// let key = ConversationKey::new("19:meeting", "29:user");
    /// assert_eq!(key.to_string(), "19:meeting/29:user");
    /// ```
    pub fn new(conversation_id: &str, user_id: &str) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            user_id: user_id.to_string(),
        }
    }

    /// Storage key string, `<conversationId>/<userId>`.
    pub fn storage_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.conversation_id, self.user_id)
    }
}

/// Author of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One message exchange unit in a conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: &str) -> Self {
        Self {
            role: Role::User,
            content: content.to_string(),
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self {
            role: Role::Assistant,
            content: content.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display() {
        assert_eq!(ConversationKey::new("a", "b").storage_key(), "a/b");
    }

    #[test]
    fn test_keys_distinguish_users() {
        assert_ne!(ConversationKey::new("c", "u1"), ConversationKey::new("c", "u2"));
    }

    #[test]
    fn test_turn_constructors() {
        assert_eq!(Turn::user("hi").role, Role::User);
        assert_eq!(Turn::assistant("hello").role, Role::Assistant);
    }

    #[test]
    fn test_turn_serialization() {
        let json = serde_json::to_string(&Turn::assistant("hello")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hello"}"#);
    }
}
