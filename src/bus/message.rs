//! Message types for the AgentRelay message bus
//!
//! Inbound messages arrive as Bot-Framework-shaped activities. They are
//! validated and defaulted here, at the boundary, so the rest of the relay
//! works with named optional fields instead of probing raw JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session::ConversationKey;

/// Activity `type` for user messages.
pub const ACTIVITY_MESSAGE: &str = "message";

/// Activity `type` for invoke activities (feedback submissions among them).
pub const ACTIVITY_INVOKE: &str = "invoke";

/// Invoke `name` used when a user submits feedback on a reply.
pub const FEEDBACK_INVOKE_NAME: &str = "message/submitAction";

/// Conversation the activity belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversationRef {
    pub id: String,
    /// Group chats and channels set this; one-to-one chats usually omit it.
    pub is_group: Option<bool>,
}

/// Sender of the activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelAccount {
    pub id: String,
    pub name: Option<String>,
}

/// Channel-specific payload. Only the delegated session token is read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelData {
    pub source: Option<ChannelSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelSource {
    pub bot: Option<BotSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BotSource {
    pub authorization: Option<BotAuthorization>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BotAuthorization {
    pub token: Option<String>,
}

/// An activity received from the messaging platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InboundActivity {
    /// Activity type (`message`, `invoke`, ...)
    #[serde(rename = "type")]
    pub activity_type: String,
    /// Platform-assigned activity id
    pub id: Option<String>,
    /// Invoke name, for `invoke` activities
    pub name: Option<String>,
    /// Message text
    pub text: Option<String>,
    pub conversation: ConversationRef,
    pub from: ChannelAccount,
    pub channel_data: Option<ChannelData>,
    /// Invoke payload (feedback submissions carry their data here)
    pub value: Option<Value>,
    /// Activity this one replies to
    pub reply_to_id: Option<String>,
}

impl InboundActivity {
    /// Creates a message activity with the required fields.
    ///
    /// # Example
    /// ```
    /// use agentrelay::bus::InboundActivity;
    ///
    /// let msg = InboundActivity::message("conv-1", "user-1", "Hello");
    /// assert_eq!(msg.conversation_key().to_string(), "conv-1/user-1");
    /// assert!(!msg.is_group());
    /// ```
    pub fn message(conversation_id: &str, user_id: &str, text: &str) -> Self {
        Self {
            activity_type: ACTIVITY_MESSAGE.to_string(),
            id: Some(uuid::Uuid::new_v4().to_string()),
            text: Some(text.to_string()),
            conversation: ConversationRef {
                id: conversation_id.to_string(),
                is_group: None,
            },
            from: ChannelAccount {
                id: user_id.to_string(),
                name: None,
            },
            ..Default::default()
        }
    }

    /// Parse an activity from its JSON wire form.
    pub fn from_json(raw: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Marks the conversation as a group chat (builder pattern).
    pub fn in_group(mut self, is_group: bool) -> Self {
        self.conversation.is_group = Some(is_group);
        self
    }

    /// Embeds a channel-delegated session token (builder pattern).
    ///
    /// # Example
    /// ```
    /// use agentrelay::bus::InboundActivity;
    ///
    /// let msg = InboundActivity::message("c", "u", "hi").with_session_token("sso-token");
    /// assert_eq!(msg.session_token(), Some("sso-token"));
    /// ```
    pub fn with_session_token(mut self, token: &str) -> Self {
        self.channel_data = Some(ChannelData {
            source: Some(ChannelSource {
                bot: Some(BotSource {
                    authorization: Some(BotAuthorization {
                        token: Some(token.to_string()),
                    }),
                }),
            }),
        });
        self
    }

    /// History bucket for this activity: `(conversation.id, from.id)`.
    pub fn conversation_key(&self) -> ConversationKey {
        ConversationKey::new(&self.conversation.id, &self.from.id)
    }

    /// Message text, empty when the platform sent none.
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    pub fn is_group(&self) -> bool {
        self.conversation.is_group.unwrap_or(false)
    }

    /// The session-delegated token at `channelData.source.bot.authorization.token`,
    /// if present and non-empty.
    pub fn session_token(&self) -> Option<&str> {
        self.channel_data
            .as_ref()?
            .source
            .as_ref()?
            .bot
            .as_ref()?
            .authorization
            .as_ref()?
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
    }

    fn is_feedback(&self) -> bool {
        if self.activity_type != ACTIVITY_INVOKE {
            return false;
        }
        if self.name.as_deref() == Some(FEEDBACK_INVOKE_NAME) {
            return true;
        }
        self.value
            .as_ref()
            .and_then(|v| v.get("actionName"))
            .and_then(Value::as_str)
            == Some("feedback")
    }
}

/// A user's feedback on an earlier reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub conversation_id: String,
    pub user_id: String,
    /// The reply the feedback refers to
    pub reply_to_id: Option<String>,
    /// Payload exactly as the platform sent it
    pub value: Value,
}

impl FeedbackEvent {
    pub fn from_activity(activity: &InboundActivity) -> Self {
        Self {
            conversation_id: activity.conversation.id.clone(),
            user_id: activity.from.id.clone(),
            reply_to_id: activity.reply_to_id.clone(),
            value: activity.value.clone().unwrap_or(Value::Null),
        }
    }
}

/// Inbound activity, classified for routing.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// A user message for the message handler
    Message(InboundActivity),
    /// A feedback submission for the feedback handler
    Feedback(FeedbackEvent),
    /// Anything else (typing indicators, membership updates, ...)
    Ignored(String),
}

impl InboundEvent {
    pub fn classify(activity: InboundActivity) -> Self {
        if activity.is_feedback() {
            InboundEvent::Feedback(FeedbackEvent::from_activity(&activity))
        } else if activity.activity_type == ACTIVITY_MESSAGE {
            InboundEvent::Message(activity)
        } else {
            InboundEvent::Ignored(activity.activity_type)
        }
    }
}

/// A reply to be delivered back through the messaging platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    /// Outbound activity id
    pub id: String,
    pub conversation_id: String,
    /// Inbound activity this answers
    pub reply_to: Option<String>,
    pub text: String,
    /// Marked as AI-generated content in the client
    pub ai_generated: bool,
    /// Client shows feedback controls on this reply
    pub feedback_enabled: bool,
}

impl OutboundMessage {
    /// A plain text reply with no annotations.
    pub fn plain(conversation_id: &str, text: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            reply_to: None,
            text: text.to_string(),
            ai_generated: false,
            feedback_enabled: false,
        }
    }

    /// An agent reply annotated as AI-generated and feedback-eligible.
    ///
    /// # Example
    /// ```
    /// use agentrelay::bus::{InboundActivity, OutboundMessage};
    ///
    /// let inbound = InboundActivity::message("conv-1", "user-1", "Hello");
    /// let reply = OutboundMessage::annotated_reply(&inbound, "Hi!");
    /// assert!(reply.ai_generated && reply.feedback_enabled);
    /// assert_eq!(reply.conversation_id, "conv-1");
    /// ```
    pub fn annotated_reply(inbound: &InboundActivity, text: &str) -> Self {
        Self {
            ai_generated: true,
            feedback_enabled: true,
            ..Self::reply_to(inbound, text)
        }
    }

    /// A plain reply addressed to the inbound activity's conversation.
    pub fn reply_to(inbound: &InboundActivity, text: &str) -> Self {
        Self {
            reply_to: inbound.id.clone(),
            ..Self::plain(&inbound.conversation.id, text)
        }
    }
}
