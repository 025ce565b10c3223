//! Message handler: one pass per inbound message.
//!
//! ```text
//! ReadHistory -> ResolveToken -> CallAgent -> AppendHistory -> Dispatch -> Done
//!      \______________\______________\______________\____________\
//!                                                                  -> SafeFail
//! ```
//!
//! Any failure jumps to `SafeFail`, which logs the cause and sends
//! [`SAFE_FAIL_REPLY`]. History only keeps the new turns when the pass
//! completes.

use std::sync::Arc;
use tracing::{debug, error, info, info_span, Instrument};

use crate::auth::TokenResolver;
use crate::bus::{InboundActivity, OutboundMessage};
use crate::error::Result;
use crate::session::{ConversationStore, Turn};
use crate::utils::string::preview;

use super::{AgentClient, ResponseSink};

/// The only text a user sees when handling fails.
pub const SAFE_FAIL_REPLY: &str =
    "I encountered an error while processing your request. Please try again.";

/// How a pass ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    /// The agent reply (including 401/403 texts) was stored and dispatched.
    Replied(String),
    /// The pass failed; the safe reply was sent (or attempted).
    SafeFailed,
}

pub struct MessageHandler {
    store: Arc<dyn ConversationStore>,
    resolver: TokenResolver,
    client: AgentClient,
    sink: Arc<dyn ResponseSink>,
}

impl MessageHandler {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        resolver: TokenResolver,
        client: AgentClient,
        sink: Arc<dyn ResponseSink>,
    ) -> Self {
        Self {
            store,
            resolver,
            client,
            sink,
        }
    }

    /// Handle one inbound message. Never returns an error: every failure is
    /// converted into the safe reply.
    pub async fn handle(&self, activity: &InboundActivity) -> HandleOutcome {
        let key = activity.conversation_key();
        let span = info_span!(
            "handle_message",
            conversation = %key,
            is_group = activity.is_group()
        );

        async {
            match self.run(activity).await {
                Ok(reply) => HandleOutcome::Replied(reply),
                Err(e) => {
                    error!(error = %e, "Error in message handling");
                    self.safe_fail(activity).await;
                    HandleOutcome::SafeFailed
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(&self, activity: &InboundActivity) -> Result<String> {
        let key = activity.conversation_key();
        let query = activity.text();
        info!(query = %preview(query, 80), "Message received");

        // ReadHistory
        let previous = self.store.get(&key).await?.unwrap_or_default();
        debug!(turns = previous.len(), "History loaded");

        // ResolveToken
        let token = self.resolver.resolve(activity).await?;
        debug!(source = ?token.source, "Token resolved");

        // CallAgent
        let reply = self.client.invoke(query, &token.token).await?;

        // AppendHistory
        let mut turns = previous.clone();
        turns.push(Turn::user(query));
        turns.push(Turn::assistant(&reply));
        self.store.set(&key, turns).await?;

        // Dispatch: group and one-to-one chats get the same annotated reply.
        let outbound = OutboundMessage::annotated_reply(activity, &reply);
        if let Err(e) = self.sink.send(outbound).await {
            // The user never saw this reply; take the turn pair back out.
            if let Err(restore_err) = self.store.set(&key, previous).await {
                error!(error = %restore_err, "Failed to restore history after dispatch failure");
            }
            return Err(e);
        }

        info!(reply = %preview(&reply, 80), "Reply dispatched");
        Ok(reply)
    }

    async fn safe_fail(&self, activity: &InboundActivity) {
        let msg = OutboundMessage::reply_to(activity, SAFE_FAIL_REPLY);
        if let Err(e) = self.sink.send(msg).await {
            error!(error = %e, "Failed to send error reply");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::client::{ACCESS_DENIED_REPLY, AUTH_FAILED_REPLY};
    use crate::agent::TransportResponse;
    use crate::error::RelayError;
    use crate::session::{ConversationKey, MemoryConversationStore, Role};
    use crate::testing::{FakeCredential, FakeTransport, HangingTransport, RecordingSink};
    use async_trait::async_trait;
    use std::time::Duration;

    struct Harness {
        handler: MessageHandler,
        store: MemoryConversationStore,
        sink: Arc<RecordingSink>,
        transport: Arc<FakeTransport>,
        credentials: Arc<FakeCredential>,
    }

    fn harness_with(
        credentials: FakeCredential,
        transport: FakeTransport,
        sink: RecordingSink,
        endpoint: Option<&str>,
    ) -> Harness {
        let store = MemoryConversationStore::new();
        let sink = Arc::new(sink);
        let transport = Arc::new(transport);
        let credentials = Arc::new(credentials);
        let resolver = TokenResolver::new(
            credentials.clone(),
            endpoint.map(|e| format!("{}/.default", e)),
            Some("logic-id".into()),
            Some("default-id".into()),
        );
        let client = AgentClient::new(
            endpoint.map(str::to_string),
            transport.clone(),
            Duration::from_secs(30),
        );
        let handler = MessageHandler::new(
            Arc::new(store.clone()),
            resolver,
            client,
            sink.clone(),
        );
        Harness {
            handler,
            store,
            sink,
            transport,
            credentials,
        }
    }

    fn harness(transport: FakeTransport) -> Harness {
        harness_with(
            FakeCredential::new(vec![Ok("mi-token".into())]),
            transport,
            RecordingSink::default(),
            Some("https://agent.example.com/run"),
        )
    }

    fn key() -> ConversationKey {
        ConversationKey::new("conv", "user")
    }

    #[tokio::test]
    async fn test_happy_path_appends_and_dispatches() {
        let h = harness(FakeTransport::ok(200, r#"{"response":"hello"}"#));
        let activity = InboundActivity::message("conv", "user", "hi");

        let outcome = h.handler.handle(&activity).await;

        assert_eq!(outcome, HandleOutcome::Replied("hello".into()));
        let turns = h.store.get(&key()).await.unwrap().unwrap();
        assert_eq!(turns, vec![Turn::user("hi"), Turn::assistant("hello")]);

        let sent = h.sink.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "hello");
        assert!(sent[0].ai_generated);
        assert!(sent[0].feedback_enabled);
        assert_eq!(sent[0].reply_to, activity.id);
    }

    #[tokio::test]
    async fn test_history_accumulates_across_passes() {
        let h = harness_with(
            FakeCredential::new(vec![Ok("t1".into()), Ok("t2".into())]),
            FakeTransport::new(vec![
                Ok(TransportResponse {
                    status: 200,
                    body: r#"{"response":"one"}"#.into(),
                }),
                Ok(TransportResponse {
                    status: 200,
                    body: r#"{"answer":"two"}"#.into(),
                }),
            ]),
            RecordingSink::default(),
            Some("https://agent.example.com/run"),
        );

        h.handler
            .handle(&InboundActivity::message("conv", "user", "first"))
            .await;
        h.handler
            .handle(&InboundActivity::message("conv", "user", "second"))
            .await;

        let turns = h.store.get(&key()).await.unwrap().unwrap();
        let roles: Vec<Role> = turns.iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
        assert_eq!(turns[2].content, "second");
        assert_eq!(turns[3].content, "two");
    }

    #[tokio::test]
    async fn test_401_is_a_normal_reply() {
        let h = harness(FakeTransport::ok(401, ""));
        let outcome = h
            .handler
            .handle(&InboundActivity::message("conv", "user", "hi"))
            .await;

        assert_eq!(outcome, HandleOutcome::Replied(AUTH_FAILED_REPLY.into()));
        let turns = h.store.get(&key()).await.unwrap().unwrap();
        assert_eq!(turns[1], Turn::assistant(AUTH_FAILED_REPLY));
        assert_eq!(h.sink.messages()[0].text, AUTH_FAILED_REPLY);
        assert!(h.sink.messages()[0].ai_generated);
    }

    #[tokio::test]
    async fn test_403_is_a_normal_reply() {
        let h = harness(FakeTransport::ok(403, ""));
        h.handler
            .handle(&InboundActivity::message("conv", "user", "hi"))
            .await;

        let turns = h.store.get(&key()).await.unwrap().unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(h.sink.messages()[0].text, ACCESS_DENIED_REPLY);
    }

    #[tokio::test]
    async fn test_raised_call_failure_leaves_history_and_sends_safe_reply() {
        let h = harness(FakeTransport::ok(500, "stack trace: secret-endpoint"));
        h.store
            .set(&key(), vec![Turn::user("old"), Turn::assistant("older")])
            .await
            .unwrap();

        let outcome = h
            .handler
            .handle(&InboundActivity::message("conv", "user", "hi"))
            .await;

        assert_eq!(outcome, HandleOutcome::SafeFailed);
        let turns = h.store.get(&key()).await.unwrap().unwrap();
        assert_eq!(turns, vec![Turn::user("old"), Turn::assistant("older")]);

        let sent = h.sink.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, SAFE_FAIL_REPLY);
        assert!(!sent[0].text.contains("secret-endpoint"));
        assert!(!sent[0].ai_generated);
    }

    #[tokio::test]
    async fn test_token_failure_safe_fails_without_calling_agent() {
        let h = harness_with(
            FakeCredential::new(vec![
                Err(RelayError::Credential("primary".into())),
                Err(RelayError::Credential("fallback".into())),
            ]),
            FakeTransport::ok(200, r#"{"response":"x"}"#),
            RecordingSink::default(),
            Some("https://agent.example.com/run"),
        );

        let outcome = h
            .handler
            .handle(&InboundActivity::message("conv", "user", "hi"))
            .await;

        assert_eq!(outcome, HandleOutcome::SafeFailed);
        assert_eq!(h.transport.call_count(), 0);
        assert!(h.store.get(&key()).await.unwrap().is_none());
        assert_eq!(h.sink.messages()[0].text, SAFE_FAIL_REPLY);
    }

    #[tokio::test]
    async fn test_session_token_reaches_agent_verbatim() {
        let h = harness(FakeTransport::ok(200, r#"{"response":"ok"}"#));
        let activity =
            InboundActivity::message("conv", "user", "hi").with_session_token("sso-abc");

        h.handler.handle(&activity).await;

        assert_eq!(h.credentials.call_count(), 0);
        let calls = h.transport.bodies.lock().unwrap().clone();
        assert_eq!(calls[0].1, "sso-abc");
    }

    #[tokio::test]
    async fn test_missing_endpoint_safe_fails_before_network() {
        let h = harness_with(
            FakeCredential::new(vec![Ok("graph-token".into())]),
            FakeTransport::ok(200, r#"{"response":"x"}"#),
            RecordingSink::default(),
            None,
        );

        let outcome = h
            .handler
            .handle(&InboundActivity::message("conv", "user", "hi"))
            .await;

        assert_eq!(outcome, HandleOutcome::SafeFailed);
        assert_eq!(h.transport.call_count(), 0);
        assert_eq!(h.sink.messages()[0].text, SAFE_FAIL_REPLY);
    }

    #[tokio::test]
    async fn test_group_and_direct_chats_share_reply_path() {
        for is_group in [true, false] {
            let h = harness(FakeTransport::ok(200, r#"{"response":"same"}"#));
            let activity = InboundActivity::message("conv", "user", "hi").in_group(is_group);
            h.handler.handle(&activity).await;

            let sent = h.sink.messages();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].text, "same");
            assert!(sent[0].ai_generated && sent[0].feedback_enabled);
        }
    }

    #[tokio::test]
    async fn test_dispatch_failure_restores_history() {
        let h = harness_with(
            FakeCredential::new(vec![Ok("t".into())]),
            FakeTransport::ok(200, r#"{"response":"lost"}"#),
            RecordingSink::failing_first(1),
            Some("https://agent.example.com/run"),
        );
        h.store.set(&key(), vec![Turn::user("old")]).await.unwrap();

        let outcome = h
            .handler
            .handle(&InboundActivity::message("conv", "user", "hi"))
            .await;

        assert_eq!(outcome, HandleOutcome::SafeFailed);
        assert_eq!(
            h.store.get(&key()).await.unwrap().unwrap(),
            vec![Turn::user("old")]
        );
        let sent = h.sink.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, SAFE_FAIL_REPLY);
    }

    #[tokio::test]
    async fn test_sink_failure_on_safe_fail_is_swallowed() {
        let h = harness_with(
            FakeCredential::new(vec![Ok("t".into())]),
            FakeTransport::ok(500, ""),
            RecordingSink::failing_first(5),
            Some("https://agent.example.com/run"),
        );
        let outcome = h
            .handler
            .handle(&InboundActivity::message("conv", "user", "hi"))
            .await;
        assert_eq!(outcome, HandleOutcome::SafeFailed);
        assert!(h.sink.messages().is_empty());
    }

    #[tokio::test]
    async fn test_agent_timeout_safe_fails_and_keeps_history() {
        let store = MemoryConversationStore::new();
        store
            .set(&key(), vec![Turn::user("old"), Turn::assistant("older")])
            .await
            .unwrap();
        let sink = Arc::new(RecordingSink::default());
        let transport = Arc::new(HangingTransport::new());
        let resolver = TokenResolver::new(
            Arc::new(FakeCredential::new(vec![Ok("t".into())])),
            Some("https://agent.example.com/run/.default".into()),
            None,
            None,
        );
        let client = AgentClient::new(
            Some("https://agent.example.com/run".into()),
            transport.clone(),
            Duration::from_millis(50),
        );
        let handler = MessageHandler::new(Arc::new(store.clone()), resolver, client, sink.clone());

        let outcome = handler
            .handle(&InboundActivity::message("conv", "user", "hi"))
            .await;

        assert_eq!(outcome, HandleOutcome::SafeFailed);
        assert_eq!(transport.call_count(), 1);
        assert_eq!(
            store.get(&key()).await.unwrap().unwrap(),
            vec![Turn::user("old"), Turn::assistant("older")]
        );
        let sent = sink.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, SAFE_FAIL_REPLY);
    }

    /// Store whose reads always fail, like an unreachable external backend.
    struct UnavailableStore;

    #[async_trait]
    impl ConversationStore for UnavailableStore {
        async fn get(&self, _key: &ConversationKey) -> Result<Option<Vec<Turn>>> {
            Err(RelayError::Store("backend unreachable".into()))
        }

        async fn set(&self, _key: &ConversationKey, _turns: Vec<Turn>) -> Result<()> {
            Err(RelayError::Store("backend unreachable".into()))
        }
    }

    #[tokio::test]
    async fn test_store_failure_safe_fails_before_token_or_call() {
        let sink = Arc::new(RecordingSink::default());
        let credentials = Arc::new(FakeCredential::new(vec![Ok("t".into())]));
        let transport = Arc::new(FakeTransport::ok(200, r#"{"response":"x"}"#));
        let handler = MessageHandler::new(
            Arc::new(UnavailableStore),
            TokenResolver::new(
                credentials.clone(),
                Some("https://agent.example.com/run/.default".into()),
                None,
                None,
            ),
            AgentClient::new(
                Some("https://agent.example.com/run".into()),
                transport.clone(),
                Duration::from_secs(30),
            ),
            sink.clone(),
        );

        let outcome = handler
            .handle(&InboundActivity::message("conv", "user", "hi"))
            .await;

        assert_eq!(outcome, HandleOutcome::SafeFailed);
        assert_eq!(credentials.call_count(), 0);
        assert_eq!(transport.call_count(), 0);
        assert_eq!(sink.messages()[0].text, SAFE_FAIL_REPLY);
    }
}
