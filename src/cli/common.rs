//! Shared CLI helpers used across multiple command handlers.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use agentrelay::agent::{AgentClient, HttpAgentTransport, MessageHandler, ResponseSink};
use agentrelay::auth::{ManagedIdentityCredential, TimeoutCredential, TokenResolver};
use agentrelay::config::Config;
use agentrelay::session::MemoryConversationStore;

/// Load config from `path`, or the default location when `None`.
pub(crate) fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => Config::load_from_path(p)
            .with_context(|| format!("Failed to load configuration from {}", p.display())),
        None => Config::load().with_context(|| "Failed to load configuration"),
    }
}

/// Wire a message handler from config, replying through `sink`.
pub(crate) fn create_handler(
    config: &Config,
    sink: Arc<dyn ResponseSink>,
) -> Result<MessageHandler> {
    if !config.identity.app_type.uses_managed_identity() {
        warn!(
            app_type = %config.identity.app_type,
            "Bot type does not use managed identity; only channel session tokens are expected"
        );
    }
    if config.logic_app.endpoint().is_none() {
        warn!("LOGIC_APP_ENDPOINT not configured; every message will get the error reply");
    }

    let identity = ManagedIdentityCredential::from_env(config.identity.client_id.clone())
        .with_context(|| "Failed to create managed identity credential")?;
    let credentials = Arc::new(TimeoutCredential::new(
        identity,
        Duration::from_millis(config.timeouts.token_ms),
    ));

    let transport =
        Arc::new(HttpAgentTransport::new().with_context(|| "Failed to create HTTP client")?);

    let resolver = TokenResolver::from_config(config, credentials);
    let client = AgentClient::from_config(config, transport);
    let store = Arc::new(MemoryConversationStore::new());

    info!(
        app_type = %config.identity.app_type,
        agent_timeout_ms = config.timeouts.agent_ms,
        max_retries = config.retry.max_retries,
        "Relay ready"
    );

    Ok(MessageHandler::new(store, resolver, client, sink))
}
