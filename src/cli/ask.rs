//! Single-message mode.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use agentrelay::agent::HandleOutcome;
use agentrelay::bus::{InboundActivity, MessageBus};

use super::common::{create_handler, load_config};

/// Arguments for `agentrelay ask`.
pub(crate) struct AskRequest {
    pub message: String,
    pub conversation: String,
    pub user: String,
    pub group: bool,
    pub token: Option<String>,
}

/// Run one message through the relay and print the reply text.
pub(crate) async fn cmd_ask(config_path: Option<&Path>, request: AskRequest) -> Result<()> {
    let config = load_config(config_path)?;
    let bus = Arc::new(MessageBus::new());
    let handler = create_handler(&config, bus.clone())?;

    let mut activity =
        InboundActivity::message(&request.conversation, &request.user, &request.message)
            .in_group(request.group);
    if let Some(token) = request.token.as_deref() {
        activity = activity.with_session_token(token);
    }

    let outcome = handler.handle(&activity).await;

    let reply = bus
        .try_consume_outbound()
        .await
        .with_context(|| "No reply was dispatched")?;
    println!("{}", reply.text);

    outcome_status(&outcome)
}

/// Map a handling outcome to the command result, so `main` sets the exit code.
fn outcome_status(outcome: &HandleOutcome) -> Result<()> {
    match outcome {
        HandleOutcome::Replied(_) => Ok(()),
        HandleOutcome::SafeFailed => {
            anyhow::bail!("message handling failed; see logs for the cause")
        }
    }
}
