//! Line-oriented host mode.
//!
//! Reads one JSON activity per line from stdin and writes one JSON
//! [`OutboundMessage`](agentrelay::bus::OutboundMessage) per line to stdout.
//! Messages are handled concurrently; feedback is recorded in order.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;

use agentrelay::agent::FeedbackHandler;
use agentrelay::bus::{InboundActivity, InboundEvent, MessageBus, OutboundMessage};
use agentrelay::log_component;

use super::common::{create_handler, load_config};

pub(crate) async fn cmd_stdin(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let bus = Arc::new(MessageBus::new());
    let handler = Arc::new(create_handler(&config, bus.clone())?);
    let feedback = FeedbackHandler::new();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = JoinSet::new();
    let mut received = 0u64;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.with_context(|| "Failed to read from stdin")? else {
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                received += 1;

                let activity = match InboundActivity::from_json(line) {
                    Ok(a) => a,
                    Err(e) => {
                        log_component!(warn, "stdin", "Skipping invalid activity", line = received, error = %e);
                        continue;
                    }
                };

                match InboundEvent::classify(activity) {
                    InboundEvent::Message(activity) => {
                        let handler = Arc::clone(&handler);
                        tasks.spawn(async move {
                            handler.handle(&activity).await;
                        });
                    }
                    InboundEvent::Feedback(event) => feedback.handle(event),
                    InboundEvent::Ignored(kind) => {
                        log_component!(debug, "stdin", "Ignoring activity", kind = %kind);
                    }
                }
            }
            Some(reply) = bus.consume_outbound() => write_reply(&reply)?,
        }
    }

    // Keep draining replies while in-flight messages finish, so a full
    // outbound queue cannot stall them.
    loop {
        tokio::select! {
            joined = tasks.join_next() => match joined {
                Some(Err(e)) => {
                    log_component!(error, "stdin", "Message task failed", error = %e);
                }
                Some(Ok(())) => {}
                None => break,
            },
            Some(reply) = bus.consume_outbound() => write_reply(&reply)?,
        }
    }
    while let Some(reply) = bus.try_consume_outbound().await {
        write_reply(&reply)?;
    }

    log_component!(
        info,
        "stdin",
        "Input closed",
        activities = received,
        feedback = feedback.total()
    );
    Ok(())
}

fn write_reply(reply: &OutboundMessage) -> Result<()> {
    let json = serde_json::to_string(reply).with_context(|| "Failed to serialize reply")?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", json)?;
    stdout.flush()?;
    Ok(())
}
