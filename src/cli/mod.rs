//! CLI module - command parsing and dispatch
//!
//! All CLI logic lives here. `main.rs` calls `cli::run()`.

pub mod ask;
pub mod common;
pub mod config;
pub mod stdin;

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "agentrelay")]
#[command(version)]
#[command(about = "Relay chat messages to a remote agent loop", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.agentrelay/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message through the relay and print the reply
    Ask {
        /// Message text
        #[arg(short, long)]
        message: String,
        /// Conversation id
        #[arg(long, default_value = "cli")]
        conversation: String,
        /// User id
        #[arg(long, default_value = "user")]
        user: String,
        /// Treat the conversation as a group chat
        #[arg(long)]
        group: bool,
        /// Channel-delegated session token (skips managed identity)
        #[arg(long)]
        token: Option<String>,
    },
    /// Read JSON activities from stdin, write JSON replies to stdout
    Stdin,
    /// Validate configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Check configuration for errors and warnings
    Check,
}

/// Entry point for the CLI, called from main().
pub async fn run() -> Result<()> {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Load config early so we can respect the logging settings; fall back to
    // defaults if the config file is unreadable.
    let logging_cfg = common::load_config(cli.config.as_deref())
        .map(|c| c.logging)
        .unwrap_or_default();
    if let Err(e) = agentrelay::utils::logging::init_logging(&logging_cfg) {
        eprintln!("Warning: failed to initialize logging: {}", e);
    }

    match cli.command {
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
        }
        Some(Commands::Version) => {
            cmd_version();
        }
        Some(Commands::Ask {
            message,
            conversation,
            user,
            group,
            token,
        }) => {
            let request = ask::AskRequest {
                message,
                conversation,
                user,
                group,
                token,
            };
            ask::cmd_ask(cli.config.as_deref(), request).await?;
        }
        Some(Commands::Stdin) => {
            stdin::cmd_stdin(cli.config.as_deref()).await?;
        }
        Some(Commands::Config { action }) => {
            config::cmd_config(cli.config.as_deref(), action).await?;
        }
    }

    Ok(())
}

/// Display version information
fn cmd_version() {
    println!("agentrelay {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Relay chat messages to a remote agent loop");
}
