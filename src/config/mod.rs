//! Configuration management for AgentRelay
//!
//! Configuration is loaded once at startup from `~/.agentrelay/config.json`
//! (optional) with environment variable overrides, then passed by value or
//! `Arc` into each component. Nothing reads the environment after startup.

mod types;
pub mod validate;

pub use types::*;

use crate::error::Result;
use std::path::{Path, PathBuf};

impl Config {
    /// Returns the AgentRelay configuration directory path (~/.agentrelay)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".agentrelay")
    }

    /// Returns the path to the config file (~/.agentrelay/config.json)
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load configuration from the default path with environment overrides.
    ///
    /// If the config file doesn't exist, defaults are used before the
    /// environment is applied.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    /// Load configuration from a specific path with environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Build configuration purely from the process environment.
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// The bot-identity and agent-loop variables keep the names the hosting
    /// platform provisions (`CLIENT_ID`, `LOGIC_APP_ENDPOINT`, ...). Relay
    /// tuning knobs use the `AGENTRELAY_` prefix.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Identity
        if let Some(val) = lookup("CLIENT_ID") {
            self.identity.client_id = non_empty(val);
        }
        if let Some(val) = lookup("BOT_TYPE") {
            self.identity.app_type = BotAppType::parse(&val);
        }
        if let Some(val) = lookup("TENANT_ID") {
            self.identity.tenant_id = non_empty(val);
        }
        if let Some(val) = lookup("CLIENT_SECRET") {
            self.identity.app_secret = non_empty(val);
        }

        // Agent loop
        if let Some(val) = lookup("LOGIC_APP_ENDPOINT") {
            self.logic_app.endpoint = non_empty(val);
        }
        if let Some(val) = lookup("LOGIC_APP_CLIENT_ID") {
            self.logic_app.client_id = non_empty(val);
        }

        // Timeouts
        if let Some(v) = lookup("AGENTRELAY_AGENT_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.timeouts.agent_ms = v;
        }
        if let Some(v) = lookup("AGENTRELAY_TOKEN_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.timeouts.token_ms = v;
        }

        // Retry
        if let Some(v) = lookup("AGENTRELAY_AGENT_MAX_RETRIES").and_then(|v| v.parse().ok()) {
            self.retry.max_retries = v;
        }

        // Logging
        if let Some(val) = lookup("AGENTRELAY_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Some(format) = lookup("AGENTRELAY_LOG_FORMAT").and_then(|v| LogFormat::parse(&v)) {
            self.logging.format = format;
        }
    }

    /// Client id used for the primary agent-loop token.
    ///
    /// Prefers the dedicated `LOGIC_APP_CLIENT_ID`, then the default identity.
    pub fn agent_client_id(&self) -> Option<&str> {
        self.logic_app
            .client_id
            .as_deref()
            .or(self.identity.client_id.as_deref())
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
