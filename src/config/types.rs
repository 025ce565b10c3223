//! Configuration types for AgentRelay

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scope used when the primary agent-loop token cannot be minted.
pub const FALLBACK_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Default outbound agent loop timeout.
pub const DEFAULT_AGENT_TIMEOUT_MS: u64 = 30_000;

/// Default bound on a single token acquisition.
pub const DEFAULT_TOKEN_TIMEOUT_MS: u64 = 10_000;

/// Main configuration struct for AgentRelay.
///
/// Built once at startup and shared read-only with every component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bot identity settings
    pub identity: IdentityConfig,
    /// Remote agent loop settings
    pub logic_app: LogicAppConfig,
    /// Timeouts for outbound calls
    pub timeouts: TimeoutConfig,
    /// Retry policy for agent loop calls
    pub retry: RetryConfig,
    /// Logging output
    pub logging: LoggingConfig,
}

// ============================================================================
// Identity
// ============================================================================

/// How the bot authenticates with the messaging platform.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BotAppType {
    /// Managed identity assigned to the hosting resource.
    #[default]
    UserAssignedMsi,
    /// App registration limited to one tenant.
    SingleTenant,
    /// App registration usable from any tenant.
    MultiTenant,
    /// Any other discriminator, kept verbatim.
    Other(String),
}

impl BotAppType {
    /// Parse the `BOT_TYPE` discriminator. Matching is case-insensitive.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "userassignedmsi" => Self::UserAssignedMsi,
            "singletenant" => Self::SingleTenant,
            "multitenant" => Self::MultiTenant,
            _ => Self::Other(value.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::UserAssignedMsi => "UserAssignedMsi",
            Self::SingleTenant => "SingleTenant",
            Self::MultiTenant => "MultiTenant",
            Self::Other(s) => s,
        }
    }

    /// Whether the bot itself authenticates through the managed identity.
    pub fn uses_managed_identity(&self) -> bool {
        matches!(self, Self::UserAssignedMsi)
    }
}

impl fmt::Display for BotAppType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for BotAppType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BotAppType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// Bot identity settings (`CLIENT_ID`, `BOT_TYPE`, `TENANT_ID`, `CLIENT_SECRET`).
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Client id of the default managed identity
    pub client_id: Option<String>,
    /// Bot/app type discriminator
    pub app_type: BotAppType,
    /// Tenant the bot is registered in
    pub tenant_id: Option<String>,
    /// App secret (only for secret-based app types)
    pub app_secret: Option<String>,
}

impl fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("client_id", &self.client_id)
            .field("app_type", &self.app_type)
            .field("tenant_id", &self.tenant_id)
            .field(
                "app_secret",
                &self.app_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

// ============================================================================
// Agent loop
// ============================================================================

/// Remote agent loop settings (`LOGIC_APP_ENDPOINT`, `LOGIC_APP_CLIENT_ID`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogicAppConfig {
    /// URL the user query is POSTed to
    pub endpoint: Option<String>,
    /// Managed identity client id used to mint agent loop tokens
    pub client_id: Option<String>,
}

impl LogicAppConfig {
    /// The configured endpoint, treating an empty string as absent.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Token audience for the agent loop: `<endpoint>/.default`.
    pub fn scope(&self) -> Option<String> {
        self.endpoint().map(|e| format!("{}/.default", e))
    }
}

// ============================================================================
// Timeouts & retry
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Hard timeout for the agent loop POST
    pub agent_ms: u64,
    /// Upper bound for one token acquisition
    pub token_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            agent_ms: DEFAULT_AGENT_TIMEOUT_MS,
            token_ms: DEFAULT_TOKEN_TIMEOUT_MS,
        }
    }
}

/// Bounded retry for agent loop transport failures. Off by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

// ============================================================================
// Logging
// ============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output
    Pretty,
    /// Compact single-line output with component fields
    #[default]
    Component,
    /// JSON lines
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "component" => Some(Self::Component),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
    /// Optional file for JSON output
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: "info".to_string(),
            file: None,
        }
    }
}
