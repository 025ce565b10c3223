//! Configuration validation: unknown-field detection on the raw file and
//! semantic checks on the loaded [`Config`].

use serde_json::Value;
use std::collections::HashSet;

use super::{BotAppType, Config};

/// Known top-level config field names.
const KNOWN_TOP_LEVEL: &[&str] = &["identity", "logic_app", "timeouts", "retry", "logging"];

/// Known fields for each section.
const KNOWN_SECTIONS: &[(&str, &[&str])] = &[
    ("identity", &["client_id", "app_type", "tenant_id", "app_secret"]),
    ("logic_app", &["endpoint", "client_id"]),
    ("timeouts", &["agent_ms", "token_ms"]),
    ("retry", &["max_retries", "base_delay_ms", "max_delay_ms"]),
    ("logging", &["format", "level", "file"]),
];

/// A validation diagnostic.
#[derive(Debug)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub path: String,
    pub message: String,
}

#[derive(Debug, PartialEq)]
pub enum DiagnosticLevel {
    Ok,
    Warn,
    Error,
}

impl Diagnostic {
    fn new(level: DiagnosticLevel, path: &str, message: impl Into<String>) -> Self {
        Self {
            level,
            path: path.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.level {
            DiagnosticLevel::Ok => "[OK]",
            DiagnosticLevel::Warn => "[WARN]",
            DiagnosticLevel::Error => "[ERROR]",
        };
        if self.path.is_empty() {
            write!(f, "{} {}", prefix, self.message)
        } else {
            write!(f, "{} {}: {}", prefix, self.path, self.message)
        }
    }
}

/// Returns `true` if any diagnostic is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics
        .iter()
        .any(|d| d.level == DiagnosticLevel::Error)
}

/// Simple Levenshtein distance for "did you mean?" suggestions.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut matrix = vec![vec![0usize; b.len() + 1]; a.len() + 1];

    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for (j, val) in matrix[0].iter_mut().enumerate() {
        *val = j;
    }

    for (i, ca) in a.iter().enumerate() {
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            matrix[i + 1][j + 1] = std::cmp::min(
                std::cmp::min(matrix[i][j + 1] + 1, matrix[i + 1][j] + 1),
                matrix[i][j] + cost,
            );
        }
    }
    matrix[a.len()][b.len()]
}

/// Suggest the closest known field name (if distance <= 3).
pub fn suggest_field(unknown: &str, known: &[&str]) -> Option<String> {
    known
        .iter()
        .map(|k| (k, levenshtein(unknown, k)))
        .filter(|(_, d)| *d <= 3)
        .min_by_key(|(_, d)| *d)
        .map(|(k, _)| format!("did you mean '{}'?", k))
}

fn unknown_field(path: String, key: &str, known: &[&str]) -> Diagnostic {
    let message = match suggest_field(key, known) {
        Some(suggestion) => format!("Unknown field '{}' ({})", key, suggestion),
        None => format!("Unknown field '{}'", key),
    };
    Diagnostic {
        level: DiagnosticLevel::Error,
        path,
        message,
    }
}

/// Validate a raw JSON config value against known field names.
pub fn validate_raw(raw: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let obj = match raw.as_object() {
        Some(o) => o,
        None => {
            diagnostics.push(Diagnostic::new(
                DiagnosticLevel::Error,
                "",
                "Config must be a JSON object",
            ));
            return diagnostics;
        }
    };

    let known_top: HashSet<&str> = KNOWN_TOP_LEVEL.iter().copied().collect();
    for key in obj.keys() {
        if !known_top.contains(key.as_str()) {
            diagnostics.push(unknown_field(key.clone(), key, KNOWN_TOP_LEVEL));
        }
    }

    for (section, fields) in KNOWN_SECTIONS {
        if let Some(section_obj) = obj.get(*section).and_then(|v| v.as_object()) {
            let known: HashSet<&str> = fields.iter().copied().collect();
            for key in section_obj.keys() {
                if !known.contains(key.as_str()) {
                    diagnostics.push(unknown_field(
                        format!("{}.{}", section, key),
                        key,
                        fields,
                    ));
                }
            }
        }
    }

    if diagnostics.is_empty() {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Ok,
            "",
            "All fields recognized",
        ));
    }

    diagnostics
}

/// Semantic checks on a loaded configuration.
///
/// A missing agent loop endpoint is reported here at startup, but the agent
/// client still refuses to call without one at request time.
pub fn validate(config: &Config) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    match config.logic_app.endpoint() {
        None => diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "logic_app.endpoint",
            "LOGIC_APP_ENDPOINT not configured",
        )),
        Some(endpoint) => {
            if endpoint.starts_with("https://") || endpoint.starts_with("http://") {
                diagnostics.push(Diagnostic::new(
                    DiagnosticLevel::Ok,
                    "logic_app.endpoint",
                    "Agent loop endpoint configured",
                ));
            } else {
                diagnostics.push(Diagnostic::new(
                    DiagnosticLevel::Error,
                    "logic_app.endpoint",
                    format!("'{}' is not an http(s) URL", endpoint),
                ));
            }
        }
    }

    match &config.identity.app_type {
        BotAppType::UserAssignedMsi if config.identity.client_id.is_none() => {
            diagnostics.push(Diagnostic::new(
                DiagnosticLevel::Warn,
                "identity.client_id",
                "UserAssignedMsi without CLIENT_ID uses the system-assigned identity",
            ));
        }
        BotAppType::SingleTenant if config.identity.tenant_id.is_none() => {
            diagnostics.push(Diagnostic::new(
                DiagnosticLevel::Warn,
                "identity.tenant_id",
                "SingleTenant bots normally set TENANT_ID",
            ));
        }
        BotAppType::Other(other) => {
            diagnostics.push(Diagnostic::new(
                DiagnosticLevel::Warn,
                "identity.app_type",
                format!("Unrecognized BOT_TYPE '{}'", other),
            ));
        }
        _ => {}
    }

    if config.timeouts.agent_ms == 0 {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "timeouts.agent_ms",
            "must be greater than zero",
        ));
    }
    if config.timeouts.token_ms == 0 {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "timeouts.token_ms",
            "must be greater than zero",
        ));
    }

    diagnostics
}
