//! Config check command handler.

use std::path::Path;

use anyhow::{Context, Result};

use agentrelay::config::validate::{self, Diagnostic, DiagnosticLevel};
use agentrelay::config::Config;

use super::common::load_config;
use super::ConfigAction;

/// Validate configuration file and environment.
pub(crate) async fn cmd_config(config_path: Option<&Path>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Check => {
            let path = config_path
                .map(Path::to_path_buf)
                .unwrap_or_else(Config::path);
            println!("Config file: {}", path.display());

            let mut diagnostics: Vec<Diagnostic> = Vec::new();
            if path.exists() {
                let content =
                    std::fs::read_to_string(&path).context("Failed to read config file")?;
                match serde_json::from_str::<serde_json::Value>(&content) {
                    Ok(raw) => diagnostics.extend(validate::validate_raw(&raw)),
                    Err(e) => {
                        println!("[ERROR] Invalid JSON: {}", e);
                        anyhow::bail!("configuration check failed");
                    }
                }
            } else {
                println!("[OK] No config file found (using defaults and environment)");
            }

            let config = load_config(Some(&path))?;
            diagnostics.extend(validate::validate(&config));

            for diag in &diagnostics {
                println!("{}", diag);
            }

            let errors = diagnostics
                .iter()
                .filter(|d| d.level == DiagnosticLevel::Error)
                .count();
            let warnings = diagnostics
                .iter()
                .filter(|d| d.level == DiagnosticLevel::Warn)
                .count();

            if errors == 0 && warnings == 0 {
                println!("\nConfiguration looks good!");
            } else {
                println!("\nFound {} error(s), {} warning(s)", errors, warnings);
            }

            if validate::has_errors(&diagnostics) {
                anyhow::bail!("configuration check failed");
            }
        }
    }
    Ok(())
}
