//! Config command handlers

use std::path::PathBuf;

use anyhow::{Context, Result};

use folio_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "endpoint": config.endpoint,
                    "socket_url": config.socket_url().ok(),
                    "protocol": config.protocol,
                    "log_transitions": config.log_transitions,
                    "log_file": config.log_file,
                    "reconnect_initial_ms": config.reconnect_initial_ms,
                    "reconnect_max_ms": config.reconnect_max_ms
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.endpoint);
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  endpoint:             {}", config.endpoint);
            println!(
                "  socket_url:           {}",
                config
                    .socket_url()
                    .unwrap_or_else(|e| format!("(invalid: {})", e))
            );
            println!("  protocol:             {}", config.protocol);
            println!("  log_transitions:      {}", config.log_transitions);
            println!(
                "  log_file:             {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!("  reconnect_initial_ms: {}", config.reconnect_initial_ms);
            println!("  reconnect_max_ms:     {}", config.reconnect_max_ms);
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    config.set_value(&key, &value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}
