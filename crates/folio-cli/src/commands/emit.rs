//! Emit command handler

use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;

use folio_core::sync::{spawn_connection, ConnectionConfig, SERVER_PREFIX};
use folio_core::{Action, Config, Store};

use crate::output::Output;

/// How long to wait for the connection before giving up
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// How long to wait for the action to be written once connected
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Connect, send one server action, then disconnect
pub async fn emit(config: &Config, kind: String, data: Option<String>, output: &Output) -> Result<()> {
    let action = build_action(&kind, data.as_deref())?;
    let connection =
        ConnectionConfig::from_config(config).context("Invalid endpoint configuration")?;

    output.message(&format!("Connecting to {}...", connection.url));
    let handle = spawn_connection(connection, Store::from_config(config));

    let connected = tokio::time::timeout(CONNECT_TIMEOUT, handle.wait_connected()).await;
    if !matches!(connected, Ok(Ok(()))) {
        handle.shutdown().await.ok();
        anyhow::bail!(
            "Could not connect to the event source within {:?}",
            CONNECT_TIMEOUT
        );
    }

    let action_kind = action.kind.clone();
    let sent = tokio::time::timeout(SEND_TIMEOUT, handle.emit_confirmed(action)).await;
    handle.shutdown().await?;

    match sent {
        Ok(Ok(_)) => {
            output.success(&format!("Sent {}", action_kind));
            Ok(())
        }
        Ok(Err(e)) => Err(e.context(format!("{} was not confirmed as sent", action_kind))),
        Err(_) => anyhow::bail!(
            "{} was not confirmed as sent within {:?}",
            action_kind,
            SEND_TIMEOUT
        ),
    }
}

/// Build a server action, adding the `server/` prefix when missing
///
/// Data that isn't valid JSON is sent as a string.
pub fn build_action(kind: &str, data: Option<&str>) -> Result<Action> {
    let kind = kind.trim();
    if kind.is_empty() || kind == SERVER_PREFIX {
        anyhow::bail!("Action type must not be empty");
    }

    let kind = if kind.starts_with(SERVER_PREFIX) {
        kind.to_string()
    } else {
        format!("{}{}", SERVER_PREFIX, kind)
    };

    Ok(match data {
        Some(raw) => {
            let value =
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            Action::with_data(kind, value)
        }
        None => Action::new(kind),
    })
}
