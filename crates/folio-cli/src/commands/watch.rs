//! Watch command handler

use anyhow::{Context, Result};
use tracing::info;

use folio_core::sync::{spawn_connection, ConnectionConfig};
use folio_core::{AppState, Config, Store};

use crate::output::Output;

/// Stay connected and print every state change until Ctrl-C
pub async fn watch(config: &Config, output: &Output) -> Result<()> {
    let connection =
        ConnectionConfig::from_config(config).context("Invalid endpoint configuration")?;

    let store = Store::from_config(config);
    let mut state_rx = store.subscribe();

    output.message(&format!("Connecting to {}...", connection.url));
    let handle = spawn_connection(connection, store);
    let mut status_rx = handle.subscribe_status();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut last_printed: Option<AppState> = None;
    let initial = state_rx.borrow_and_update().clone();
    print_if_changed(output, initial, &mut last_printed);

    loop {
        tokio::select! {
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = state_rx.borrow_and_update().clone();
                // Unknown events still notify; only print real changes
                print_if_changed(output, state, &mut last_printed);
            }
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = *status_rx.borrow_and_update();
                output.print_status(status);
            }
            _ = &mut ctrl_c => {
                info!("Interrupted, closing connection");
                break;
            }
        }
    }

    handle.shutdown().await
}

/// Print `state` unless it is what was printed last
fn print_if_changed(output: &Output, state: AppState, last_printed: &mut Option<AppState>) -> bool {
    if last_printed.as_ref() == Some(&state) {
        return false;
    }
    output.print_state(&state);
    *last_printed = Some(state);
    true
}
