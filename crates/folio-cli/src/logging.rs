//! Logging setup
//!
//! Logs go to stderr, or to `log_file` when configured. `RUST_LOG` wins
//! over the `-v` flags when set.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing::info;
use tracing_subscriber::EnvFilter;

use folio_core::Config;

/// Map `-v` occurrences to a level
pub fn level_for(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Build the filter for our crates
///
/// `log_transitions` needs folio_core at debug or finer to be visible.
pub fn filter_directives(verbose: u8, log_transitions: bool) -> String {
    let level = level_for(verbose);
    let core_level = if log_transitions && verbose < 2 {
        "debug"
    } else {
        level
    };
    format!("folio_core={},folio_cli={}", core_level, level)
}

/// Initialize logging (ignores a second initialization)
pub fn init(config: &Config, verbose: u8) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(verbose, config.log_transitions)));

    match config.log_file {
        Some(ref log_path) => {
            let log_file = match OpenOptions::new().create(true).append(true).open(log_path) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
                    return;
                }
            };

            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_ansi(false)
                .with_writer(Mutex::new(log_file))
                .try_init();

            info!("Logging initialized to {:?}", log_path);
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}
