//! Replay command handler
//!
//! Applies recorded actions, one JSON object per line, to a fresh store.
//! Useful for checking how a captured session folds into state without
//! connecting to the event source.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use folio_core::{Action, Config, Store};

use crate::output::Output;

/// Outcome of a replay
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Lines dispatched as actions
    pub applied: usize,
    /// Lines that were not actions
    pub skipped: usize,
}

/// Replay a file (or stdin for `-`) and print the resulting state
pub fn replay(config: &Config, file: &Path, steps: bool, output: &Output) -> Result<()> {
    let store = Store::from_config(config);

    let summary = if file == Path::new("-") {
        replay_lines(io::stdin().lock(), &store, |state| {
            if steps {
                output.print_state(state)
            }
        })?
    } else {
        let reader = BufReader::new(
            File::open(file).with_context(|| format!("Failed to open {:?}", file))?,
        );
        replay_lines(reader, &store, |state| {
            if steps {
                output.print_state(state)
            }
        })?
    };

    if !steps {
        output.print_state(&store.snapshot());
    }
    if !output.is_quiet() && !output.is_json() {
        println!(
            "\n{} action(s) applied, {} line(s) skipped",
            summary.applied, summary.skipped
        );
    }

    Ok(())
}

/// Dispatch every action line from `reader` into `store`
///
/// Blank lines are ignored; lines that don't parse as an action are
/// skipped with a warning.
pub fn replay_lines<R: BufRead>(
    reader: R,
    store: &Store,
    mut on_state: impl FnMut(&folio_core::AppState),
) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read replay input")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<Action>(line) {
            Ok(action) => {
                let state = store.dispatch_action(&action);
                on_state(&state);
                summary.applied += 1;
            }
            Err(e) => {
                warn!("Skipping line {}: {}", index + 1, e);
                summary.skipped += 1;
            }
        }
    }

    Ok(summary)
}
