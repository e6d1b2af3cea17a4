//! folio CLI
//!
//! Command-line host for the folio live state: watch the visitor count,
//! donation banner and polls as the event source pushes them.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use folio_core::Config;

mod commands;
mod logging;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "folio - live visitor, donation and poll state")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and print every state change (default)
    Watch,
    /// Apply recorded actions (JSON lines) offline and print the result
    Replay {
        /// File with one action per line, or - for stdin
        file: PathBuf,
        /// Print the state after every action
        #[arg(long)]
        steps: bool,
    },
    /// Send one action to the server
    Emit {
        /// Action type (the server/ prefix is added when missing)
        #[arg(value_name = "TYPE")]
        kind: String,
        /// Action data as JSON (plain text is sent as a string)
        data: Option<String>,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (endpoint, protocol, log_transitions, log_file, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // Config commands work even when the file is broken or half-written
    if let Some(Commands::Config { command }) = &cli.command {
        return handle_config_command(command.clone(), config_path, &output);
    }

    let config = Config::load_with_cli_override(config_path)?;
    logging::init(&config, cli.verbose);

    match cli.command.unwrap_or(Commands::Watch) {
        Commands::Watch => commands::watch::watch(&config, &output).await,
        Commands::Replay { file, steps } => {
            commands::replay::replay(&config, &file, steps, &output)
        }
        Commands::Emit { kind, data } => commands::emit::emit(&config, kind, data, &output).await,
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}
