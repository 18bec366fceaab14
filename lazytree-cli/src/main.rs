//! lazytree CLI - drive the update engine from the command line
//!
//! `lazytree simulate` loads a synthetic debugger session (threads, stack
//! frames, variables) through the asynchronous update engine and prints the
//! tree it ends up showing together with the engine's counters.
//! `lazytree config` shows or writes the settings file.

mod commands;
mod error;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use lazytree::Settings;

use commands::config::ConfigCommands;
use commands::simulate::SimulateArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "lazytree")]
#[command(about = "Asynchronous update engine for lazily populated trees", long_about = None)]
#[command(version)]
struct Cli {
    /// Settings file (INI); defaults apply when omitted
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Load a synthetic debugger session and print the resulting tree
    Simulate(SimulateArgs),

    /// Show or initialize the settings file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Simulate(args) => {
            let settings = load_settings(cli.config.as_deref())?;
            commands::simulate::run(args, settings)
        }
        Commands::Config { command } => commands::config::run(command, cli.config.as_deref()),
    }
}

/// Loads the settings file if one was given.
pub(crate) fn load_settings(path: Option<&Path>) -> Result<Settings, CliError> {
    match path {
        Some(path) => Ok(Settings::load(path)?),
        None => Ok(Settings::default()),
    }
}
