//! CLI error type.

use std::fmt;
use std::path::PathBuf;

use lazytree::{ConfigError, LoggingError, UpdateError};

/// Errors surfaced to the user by the CLI.
#[derive(Debug)]
pub enum CliError {
    /// Settings could not be loaded or written.
    Config(String),
    /// The tracing subscriber could not be installed.
    Logging(LoggingError),
    /// The simulation could not be set up or did not settle.
    Simulation(String),
    /// A viewer request was refused.
    Request(UpdateError),
    /// A file could not be written.
    Write { path: PathBuf, source: std::io::Error },
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Logging(e) => write!(f, "Logging error: {}", e),
            CliError::Simulation(msg) => write!(f, "Simulation failed: {}", msg),
            CliError::Request(e) => write!(f, "Request refused: {}", e),
            CliError::Write { path, source } => {
                write!(f, "Failed to write {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Logging(e) => Some(e),
            CliError::Request(e) => Some(e),
            CliError::Write { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<UpdateError> for CliError {
    fn from(e: UpdateError) -> Self {
        CliError::Request(e)
    }
}
