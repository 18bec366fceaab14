//! Tracing subscriber installation.
//!
//! The library only emits `tracing` events; hosts decide where they go. The
//! CLI calls [`init_logging`] once at startup:
//!
//! ```text
//! RUST_LOG (if set) ──┐
//!                     ├──► EnvFilter ──► fmt layer (stderr)
//! [logging] filter ───┘              └─► fmt layer (file, non-blocking)
//! ```

use std::path::PathBuf;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Default filter directive when neither `RUST_LOG` nor a config sets one.
pub const DEFAULT_LOG_FILTER: &str = "lazytree=info";

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{filter}': {message}")]
    InvalidFilter { filter: String, message: String },

    #[error("cannot log to {path}: {message}")]
    File { path: PathBuf, message: String },

    #[error("failed to install tracing subscriber: {0}")]
    Install(String),
}

/// Where log events go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directives; `RUST_LOG` overrides them.
    pub filter: String,

    /// Optional file receiving a copy of every event.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Builds the event filter, preferring `RUST_LOG` when it is set.
    pub fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(&self.filter).map_err(|e| LoggingError::InvalidFilter {
            filter: self.filter.clone(),
            message: e.to_string(),
        })
    }
}

/// Installs the global subscriber.
///
/// Returns the guard of the file writer, if one was configured; events
/// buffered for the file are flushed when it is dropped.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = config.env_filter()?;

    let (file_layer, guard) = match &config.file {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::Install(e.to_string()))?;

    Ok(guard)
}

fn file_writer(
    path: &PathBuf,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard), LoggingError> {
    let file_name = path.file_name().ok_or_else(|| LoggingError::File {
        path: path.clone(),
        message: "path has no file name".to_string(),
    })?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&directory).map_err(|e| LoggingError::File {
        path: path.clone(),
        message: e.to_string(),
    })?;

    let appender = tracing_appender::rolling::never(directory, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        let config = LoggingConfig::default();
        assert_eq!(config.filter, DEFAULT_LOG_FILTER);
        assert!(config.file.is_none());
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let config = LoggingConfig {
            filter: "lazytree=[".to_string(),
            file: None,
        };
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(matches!(
                config.env_filter(),
                Err(LoggingError::InvalidFilter { .. })
            ));
        }
    }

    #[test]
    fn test_file_writer_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("lazytree.log");
        let (_writer, _guard) = file_writer(&path).unwrap();
        assert!(dir.path().join("logs").is_dir());
    }
}
