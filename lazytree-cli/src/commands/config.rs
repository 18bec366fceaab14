//! Settings CLI commands.
//!
//! Provides `config show` and `config init` for inspecting and creating the
//! INI settings file.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Subcommand;
use lazytree::Settings;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the effective settings as INI
    Show,

    /// Write a settings file with every key at its default
    Init {
        /// Destination file
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, config: Option<&Path>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show => run_show(config),
        ConfigCommands::Init { path, force } => {
            write_defaults(&path, force)?;
            println!("Wrote default settings to {}", path.display());
            Ok(())
        }
    }
}

fn run_show(config: Option<&Path>) -> Result<(), CliError> {
    let settings = crate::load_settings(config)?;
    match config {
        Some(path) => println!("; settings from {}", path.display()),
        None => println!("; default settings"),
    }
    print!("{}", settings.to_ini_string());
    Ok(())
}

/// Writes the default settings to `path`.
fn write_defaults(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        )));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| CliError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, Settings::default().to_ini_string()).map_err(|source| CliError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_loadable_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("lazytree.ini");

        write_defaults(&path, false).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded, Settings::default());
    }

    #[test]
    fn test_init_refuses_to_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lazytree.ini");
        fs::write(&path, "[viewer]\nauto_expand_level = 3\n").unwrap();

        let err = write_defaults(&path, false).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
        assert!(fs::read_to_string(&path).unwrap().contains("= 3"));

        write_defaults(&path, true).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), Settings::default());
    }
}
