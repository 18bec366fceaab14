//! Viewer configuration.
//!
//! # Example Configuration (INI)
//!
//! ```ini
//! [viewer]
//! auto_expand_level = 2
//! presentation_id = variables
//! columns = name, value, type
//! quiet_period_ms = 50
//!
//! [logging]
//! filter = lazytree=debug
//! file = /tmp/lazytree.log
//! ```
//!
//! Missing keys keep their defaults; unknown keys are ignored.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::logging::LoggingConfig;

/// Auto-expand level that expands every level.
pub const ALL_LEVELS: i32 = -1;

/// Default auto-expand level (no automatic expansion).
pub const DEFAULT_AUTO_EXPAND_LEVEL: i32 = 0;

/// Default presentation context id.
pub const DEFAULT_PRESENTATION_ID: &str = "default";

/// Default quiet period for [`run_until_idle`](crate::TreeModelViewer::run_until_idle).
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(50);

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid value '{value}' for [{section}] {key}")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
    },
}

/// Settings of one viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerConfig {
    /// Items whose depth is below this level expand as they appear;
    /// [`ALL_LEVELS`] expands everything, 0 nothing.
    pub auto_expand_level: i32,

    /// Presentation context id handed to providers.
    pub presentation_id: String,

    /// Visible column ids; empty for a single-column tree.
    pub columns: Vec<String>,

    /// How long the display queue must stay empty before the viewer counts
    /// as idle.
    pub quiet_period: Duration,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            auto_expand_level: DEFAULT_AUTO_EXPAND_LEVEL,
            presentation_id: DEFAULT_PRESENTATION_ID.to_string(),
            columns: Vec::new(),
            quiet_period: DEFAULT_QUIET_PERIOD,
        }
    }
}

impl ViewerConfig {
    /// Returns true if an item at `depth` expands automatically.
    pub fn auto_expands(&self, depth: usize) -> bool {
        self.auto_expand_level == ALL_LEVELS
            || (self.auto_expand_level > 0 && (depth as i64) < i64::from(self.auto_expand_level))
    }
}

/// Everything a config file can set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub viewer: ViewerConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Loads settings from an INI file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Parses settings from INI text.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut settings = Settings::default();

        if let Some(section) = ini.section(Some("viewer")) {
            let viewer = &mut settings.viewer;
            if let Some(value) = section.get("auto_expand_level") {
                viewer.auto_expand_level = parse_level(value)?;
            }
            if let Some(value) = section.get("presentation_id") {
                viewer.presentation_id = value.trim().to_string();
            }
            if let Some(value) = section.get("columns") {
                viewer.columns = value
                    .split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(String::from)
                    .collect();
            }
            if let Some(value) = section.get("quiet_period_ms") {
                let millis: u64 = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    section: "viewer",
                    key: "quiet_period_ms",
                    value: value.to_string(),
                })?;
                viewer.quiet_period = Duration::from_millis(millis);
            }
        }

        if let Some(section) = ini.section(Some("logging")) {
            if let Some(value) = section.get("filter") {
                settings.logging.filter = value.trim().to_string();
            }
            if let Some(value) = section.get("file") {
                let value = value.trim();
                settings.logging.file = (!value.is_empty()).then(|| PathBuf::from(value));
            }
        }

        Ok(settings)
    }

    /// Renders the settings as INI text.
    pub fn to_ini_string(&self) -> String {
        let mut ini = Ini::new();
        ini.with_section(Some("viewer"))
            .set("auto_expand_level", self.viewer.auto_expand_level.to_string())
            .set("presentation_id", self.viewer.presentation_id.clone())
            .set("columns", self.viewer.columns.join(", "))
            .set(
                "quiet_period_ms",
                self.viewer.quiet_period.as_millis().to_string(),
            );
        let mut logging = ini.with_section(Some("logging"));
        logging.set("filter", self.logging.filter.clone());
        if let Some(file) = &self.logging.file {
            logging.set("file", file.display().to_string());
        }

        let mut out = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = ini.write_to(&mut out);
        String::from_utf8_lossy(&out).into_owned()
    }
}

fn parse_level(value: &str) -> Result<i32, ConfigError> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("all") {
        return Ok(ALL_LEVELS);
    }
    match value.parse::<i32>() {
        Ok(level) if level >= ALL_LEVELS => Ok(level),
        _ => Err(ConfigError::InvalidValue {
            section: "viewer",
            key: "auto_expand_level",
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.viewer.auto_expand_level, DEFAULT_AUTO_EXPAND_LEVEL);
        assert_eq!(settings.viewer.presentation_id, DEFAULT_PRESENTATION_ID);
        assert!(settings.viewer.columns.is_empty());
        assert_eq!(settings.viewer.quiet_period, DEFAULT_QUIET_PERIOD);
        assert!(settings.logging.file.is_none());
    }

    #[test]
    fn test_ini_overrides() {
        let text = "\
[viewer]
auto_expand_level = all
presentation_id = registers
columns = name, value ,type
quiet_period_ms = 10

[logging]
filter = lazytree=trace
file = /tmp/lazytree.log
";
        let settings = Settings::from_ini_str(text).unwrap();
        assert_eq!(settings.viewer.auto_expand_level, ALL_LEVELS);
        assert_eq!(settings.viewer.presentation_id, "registers");
        assert_eq!(settings.viewer.columns, vec!["name", "value", "type"]);
        assert_eq!(settings.viewer.quiet_period, Duration::from_millis(10));
        assert_eq!(settings.logging.filter, "lazytree=trace");
        assert_eq!(settings.logging.file, Some(PathBuf::from("/tmp/lazytree.log")));
    }

    #[test]
    fn test_invalid_level_rejected() {
        let err = Settings::from_ini_str("[viewer]\nauto_expand_level = -5\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "auto_expand_level",
                ..
            }
        ));
    }

    #[test]
    fn test_load_from_file_round_trips() {
        let mut settings = Settings::default();
        settings.viewer.auto_expand_level = 2;
        settings.viewer.columns = vec!["name".into(), "value".into()];

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(settings.to_ini_string().as_bytes()).unwrap();

        let loaded = Settings::load(file.path()).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = Settings::load(Path::new("/nonexistent/lazytree.ini")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/lazytree.ini"));
    }

    #[test]
    fn test_auto_expands() {
        let mut config = ViewerConfig::default();
        assert!(!config.auto_expands(0));
        config.auto_expand_level = 2;
        assert!(config.auto_expands(1));
        assert!(!config.auto_expands(2));
        config.auto_expand_level = ALL_LEVELS;
        assert!(config.auto_expands(10));
    }
}
