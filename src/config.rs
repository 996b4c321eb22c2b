//! Configuration for termscreen.
//!
//! Settings are read from `~/.termscreen/config.toml`:
//!
//! ```toml
//! # Keep what the terminal shows instead of switching to the alternate screen
//! preserve_screen = false
//!
//! # Reserve the last row for a status line
//! status_line = true
//!
//! tab_size = 8
//!
//! # Cursor while the session is active: invisible, normal, very-visible
//! cursor = "normal"
//!
//! # Log filter for ~/.termscreen/termscreen.log (RUST_LOG overrides)
//! log_level = "info"
//! ```
//!
//! Setting `TERMSCREEN_PRESERVE` to anything but `0` forces
//! `preserve_screen = true`.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::driver::CursorMode;
use crate::core::session::DEFAULT_TAB_SIZE;

/// Environment override for `preserve_screen`
pub const PRESERVE_ENV: &str = "TERMSCREEN_PRESERVE";

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub preserve_screen: bool,
    pub status_line: bool,
    pub tab_size: u8,
    pub cursor: CursorMode,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preserve_screen: false,
            status_line: false,
            tab_size: DEFAULT_TAB_SIZE,
            cursor: CursorMode::Normal,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults
    pub fn load() -> Self {
        let mut config = Self::get_config_path()
            .filter(|path| path.exists())
            .and_then(|path| fs::read_to_string(&path).ok())
            .and_then(|content| match Self::from_toml_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("ignoring invalid config file: {}", e);
                    None
                }
            })
            .unwrap_or_default();

        config.apply_env_override(std::env::var(PRESERVE_ENV).ok().as_deref());
        config
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply the value of `TERMSCREEN_PRESERVE`, if set
    pub fn apply_env_override(&mut self, value: Option<&str>) {
        if let Some(value) = value {
            if !value.is_empty() && value != "0" {
                self.preserve_screen = true;
            }
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<(), String> {
        let path = Self::get_config_path().ok_or("Could not determine config path")?;
        let content = toml::to_string_pretty(self).map_err(|e| e.to_string())?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        fs::write(&path, content).map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Directory holding the config and log files
    pub fn config_dir() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".termscreen"))
    }

    fn get_config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    pub fn log_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("termscreen.log"))
    }
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.tab_size, 8);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_partial_file() {
        let config = Config::from_toml_str(
            "status_line = true\ncursor = \"invisible\"\ntab_size = 4\n",
        )
        .unwrap();
        assert!(config.status_line);
        assert!(!config.preserve_screen);
        assert_eq!(config.cursor, CursorMode::Invisible);
        assert_eq!(config.tab_size, 4);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        assert!(Config::from_toml_str("tab_size = \"wide\"").is_err());
        assert!(Config::from_toml_str("cursor = \"blinking\"").is_err());
    }

    #[test]
    fn test_env_override() {
        let mut config = Config::default();
        config.apply_env_override(None);
        assert!(!config.preserve_screen);
        config.apply_env_override(Some("0"));
        assert!(!config.preserve_screen);
        config.apply_env_override(Some(""));
        assert!(!config.preserve_screen);
        config.apply_env_override(Some("yes"));
        assert!(config.preserve_screen);
    }

    #[test]
    fn test_serialized_config_reads_back() {
        let config = Config {
            status_line: true,
            cursor: CursorMode::VeryVisible,
            log_level: "debug".to_string(),
            ..Config::default()
        };
        let text = toml::to_string_pretty(&config).unwrap();
        assert!(text.contains("cursor = \"very-visible\""));
        assert_eq!(Config::from_toml_str(&text).unwrap(), config);
    }
}
