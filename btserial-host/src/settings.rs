//! Host settings

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::HostError;

/// Which device backs bridge connections
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Real serial ports (RFCOMM links, USB-serial adapters)
    #[default]
    Serial,
    /// Built-in echo device
    Echo,
}

/// Bridge host settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostSettings {
    /// TCP address to listen on
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Baud rate used when opening serial ports
    #[serde(default = "default_baud")]
    pub baud_rate: u32,
    /// Device backend
    #[serde(default)]
    pub backend: BackendKind,
    /// Appended to every echoed write
    #[serde(default = "default_echo_terminator")]
    pub echo_terminator: String,
    /// Skip ports whose path contains any of these
    #[serde(default = "default_skip_patterns")]
    pub skip_patterns: Vec<String>,
}

fn default_listen() -> String {
    "127.0.0.1:7878".to_string()
}

fn default_baud() -> u32 {
    9600
}

fn default_echo_terminator() -> String {
    "\n".to_string()
}

fn default_skip_patterns() -> Vec<String> {
    vec!["debug".to_string()]
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            baud_rate: default_baud(),
            backend: BackendKind::default(),
            echo_terminator: default_echo_terminator(),
            skip_patterns: default_skip_patterns(),
        }
    }
}

impl HostSettings {
    /// Get the XDG config directory for btserial
    /// Uses $XDG_CONFIG_HOME/btserial on Linux/macOS, falls back to ~/.config/btserial
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("btserial"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("btserial"))
    }

    /// Default settings file path
    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("host.json"))
    }

    /// Load settings from the default path, falling back to defaults
    pub fn load() -> Self {
        Self::default_path()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Load settings from an explicit path
    ///
    /// Unlike [`HostSettings::load`], a missing or malformed file is an error.
    pub fn load_from(path: &Path) -> Result<Self, HostError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| HostError::Settings(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&json)
            .map_err(|e| HostError::Settings(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Save settings to `path`
    pub fn save_to(&self, path: &Path) -> Result<(), HostError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                HostError::Settings(format!("Failed to create settings directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| HostError::Settings(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(path, json)
            .map_err(|e| HostError::Settings(format!("Failed to write settings: {}", e)))?;

        Ok(())
    }
}
