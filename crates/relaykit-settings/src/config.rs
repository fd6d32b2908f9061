//! Settings file handling for relaykit
//!
//! Settings are organized into two sections:
//! - Bus settings (name, nesting order, panic policy, limits)
//! - Logging settings (level filter, output format)
//!
//! Missing fields fall back to their defaults, so a file only needs the
//! values it changes.

use relaykit_core::{BusConfig, ConfigError, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "relaykit";
const SETTINGS_FILE: &str = "settings.toml";

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default level directive, overridden by `RUST_LOG`
    pub level: String,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete relaykit settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root bus configuration
    pub bus: BusConfig,
    /// Logging configuration
    pub logging: LoggingSettings,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
}

impl Format {
    fn of(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            other => Err(ConfigError::UnsupportedFormat {
                extension: other.unwrap_or_default().to_string(),
            }
            .into()),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Json => "JSON",
            Self::Toml => "TOML",
        }
    }

    fn malformed(self, reason: impl ToString) -> Error {
        ConfigError::Malformed {
            format: self.name().to_string(),
            reason: reason.to_string(),
        }
        .into()
    }
}

impl Settings {
    /// Default settings file: `<config dir>/relaykit/settings.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join(SETTINGS_FILE)
    }

    /// Load settings from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let format = Format::of(path)?;
        let content = std::fs::read_to_string(path)?;

        let settings: Self = match format {
            Format::Json => serde_json::from_str(&content).map_err(|e| format.malformed(e))?,
            Format::Toml => toml::from_str(&content).map_err(|e| format.malformed(e))?,
        };

        settings.validate()?;
        tracing::debug!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    /// Load settings from `path`, or defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }

    /// Save settings to file (JSON or TOML), creating parent directories
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let format = Format::of(path)?;

        let content = match format {
            Format::Json => serde_json::to_string_pretty(self).map_err(|e| format.malformed(e))?,
            Format::Toml => toml::to_string_pretty(self).map_err(|e| format.malformed(e))?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;

        tracing::debug!(path = %path.display(), "Saved settings");
        Ok(())
    }

    /// Validate settings
    pub fn validate(&self) -> Result<()> {
        self.bus.validate()?;

        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }

        Ok(())
    }
}
