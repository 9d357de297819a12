//! Observability configuration: log level, file output, rotation

use anyhow::Result;
use std::path::PathBuf;

use super::{flag, string, Lookup};

// ─────────────────────────────────────────────────────────────────────────────
// Log Rotation
// ─────────────────────────────────────────────────────────────────────────────

/// Log file rotation strategy
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LogRotation {
    /// Rotate log files hourly
    Hourly,
    /// Rotate log files daily (default)
    #[default]
    Daily,
    /// Never rotate - single log file
    Never,
}

impl LogRotation {
    /// Parse rotation string from the environment
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "hourly" => Self::Hourly,
            "daily" => Self::Daily,
            "never" => Self::Never,
            _ => Self::Daily, // Default to daily for unknown values
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Never => "never",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Enable JSON file logging (in addition to stdout)
    pub file_enabled: bool,
    /// Directory for log files
    pub file_dir: PathBuf,
    /// Log file rotation strategy
    pub file_rotation: LogRotation,
    /// Prefix for log file names (e.g., "copilot-proxy" -> "copilot-proxy.2024-01-15")
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_enabled: false, // Opt-in feature
            file_dir: PathBuf::from("./logs"),
            file_rotation: LogRotation::Daily,
            file_prefix: "copilot-proxy".to_string(),
        }
    }
}

impl LoggingConfig {
    pub(crate) fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            level: string(lookup, "LOG_LEVEL", &defaults.level),
            file_enabled: flag(lookup, "LOG_FILE_ENABLED", defaults.file_enabled)?,
            file_dir: PathBuf::from(string(
                lookup,
                "LOG_FILE_DIR",
                &defaults.file_dir.to_string_lossy(),
            )),
            file_rotation: LogRotation::parse(&string(
                lookup,
                "LOG_FILE_ROTATION",
                defaults.file_rotation.as_str(),
            )),
            file_prefix: string(lookup, "LOG_FILE_PREFIX", &defaults.file_prefix),
        })
    }
}
