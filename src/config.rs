use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dirs;
use crate::error::{ActivityError, Result};
use crate::queue::DEFAULT_FLUSH_THRESHOLD;
use crate::storage::StorageKind;

/// Shortest retention horizon, in months
pub const MIN_RETENTION_MONTHS: u32 = 1;

/// Longest retention horizon, in months
pub const MAX_RETENTION_MONTHS: u32 = 12;

/// Longest interval between scheduled cleanups, in hours
pub const MAX_CLEANUP_INTERVAL_HOURS: u64 = 24 * 366;

/// Clamp a retention horizon into the supported range
pub fn clamp_retention(months: u32) -> u32 {
    months.clamp(MIN_RETENTION_MONTHS, MAX_RETENTION_MONTHS)
}

/// Persisted settings for the activity logger, read API, and CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityConfig {
    /// Whether `Logger::log` records anything (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// Storage backend (default: file)
    #[serde(default)]
    pub storage: StorageKind,

    /// Retention horizon in months (default: 6, clamped to 1..=12 on use)
    #[serde(default = "default_retention_months")]
    pub retention_months: u32,

    /// Directory holding log files or the SQLite database
    #[serde(default = "dirs::activity_home")]
    pub data_dir: PathBuf,

    /// Buffered entries that trigger a flush (default: 50)
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: usize,

    /// Interval between scheduled cleanups (default: 24)
    #[serde(default = "default_cleanup_interval_hours")]
    pub cleanup_interval_hours: u64,

    /// Host address for `serve` (default: 127.0.0.1)
    #[serde(default = "default_host")]
    pub host: String,

    /// Port for `serve` (default: 11436)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token granting read access; reads are refused when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_token: Option<String>,

    /// Action types registered when the logger starts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_types: Vec<ActionTypeConfig>,
}

/// One `[[action_types]]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTypeConfig {
    pub owner: String,
    pub key: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,
}

fn default_retention_months() -> u32 {
    6
}

fn default_flush_threshold() -> usize {
    DEFAULT_FLUSH_THRESHOLD
}

fn default_cleanup_interval_hours() -> u64 {
    24
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    11436
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            storage: StorageKind::default(),
            retention_months: default_retention_months(),
            data_dir: dirs::activity_home(),
            flush_threshold: default_flush_threshold(),
            cleanup_interval_hours: default_cleanup_interval_hours(),
            host: default_host(),
            port: default_port(),
            admin_token: None,
            action_types: Vec::new(),
        }
    }
}

impl ActivityConfig {
    /// Load configuration from the default config file path.
    /// Returns default config if the file does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&dirs::config_path())
    }

    /// Load configuration from an explicit path, defaulting if it is absent.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            ActivityError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: ActivityConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save the current configuration to the default config file path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&dirs::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Effective retention horizon in months
    pub fn retention(&self) -> u32 {
        clamp_retention(self.retention_months)
    }

    /// Effective cleanup interval, clamped to one hour..one year
    pub fn cleanup_interval(&self) -> std::time::Duration {
        let hours = self
            .cleanup_interval_hours
            .clamp(1, MAX_CLEANUP_INTERVAL_HOURS);
        std::time::Duration::from_secs(hours.saturating_mul(3600))
    }

    /// Returns the server bind address string (e.g., "127.0.0.1:11436").
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
