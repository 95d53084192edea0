use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::file_watcher::default_ignore_patterns;

/// Environment variable that overrides `remote.base_url`.
pub const BASE_URL_ENV: &str = "THEME_API_URL";

/// Top-level configuration, loaded from `~/.config/theme-sync/config.toml`
/// or from an explicit `--config` file.
///
/// `authorization` is optional here; see [`crate::credentials`] for the full
/// resolution order.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub authorization: Option<String>,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub download: DownloadConfig,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field(
                "authorization",
                &self.authorization.as_ref().map(|_| "<redacted>"),
            )
            .field("remote", &self.remote)
            .field("sync", &self.sync)
            .field("download", &self.download)
            .finish()
    }
}

impl Config {
    /// Load from a specific path. Missing or malformed files are errors.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    /// Load the per-user config file if it exists.
    pub fn load_implicit() -> Result<Option<Self>, ConfigError> {
        let path = Self::default_path();
        if path.is_file() {
            Self::load_from(&path).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let cfg: Config = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Semantic validation for settings that types alone cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.remote.validate()?;
        self.sync.validate()?;
        if self.download.workers == 0 {
            return Err(ConfigError::Validation(
                "download.workers must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Apply `THEME_API_URL` if set.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                self.remote.base_url = url;
            }
        }
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("theme-sync")
            .join("config.toml")
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
    #[error("validation: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Section structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Largest file the store accepts; larger candidates fail validation.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let url = self.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "remote.base_url must be an http(s) URL, got {url:?}"
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "remote.timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn default_base_url() -> String {
    "http://localhost:3000".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_file_bytes() -> u64 {
    5 * 1024 * 1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Debounce window for coalescing filesystem events.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Concurrent remote operations per change set.
    #[serde(default = "default_sync_workers")]
    pub workers: usize,
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            workers: default_sync_workers(),
            ignore_patterns: default_ignore_patterns(),
        }
    }
}

impl SyncConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Range checks for the sync settings, also used after command-line
    /// overrides.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(10..=60_000).contains(&self.debounce_ms) {
            return Err(ConfigError::Validation(format!(
                "sync.debounce_ms must be between 10 and 60000, got {}",
                self.debounce_ms
            )));
        }
        if self.workers == 0 {
            return Err(ConfigError::Validation(
                "sync.workers must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn default_debounce_ms() -> u64 {
    200
}
fn default_sync_workers() -> usize {
    4
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    #[serde(default = "default_download_workers")]
    pub workers: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            workers: default_download_workers(),
        }
    }
}

fn default_download_workers() -> usize {
    8
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
