//! Configuration file
//!
//! Read from `<config_dir>/kioku/config.toml`. Every key is optional:
//!
//! ```toml
//! data_dir = "/home/me/.local/share/kioku"
//!
//! [storage]
//! quota_bytes = 5242880
//!
//! [remote]
//! base_url = "https://sync.example.com/api"
//! api_token = "..."
//! timeout_secs = 10
//!
//! [review]
//! per_deck_limit = 20
//! session_limit = 100
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::flashcards::DueLimits;
use crate::storage::FileDeckStore;

/// Default local quota, matching the 5 MiB browsers grant to local storage
pub const DEFAULT_QUOTA_BYTES: u64 = 5 * 1024 * 1024;

pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Data directory not found")]
    DataDirNotFound,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where deck records and the retry queue live
    pub data_dir: Option<PathBuf>,
    pub storage: StorageConfig,
    pub remote: RemoteConfig,
    pub review: ReviewConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub quota_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            quota_bytes: DEFAULT_QUOTA_BYTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Sync server; without it every user is local-only
    pub base_url: Option<String>,
    pub api_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_token: None,
            timeout_secs: DEFAULT_REMOTE_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    pub per_deck_limit: Option<usize>,
    pub session_limit: Option<usize>,
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("kioku").join("config.toml"))
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load from the default location
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => FileDeckStore::default_data_dir().map_err(|_| ConfigError::DataDirNotFound),
        }
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.timeout_secs.max(1))
    }

    pub fn due_limits(&self) -> DueLimits {
        DueLimits {
            per_deck: self.review.per_deck_limit,
            total: self.review.session_limit,
        }
    }
}
