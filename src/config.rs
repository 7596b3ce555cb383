//! Host configuration.
//!
//! Precedence, highest first: CLI flags, environment (`LIME_DATA_HOME`,
//! `LIME_LOG`), the JSON file given with `--config`, defaults.

use crate::store::{DEFAULT_PRODUCT, platform_data_root};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_DATA_HOME: &str = "LIME_DATA_HOME";
pub const ENV_LOG: &str = "LIME_LOG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Namespace folder under the data root
    pub product_name: String,
    /// Replaces the platform per-user data directory when set
    pub data_root: Option<PathBuf>,
    /// Main script inside a fused archive
    pub entry_name: String,
    pub log_level: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            product_name: DEFAULT_PRODUCT.to_string(),
            data_root: None,
            entry_name: "main.lua".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl HostConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn product_name(mut self, name: impl Into<String>) -> Self {
        self.product_name = name.into();
        self
    }

    pub fn data_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.data_root = Some(root.into());
        self
    }

    pub fn entry_name(mut self, entry: impl Into<String>) -> Self {
        self.entry_name = entry.into();
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Load a JSON config file; missing keys keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Apply overrides from the process environment
    pub fn apply_env(self) -> Self {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    pub fn apply_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(root) = lookup(ENV_DATA_HOME).filter(|v| !v.is_empty()) {
            self.data_root = Some(PathBuf::from(root));
        }
        if let Some(level) = lookup(ENV_LOG).filter(|v| !v.is_empty()) {
            self.log_level = level;
        }
        self
    }

    /// Data root the save store lives under
    pub fn resolved_data_root(&self) -> PathBuf {
        self.data_root.clone().unwrap_or_else(platform_data_root)
    }
}
