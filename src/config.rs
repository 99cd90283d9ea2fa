//! Engine configuration.
//!
//! Built in code with the builder methods or loaded from a TOML file:
//!
//! ```toml
//! data_dir = "/var/lib/review-engine"
//! backend = "git"
//! content_base_path = "content"
//! create_if_missing = true
//! log_filter = "review_engine=debug"
//! ```
//!
//! Every key is optional; missing keys take the defaults.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::catalog::GitVersionRepository;
use crate::model::ContentPath;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Which implementation backs the content store and the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Process memory; nothing survives a restart.
    Memory,
    /// A Git repository under `data_dir`.
    #[default]
    Git,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Memory => "memory",
            Backend::Git => "git",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(Backend::Memory),
            "git" => Ok(Backend::Git),
            other => Err(ConfigError::Invalid(format!(
                "unknown backend '{}', expected 'memory' or 'git'",
                other
            ))),
        }
    }
}

/// Engine configuration options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Directory of the Git repository (git backend only).
    pub data_dir: PathBuf,
    /// Storage backend.
    pub backend: Backend,
    /// Prefix of every section blob path the engine writes.
    pub content_base_path: String,
    /// Create the repository if it doesn't exist.
    pub create_if_missing: bool,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".review-engine"),
            backend: Backend::Git,
            content_base_path: "content".to_string(),
            create_if_missing: true,
            log_filter: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Create a new configuration with the given data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// An in-memory configuration, for tests and throwaway runs.
    pub fn in_memory() -> Self {
        Self::default().backend(Backend::Memory)
    }

    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn content_base_path(mut self, path: impl Into<String>) -> Self {
        self.content_base_path = path.into();
        self
    }

    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    pub fn log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_toml_str(&contents)?;
        debug!(path = %path.display(), backend = %config.backend, "loaded config file");
        Ok(config)
    }

    /// Check the options are usable together.
    pub fn validate(&self) -> ConfigResult<()> {
        let base = self.base_path()?;
        let top = base.as_str().split('/').next().unwrap_or_default();
        if self.backend == Backend::Git && GitVersionRepository::TABLES.iter().any(|table| *table == top) {
            return Err(ConfigError::Invalid(format!(
                "content_base_path must not start with the row table '{}'",
                top
            )));
        }
        if self.backend == Backend::Git && self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("data_dir must be set for the git backend".to_string()));
        }
        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::Invalid("log_filter must not be empty".to_string()));
        }
        Ok(())
    }

    /// `content_base_path` as a validated content path.
    pub fn base_path(&self) -> ConfigResult<ContentPath> {
        ContentPath::new(self.content_base_path.as_str())
            .map_err(|e| ConfigError::Invalid(format!("content_base_path: {}", e)))
    }
}
