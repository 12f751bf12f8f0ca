//! Watcher configuration.
//!
//! Configuration is read from an optional `.pkgi.yaml` in the watched
//! directory. Every field has a default, so an absent file or an empty one
//! behaves the same. The debounce delay can also be overridden with the
//! `PKGI_DEBOUNCE_MS` environment variable.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PkgiError, Result};

/// Name of the configuration file looked up in the watched directory.
pub const CONFIG_FILE: &str = ".pkgi.yaml";

/// Environment variable overriding [`Config::debounce_ms`].
pub const DEBOUNCE_ENV: &str = "PKGI_DEBOUNCE_MS";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Delay in milliseconds before a burst of manifest changes is acted on
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// File name of the dependency manifest
    #[serde(default = "default_manifest_file")]
    pub manifest_file: String,

    /// File names treated as lock files next to a manifest
    #[serde(default = "default_lock_files")]
    pub lock_files: Vec<String>,

    /// Extra directory names skipped while discovering projects
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,

    /// Capacity of the progress broadcast channel
    #[serde(default = "default_progress_capacity")]
    pub progress_capacity: usize,
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_manifest_file() -> String {
    "package.json".to_string()
}

fn default_lock_files() -> Vec<String> {
    vec![
        "package-lock.json".to_string(),
        "npm-shrinkwrap.json".to_string(),
    ]
}

fn default_progress_capacity() -> usize {
    64
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            manifest_file: default_manifest_file(),
            lock_files: default_lock_files(),
            exclude: Vec::new(),
            progress_capacity: default_progress_capacity(),
        }
    }
}

impl Config {
    /// Get the path to the config file for a watched directory
    pub fn config_path(dir: &Path) -> PathBuf {
        dir.join(CONFIG_FILE)
    }

    /// Load configuration for `dir`, or return the default if no file exists.
    ///
    /// The environment override is applied after the file is read.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = Self::config_path(dir);
        let mut config = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| {
                PkgiError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to read config at {}: {}", path.display(), e),
                ))
            })?;
            Self::from_yaml(&content)?
        } else {
            Config::default()
        };

        if let Ok(value) = env::var(DEBOUNCE_ENV)
            && !value.is_empty()
        {
            config.debounce_ms = value.parse().map_err(|_| {
                PkgiError::Config(format!("{DEBOUNCE_ENV} must be an integer, got '{value}'"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from YAML text. An empty document yields defaults.
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        let config: Config = serde_yaml_ng::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.manifest_file.trim().is_empty() {
            return Err(PkgiError::Config(
                "manifest_file must not be empty".to_string(),
            ));
        }
        if self.lock_files.iter().any(|name| name == &self.manifest_file) {
            return Err(PkgiError::Config(format!(
                "'{}' cannot be both the manifest and a lock file",
                self.manifest_file
            )));
        }
        if self.progress_capacity == 0 {
            return Err(PkgiError::Config(
                "progress_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the debounce delay as a duration
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Whether `name` is the configured manifest file name
    pub fn is_manifest(&self, name: &str) -> bool {
        self.manifest_file == name
    }

    /// Whether `name` is one of the configured lock file names
    pub fn is_lock_file(&self, name: &str) -> bool {
        self.lock_files.iter().any(|lock| lock == name)
    }

    /// Whether discovery should skip a directory with this name
    pub fn is_excluded_dir(&self, name: &str) -> bool {
        name == "node_modules" || name == ".git" || self.exclude.iter().any(|e| e == name)
    }
}
