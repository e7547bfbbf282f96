//! Configuration management for dbtest.
//!
//! Configuration is loaded from multiple sources with the following priority:
//! 1. Environment variables (highest priority)
//! 2. Project-local `dbtest.toml` file
//! 3. User config `~/.config/dbtest/config.toml`
//! 4. Built-in defaults (lowest priority)

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

mod defaults;

pub use defaults::*;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Execution engine configuration.
    pub execution: ExecutionConfig,

    /// Storage layout configuration.
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// Searches for config in order:
    /// 1. `./dbtest.toml` (project local)
    /// 2. `~/.config/dbtest/config.toml` (user config)
    /// 3. Falls back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        // Try project-local config first
        if Path::new(PROJECT_CONFIG_FILE).exists() {
            return Self::from_file(PROJECT_CONFIG_FILE);
        }

        // Try user config
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("dbtest").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        // Use defaults
        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        // Execution overrides
        if let Ok(parallelism) = std::env::var("DBTEST_PARALLELISM") {
            if let Ok(n) = parallelism.parse() {
                self.execution.parallelism = n;
            }
        }
        if let Ok(timeout) = std::env::var("DBTEST_BATCH_TIMEOUT") {
            if let Ok(n) = timeout.parse() {
                self.execution.batch_timeout_secs = n;
            }
        }

        // Storage overrides
        if let Ok(extension) = std::env::var("DBTEST_CASE_EXTENSION") {
            self.storage.case_extension = extension;
        }
        if let Ok(dir) = std::env::var("DBTEST_CONFIG_DIR") {
            self.storage.config_dir = dir;
        }
    }

    /// Create a default config file content as a string.
    pub fn default_config_string() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Execution engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Number of units a parallel batch runs at once.
    pub parallelism: usize,

    /// Wall-clock window for a parallel batch, in seconds.
    pub batch_timeout_secs: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            parallelism: DEFAULT_PARALLELISM,
            batch_timeout_secs: DEFAULT_BATCH_TIMEOUT_SECS,
        }
    }
}

impl ExecutionConfig {
    /// The batch window as a `Duration`.
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }
}

/// Storage layout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// File extension of test case artifacts (with leading dot).
    pub case_extension: String,

    /// Per-project config directory under the artifact root.
    pub config_dir: String,

    /// Status ledger file name, inside the config directory.
    pub status_file: String,

    /// Target registry file name, at the artifact root.
    pub targets_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            case_extension: DEFAULT_CASE_EXTENSION.to_string(),
            config_dir: DEFAULT_CONFIG_DIR.to_string(),
            status_file: DEFAULT_STATUS_FILE.to_string(),
            targets_file: DEFAULT_TARGETS_FILE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.execution.parallelism, DEFAULT_PARALLELISM);
        assert_eq!(config.execution.batch_timeout_secs, DEFAULT_BATCH_TIMEOUT_SECS);
        assert_eq!(config.storage.case_extension, DEFAULT_CASE_EXTENSION);
        assert_eq!(config.storage.targets_file, DEFAULT_TARGETS_FILE);
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[execution]"));
        assert!(toml_str.contains("[storage]"));
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
[execution]
parallelism = 8
batch_timeout_secs = 120

[storage]
case_extension = ".sqltest"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.execution.parallelism, 8);
        assert_eq!(config.execution.batch_timeout_secs, 120);
        assert_eq!(config.storage.case_extension, ".sqltest");
        // Unset fields keep their defaults
        assert_eq!(config.storage.status_file, DEFAULT_STATUS_FILE);
    }

    #[test]
    fn test_batch_timeout_duration() {
        let execution = ExecutionConfig {
            batch_timeout_secs: 90,
            ..ExecutionConfig::default()
        };
        assert_eq!(execution.batch_timeout(), Duration::from_secs(90));
        assert_eq!(
            ExecutionConfig::default().batch_timeout(),
            Duration::from_secs(DEFAULT_BATCH_TIMEOUT_SECS)
        );
    }
}
