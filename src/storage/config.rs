use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use super::history::StoreOptions;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// General configuration settings
#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    /// Maximum number of clipboard entries to keep
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// How long to wait for another instance to release the database
    #[serde(default = "default_timeout_ms")]
    pub open_timeout_ms: u64,

    /// How long a write waits for the writer lock
    #[serde(default = "default_timeout_ms")]
    pub write_timeout_ms: u64,

    /// Enable debug logging
    #[serde(default)]
    pub debug_logging: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            max_history: default_max_history(),
            open_timeout_ms: default_timeout_ms(),
            write_timeout_ms: default_timeout_ms(),
            debug_logging: false,
        }
    }
}

impl GeneralConfig {
    /// Store options derived from these settings
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions::new(self.max_history)
            .with_open_timeout(Duration::from_millis(self.open_timeout_ms))
            .with_write_timeout(Duration::from_millis(self.write_timeout_ms))
    }

    /// Default log filter when RUST_LOG is unset
    pub fn log_level(&self) -> &'static str {
        if self.debug_logging { "debug" } else { "info" }
    }
}

/// File logging settings
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Write logs to a rotating file in the data directory
    #[serde(default)]
    pub file: bool,

    /// Minimum level written to the log file
    #[serde(default = "default_file_level")]
    pub file_level: String,

    /// Minimum level echoed to stderr while file logging is on
    #[serde(default = "default_stderr_level")]
    pub stderr_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            file: false,
            file_level: default_file_level(),
            stderr_level: default_stderr_level(),
        }
    }
}

// Default value functions for serde
fn default_max_history() -> usize {
    200
}

fn default_timeout_ms() -> u64 {
    2_000
}

fn default_file_level() -> String {
    "info".to_string()
}

fn default_stderr_level() -> String {
    "warn".to_string()
}

/// Trait for configuration storage
pub trait ConfigStorage: Send + Sync {
    /// Load configuration from file
    fn load(&self) -> Result<Config>;

    /// Create default configuration file if it doesn't exist
    fn create_default(&self) -> Result<()>;
}

/// TOML-based implementation of ConfigStorage
pub struct TomlConfigStorage {
    path: PathBuf,
}

impl TomlConfigStorage {
    /// Create a new TomlConfigStorage with the given path
    pub fn new(path: PathBuf) -> Self {
        TomlConfigStorage { path }
    }
}

impl ConfigStorage for TomlConfigStorage {
    fn load(&self) -> Result<Config> {
        // If file doesn't exist, create default and return it
        if !self.path.exists() {
            log::info!(
                "Config file not found at {:?}, creating default configuration",
                self.path
            );
            self.create_default()?;
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read config from {:?}", self.path))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {:?}", self.path))?;

        log::info!("Loaded configuration from {:?}", self.path);
        log::debug!(
            "Config: max_history={}, file logging {}",
            config.general.max_history,
            if config.logging.file { "on" } else { "off" }
        );

        Ok(config)
    }

    fn create_default(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        // Use the example config compiled into the binary
        let example_config = include_str!("../../clipledger.toml.example");

        fs::write(&self.path, example_config)
            .with_context(|| format!("Failed to create default config at {:?}", self.path))?;

        log::info!("Created default configuration at {:?}", self.path);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.general.max_history, 200);
        assert_eq!(config.general.open_timeout_ms, 2_000);
        assert_eq!(config.general.write_timeout_ms, 2_000);
        assert!(!config.general.debug_logging);
        assert!(!config.logging.file);
        assert_eq!(config.logging.file_level, "info");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [general]
            max_history = 5
            debug_logging = true
            "#,
        )
        .unwrap();

        assert_eq!(config.general.max_history, 5);
        assert_eq!(config.general.write_timeout_ms, 2_000);
        assert_eq!(config.general.log_level(), "debug");
        assert_eq!(config.logging.stderr_level, "warn");
    }

    #[test]
    fn test_store_options_from_config() {
        let general = GeneralConfig {
            max_history: 7,
            open_timeout_ms: 150,
            write_timeout_ms: 30,
            debug_logging: false,
        };
        let options = general.store_options();
        assert_eq!(options.max_size, 7);
        assert_eq!(options.open_timeout, Duration::from_millis(150));
        assert_eq!(options.write_timeout, Duration::from_millis(30));
    }

    #[test]
    fn test_example_config_matches_defaults() {
        let config: Config = toml::from_str(include_str!("../../clipledger.toml.example")).unwrap();
        let defaults = Config::default();
        assert_eq!(config.general.max_history, defaults.general.max_history);
        assert_eq!(config.general.open_timeout_ms, defaults.general.open_timeout_ms);
        assert_eq!(config.logging.file, defaults.logging.file);
    }

    #[test]
    fn test_load_creates_default_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("conf/clipledger.toml");
        let storage = TomlConfigStorage::new(path.clone());

        let config = storage.load().unwrap();
        assert_eq!(config.general.max_history, 200);
        assert!(path.exists());

        // Second load parses the file that was just written
        let reloaded = storage.load().unwrap();
        assert_eq!(reloaded.general.max_history, 200);
    }
}
