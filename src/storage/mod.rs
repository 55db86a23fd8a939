pub mod config;
pub mod eviction;
pub mod history;
pub mod sequence;
mod tables;

use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub use config::{Config, ConfigStorage, GeneralConfig, LoggingConfig, TomlConfigStorage};
pub use eviction::EvictionPolicy;
pub use history::{HistoryStore, StoreOptions};
pub use sequence::SequenceAllocator;

const APP_DIR: &str = "clipledger";

/// File name of the history database inside the data directory
pub const HISTORY_FILE: &str = "clipboard_bucket.redb";

/// File name of the configuration inside the config directory
pub const CONFIG_FILE: &str = "clipledger.toml";

/// Ensure XDG data and config directories exist
/// Returns (data_dir, config_dir)
///
/// XDG Base Directory Specification:
/// - Data: $XDG_DATA_HOME/clipledger (default: ~/.local/share/clipledger)
/// - Config: $XDG_CONFIG_HOME/clipledger (default: ~/.config/clipledger)
pub fn ensure_directories() -> Result<(PathBuf, PathBuf)> {
    let home = env::var("HOME").context("HOME environment variable not set")?;
    let (data_dir, config_dir) = resolve_directories(
        Path::new(&home),
        env::var_os("XDG_DATA_HOME").map(PathBuf::from),
        env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
    );

    fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

    fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create config directory {:?}", config_dir))?;

    log::debug!("Data directory: {:?}", data_dir);
    log::debug!("Config directory: {:?}", config_dir);

    Ok((data_dir, config_dir))
}

/// Compute the data and config directories without touching the filesystem
fn resolve_directories(
    home: &Path,
    xdg_data: Option<PathBuf>,
    xdg_config: Option<PathBuf>,
) -> (PathBuf, PathBuf) {
    let data_dir = xdg_data
        .filter(|p| p.is_absolute())
        .unwrap_or_else(|| home.join(".local/share"))
        .join(APP_DIR);
    let config_dir = xdg_config
        .filter(|p| p.is_absolute())
        .unwrap_or_else(|| home.join(".config"))
        .join(APP_DIR);
    (data_dir, config_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directories_default_to_home() {
        let (data, config) = resolve_directories(Path::new("/home/me"), None, None);
        assert_eq!(data, PathBuf::from("/home/me/.local/share/clipledger"));
        assert_eq!(config, PathBuf::from("/home/me/.config/clipledger"));
    }

    #[test]
    fn test_directories_honor_xdg() {
        let (data, config) = resolve_directories(
            Path::new("/home/me"),
            Some(PathBuf::from("/xdg/data")),
            Some(PathBuf::from("/xdg/config")),
        );
        assert_eq!(data, PathBuf::from("/xdg/data/clipledger"));
        assert_eq!(config, PathBuf::from("/xdg/config/clipledger"));
    }

    #[test]
    fn test_relative_xdg_is_ignored() {
        let (data, _) =
            resolve_directories(Path::new("/home/me"), Some(PathBuf::from("rel")), None);
        assert_eq!(data, PathBuf::from("/home/me/.local/share/clipledger"));
    }
}
