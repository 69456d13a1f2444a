pub mod chat;
pub mod init;
pub mod models;

use std::path::{Path, PathBuf};

use tiller_config::{AppConfig, ConfigError};

/// The config file to use: `--config` if given, the default location otherwise.
pub fn config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(AppConfig::config_path)
}

/// Load configuration with environment overrides and credentials applied.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    AppConfig::load_with_env(path)
}
