mod config;
pub mod database;
pub mod migrations;

pub use config::{
    parse_reminder_time, Config, DefaultsConfig, SchedulerConfig, StorageConfig, ENV_REMINDER_TIME,
    ENV_TICK_INTERVAL, ENV_TIMEZONE,
};
pub use database::SqliteRepository;

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/habitbot[-dev]/` based on HABITBOT_ENV.
///
/// Set HABITBOT_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("HABITBOT_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("habitbot-dev")
    } else {
        base_dir.join("habitbot")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
