//! Shared setup for commands: configuration, repository and the stdout
//! chat gateway.

use std::io::Write;

use habitbot_core::error::DeliveryError;
use habitbot_core::gateway::{ChatGateway, ReminderMessage};
use habitbot_core::{Config, HabitService, SqliteRepository};
use serde::Serialize;

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub fn load_config() -> CliResult<Config> {
    Ok(Config::load()?)
}

pub fn open_repository(config: &Config) -> CliResult<SqliteRepository> {
    let path = config.database_path()?;
    tracing::debug!(path = %path.display(), "opening database");
    Ok(SqliteRepository::open(path)?)
}

pub fn open_service() -> CliResult<HabitService<SqliteRepository>> {
    let config = load_config()?;
    let repository = open_repository(&config)?;
    Ok(HabitService::new(repository, config.habit_defaults()?))
}

pub fn print_json<T: Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Chat gateway that writes each reminder as one JSON line to stdout.
pub struct StdoutGateway;

impl ChatGateway for StdoutGateway {
    fn send_reminder(&self, message: &ReminderMessage) -> Result<(), DeliveryError> {
        let line = serde_json::to_string(message).map_err(|e| DeliveryError::Rejected {
            owner_id: message.owner_id,
            message: e.to_string(),
        })?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{line}")
            .and_then(|_| stdout.flush())
            .map_err(|e| DeliveryError::Unavailable(e.to_string()))
    }
}
