//! TOML-based application configuration.
//!
//! Stores:
//! - Scheduler cadence and catch-up behaviour
//! - Defaults for owners without stored settings
//! - Database location
//!
//! Configuration is stored at `~/.config/habitbot/config.toml`. A few
//! values can be overridden from the environment, see
//! [`Config::apply_env_overrides`].

use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::due::SlotPolicy;
use crate::error::ConfigError;
use crate::service::HabitDefaults;
use crate::timezone::UserTimezone;

pub const ENV_TIMEZONE: &str = "HABITBOT_TIMEZONE";
pub const ENV_REMINDER_TIME: &str = "HABITBOT_DEFAULT_REMINDER_TIME";
pub const ENV_TICK_INTERVAL: &str = "HABITBOT_REMINDER_INTERVAL_SECONDS";

/// Reminder scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between ticks of `habitbot run`. Also the width of the
    /// reminder slot when catch-up is off.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
    /// Send reminders missed by earlier ticks until the end of the day.
    #[serde(default = "default_true")]
    pub catch_up: bool,
}

/// Defaults for owners that have not configured anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// IANA zone or UTC offset, e.g. "Asia/Almaty" or "+05:00".
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// "HH:MM" in the owner's timezone.
    #[serde(default = "default_reminder_time")]
    pub reminder_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file, relative to the data directory unless absolute.
    #[serde(default = "default_database_file")]
    pub database_file: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/habitbot/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_tick_interval() -> u64 {
    60
}
fn default_true() -> bool {
    true
}
fn default_timezone() -> String {
    "+05:00".into()
}
fn default_reminder_time() -> String {
    "21:00".into()
}
fn default_database_file() -> String {
    "habitbot.db".into()
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            catch_up: true,
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            reminder_time: default_reminder_time(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_file: default_database_file(),
        }
    }
}

/// Parse "HH:MM" or "HH:MM:SS".
pub fn parse_reminder_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

impl Config {
    fn get_json_value_by_path<'a>(root: &'a serde_json::Value, key: &str) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(root: &mut serde_json::Value, key: &str, value: &str) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;
            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|_| invalid(format!("cannot parse '{value}' as bool")))?,
                ),
                serde_json::Value::Number(_) => serde_json::Value::Number(
                    value
                        .parse::<u64>()
                        .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?
                        .into(),
                ),
                serde_json::Value::Object(_) => return Err(invalid("cannot set a whole section".into())),
                _ => serde_json::Value::String(value.into()),
            };
            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    /// `config.toml` in the data directory.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory, writing defaults if the file is
    /// missing, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let mut cfg = Self::load_from(&Self::path()?)?;
        cfg.apply_env_overrides(|name| std::env::var(name).ok())?;
        Ok(cfg)
    }

    /// Load from `path`, writing defaults there if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the data directory.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Override values from environment variables looked up through `var`.
    ///
    /// Recognised: [`ENV_TIMEZONE`], [`ENV_REMINDER_TIME`],
    /// [`ENV_TICK_INTERVAL`].
    pub fn apply_env_overrides<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(tz) = var(ENV_TIMEZONE) {
            self.defaults.timezone = tz;
        }
        if let Some(time) = var(ENV_REMINDER_TIME) {
            self.defaults.reminder_time = time;
        }
        if let Some(secs) = var(ENV_TICK_INTERVAL) {
            self.scheduler.tick_interval_secs = secs.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_TICK_INTERVAL.to_string(),
                message: format!("'{secs}' is not a number of seconds"),
            })?;
        }
        self.validate()
    }

    /// Check values that the TOML types alone do not constrain.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.habit_defaults()?;
        if self.scheduler.tick_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "scheduler.tick_interval_secs".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.storage.database_file.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "storage.database_file".into(),
                message: "must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value is invalid;
    /// the config is left unchanged in that case.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a value by key and save to the data directory.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.set_value(key, value)?;
        self.save()
    }

    pub fn timezone(&self) -> Result<UserTimezone, ConfigError> {
        self.defaults
            .timezone
            .parse()
            .map_err(|e: crate::error::ValidationError| ConfigError::InvalidValue {
                key: "defaults.timezone".into(),
                message: e.to_string(),
            })
    }

    pub fn reminder_time(&self) -> Result<NaiveTime, ConfigError> {
        parse_reminder_time(&self.defaults.reminder_time).ok_or_else(|| ConfigError::InvalidValue {
            key: "defaults.reminder_time".into(),
            message: format!("'{}' is not HH:MM", self.defaults.reminder_time),
        })
    }

    pub fn habit_defaults(&self) -> Result<HabitDefaults, ConfigError> {
        Ok(HabitDefaults {
            timezone: self.timezone()?,
            reminder_time: self.reminder_time()?,
        })
    }

    /// Reminder slot derived from the scheduler section.
    pub fn slot_policy(&self) -> SlotPolicy {
        SlotPolicy {
            tolerance: Duration::seconds(self.scheduler.tick_interval_secs.min(86_400) as i64),
            catch_up: self.scheduler.catch_up,
        }
    }

    /// Absolute database path.
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        let file = Path::new(&self.storage.database_file);
        if file.is_absolute() {
            return Ok(file.to_path_buf());
        }
        Ok(data_dir()?.join(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
        assert_eq!(parsed.scheduler.tick_interval_secs, 60);
        assert!(parsed.scheduler.catch_up);
    }

    #[test]
    fn missing_sections_use_defaults() {
        let cfg: Config = toml::from_str("[scheduler]\ncatch_up = false\n").unwrap();
        assert!(!cfg.scheduler.catch_up);
        assert_eq!(cfg.scheduler.tick_interval_secs, 60);
        assert_eq!(cfg.defaults.reminder_time, "21:00");
        assert_eq!(cfg.storage.database_file, "habitbot.db");
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("scheduler.catch_up").as_deref(), Some("true"));
        assert_eq!(cfg.get("scheduler.tick_interval_secs").as_deref(), Some("60"));
        assert_eq!(cfg.get("defaults.timezone").as_deref(), Some("+05:00"));
        assert!(cfg.get("scheduler.missing_key").is_none());
    }

    #[test]
    fn set_value_updates_typed_fields() {
        let mut cfg = Config::default();
        cfg.set_value("scheduler.catch_up", "false").unwrap();
        cfg.set_value("scheduler.tick_interval_secs", "30").unwrap();
        cfg.set_value("defaults.reminder_time", "07:45").unwrap();
        assert!(!cfg.scheduler.catch_up);
        assert_eq!(cfg.scheduler.tick_interval_secs, 30);
        assert_eq!(cfg.reminder_time().unwrap(), NaiveTime::from_hms_opt(7, 45, 0).unwrap());
    }

    #[test]
    fn set_value_rejects_unknown_key_and_bad_values() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set_value("scheduler.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(cfg.set_value("scheduler.catch_up", "maybe").is_err());
        assert!(cfg.set_value("defaults.timezone", "Mars/Olympus").is_err());
        assert!(cfg.set_value("defaults.reminder_time", "25:00").is_err());
        assert!(cfg.set_value("scheduler", "1").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            (ENV_TIMEZONE, "UTC+3"),
            (ENV_REMINDER_TIME, "08:30"),
            (ENV_TICK_INTERVAL, "15"),
        ]
        .into_iter()
        .collect();
        let mut cfg = Config::default();
        cfg.apply_env_overrides(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(cfg.timezone().unwrap().offset_minutes(), Some(180));
        assert_eq!(cfg.reminder_time().unwrap(), NaiveTime::from_hms_opt(8, 30, 0).unwrap());
        assert_eq!(cfg.slot_policy().tolerance, Duration::seconds(15));
    }

    #[test]
    fn env_override_rejects_bad_interval() {
        let mut cfg = Config::default();
        let result = cfg.apply_env_overrides(|name| (name == ENV_TICK_INTERVAL).then(|| "soon".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn load_from_writes_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        std::fs::write(&path, "[defaults]\ntimezone = \"-04:00\"\n").unwrap();
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.timezone().unwrap().offset_minutes(), Some(-240));
    }

    #[test]
    fn load_from_rejects_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[scheduler\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::LoadFailed { .. })));
    }
}
