//! Core error types for habitbot-core.
//!
//! Errors are split by who has to react to them: validation and not-found
//! errors go back to the user, repository errors are retried or surfaced
//! depending on the caller, delivery errors are logged and retried on the
//! next tick.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for habitbot-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Bad user input (empty title, invalid rule parameters).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Habit id unknown, owned by someone else, or archived.
    #[error("Habit '{habit_id}' not found")]
    NotFound { habit_id: String },

    /// Persistence store failure.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Chat gateway failure.
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    pub fn not_found(habit_id: impl Into<String>) -> Self {
        CoreError::NotFound {
            habit_id: habit_id.into(),
        }
    }

    /// Whether the error should be shown to the user as-is rather than
    /// treated as an internal failure.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, CoreError::Validation(_) | CoreError::NotFound { .. })
    }
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Habit title is empty or whitespace
    #[error("Habit title must not be empty")]
    EmptyTitle,

    /// Recurrence rule parameters are out of range
    #[error("Invalid recurrence rule: {0}")]
    InvalidRule(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl ValidationError {
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Persistence store errors.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// A stored row could not be decoded
    #[error("Corrupt record in '{table}': {message}")]
    Corrupt { table: String, message: String },

    /// Store temporarily unavailable
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Chat gateway errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The gateway refused the message
    #[error("Gateway rejected message for owner {owner_id}: {message}")]
    Rejected { owner_id: i64, message: String },

    /// The gateway could not be reached
    #[error("Gateway unavailable: {0}")]
    Unavailable(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be resolved or created
    #[error("Failed to access data directory: {0}")]
    DataDir(String),
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => {
                if inner.code == rusqlite::ErrorCode::DatabaseLocked
                    || inner.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    RepositoryError::Locked
                } else {
                    RepositoryError::QueryFailed(err.to_string())
                }
            }
            _ => RepositoryError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Repository(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
