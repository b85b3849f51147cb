//! Database schema migrations for habitbot.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};
use tracing::{debug, warn};

/// Schema version after all migrations ran.
pub const CURRENT_VERSION: i32 = 1;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Current schema version, 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| row.get::<_, i32>(0))
        .unwrap_or_else(|e| {
            if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
                warn!(error = %e, "failed to read schema_version");
            }
            0
        })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    debug!(version, "schema migrated");
    Ok(())
}

/// Migration v1: habits, completions, reminder markers and owner settings.
///
/// The recurrence rule is stored as JSON in `rule`. Dates are ISO
/// `YYYY-MM-DD`, timestamps RFC 3339.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS habits (
            id            TEXT PRIMARY KEY,
            owner_id      INTEGER NOT NULL,
            title         TEXT NOT NULL,
            emoji         TEXT,
            description   TEXT NOT NULL DEFAULT '',
            rule          TEXT NOT NULL,
            reminder_time TEXT NOT NULL,
            timezone      TEXT NOT NULL,
            start_date    TEXT NOT NULL,
            end_date      TEXT,
            reminder_enabled INTEGER NOT NULL DEFAULT 1,
            archived      INTEGER NOT NULL DEFAULT 0,
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS completions (
            habit_id TEXT NOT NULL REFERENCES habits(id),
            date     TEXT NOT NULL,
            note     TEXT,
            PRIMARY KEY (habit_id, date)
        );

        CREATE TABLE IF NOT EXISTS reminders_sent (
            habit_id TEXT NOT NULL REFERENCES habits(id),
            date     TEXT NOT NULL,
            PRIMARY KEY (habit_id, date)
        );

        CREATE TABLE IF NOT EXISTS owner_settings (
            owner_id              INTEGER PRIMARY KEY,
            timezone              TEXT NOT NULL,
            default_reminder_time TEXT NOT NULL,
            updated_at            TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_habits_owner ON habits(owner_id, archived);",
    )?;

    set_schema_version(&tx, 1)?;
    tx.commit()?;
    Ok(())
}
