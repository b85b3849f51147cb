//! SQLite-backed habit repository.
//!
//! Provides persistent storage for:
//! - Habits (rule stored as JSON)
//! - Completion history, one row per habit and date
//! - Reminder markers, one row per habit and date
//! - Owner settings

use std::ops::RangeInclusive;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::warn;

use super::migrations;
use crate::error::RepositoryError;
use crate::habit::{
    CompletionEvent, Habit, HabitId, OwnerId, OwnerSettings, RecurrenceRule, ReminderSettings,
};
use crate::repository::{HabitRepository, MarkOutcome};
use crate::timezone::UserTimezone;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

const HABIT_COLUMNS: &str = "id, owner_id, title, emoji, description, rule, reminder_enabled,
     reminder_time, timezone, start_date, end_date, archived, created_at, updated_at";

/// SQLite database implementing [`HabitRepository`].
pub struct SqliteRepository {
    conn: Connection,
}

impl SqliteRepository {
    /// Open (or create) the database at `path` and apply migrations.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| RepositoryError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, RepositoryError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::migrate(&conn).map_err(|e| RepositoryError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn query_habits(&self, sql: &str, owner_id: Option<OwnerId>) -> Result<Vec<Habit>, RepositoryError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = match owner_id {
            Some(owner) => stmt.query_map(params![owner], HabitRow::from_row)?,
            None => stmt.query_map([], HabitRow::from_row)?,
        };

        let mut habits = Vec::new();
        for row in rows {
            let row = row?;
            let id = row.id.clone();
            // A corrupt row must not hide the owner's other habits.
            match row.into_habit() {
                Ok(habit) => habits.push(habit),
                Err(e) => warn!(habit_id = %id, error = %e, "skipping unreadable habit row"),
            }
        }
        Ok(habits)
    }
}

/// Raw column values of a `habits` row.
struct HabitRow {
    id: String,
    owner_id: OwnerId,
    title: String,
    emoji: Option<String>,
    description: String,
    rule: String,
    reminder_enabled: bool,
    reminder_time: String,
    timezone: String,
    start_date: String,
    end_date: Option<String>,
    archived: bool,
    created_at: String,
    updated_at: String,
}

impl HabitRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            title: row.get(2)?,
            emoji: row.get(3)?,
            description: row.get(4)?,
            rule: row.get(5)?,
            reminder_enabled: row.get(6)?,
            reminder_time: row.get(7)?,
            timezone: row.get(8)?,
            start_date: row.get(9)?,
            end_date: row.get(10)?,
            archived: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }

    fn into_habit(self) -> Result<Habit, RepositoryError> {
        let rule: RecurrenceRule =
            serde_json::from_str(&self.rule).map_err(|e| corrupt("habits", format!("rule: {e}")))?;
        let timezone: UserTimezone = self
            .timezone
            .parse()
            .map_err(|e| corrupt("habits", format!("timezone: {e}")))?;
        let end_date = self.end_date.as_deref().map(parse_date).transpose()?;

        Ok(Habit {
            id: HabitId::from(self.id),
            owner_id: self.owner_id,
            title: self.title,
            emoji: self.emoji,
            description: self.description,
            rule,
            reminder: ReminderSettings {
                enabled: self.reminder_enabled,
                time: parse_time(&self.reminder_time)?,
            },
            timezone,
            start_date: parse_date(&self.start_date)?,
            end_date,
            archived: self.archived,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

fn corrupt(table: &str, message: impl Into<String>) -> RepositoryError {
    RepositoryError::Corrupt {
        table: table.to_string(),
        message: message.into(),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| corrupt("habits", format!("date '{s}': {e}")))
}

fn parse_time(s: &str) -> Result<NaiveTime, RepositoryError> {
    NaiveTime::parse_from_str(s, TIME_FORMAT).map_err(|e| corrupt("habits", format!("time '{s}': {e}")))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| corrupt("habits", format!("timestamp '{s}': {e}")))
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

impl HabitRepository for SqliteRepository {
    fn get_active_habits(&self, owner_id: Option<OwnerId>) -> Result<Vec<Habit>, RepositoryError> {
        let sql = match owner_id {
            Some(_) => format!(
                "SELECT {HABIT_COLUMNS} FROM habits
                 WHERE archived = 0 AND owner_id = ?1
                 ORDER BY created_at, id"
            ),
            None => format!(
                "SELECT {HABIT_COLUMNS} FROM habits
                 WHERE archived = 0
                 ORDER BY created_at, id"
            ),
        };
        self.query_habits(&sql, owner_id)
    }

    fn get_owner_habits(&self, owner_id: OwnerId) -> Result<Vec<Habit>, RepositoryError> {
        let sql = format!(
            "SELECT {HABIT_COLUMNS} FROM habits
             WHERE owner_id = ?1
             ORDER BY created_at, id"
        );
        self.query_habits(&sql, Some(owner_id))
    }

    fn get_habit(&self, habit_id: &HabitId) -> Result<Option<Habit>, RepositoryError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {HABIT_COLUMNS} FROM habits WHERE id = ?1"),
                params![habit_id.as_str()],
                HabitRow::from_row,
            )
            .optional()?;
        row.map(HabitRow::into_habit).transpose()
    }

    fn save_habit(&self, habit: &Habit) -> Result<(), RepositoryError> {
        let rule = serde_json::to_string(&habit.rule).map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;
        self.conn.execute(
            "INSERT INTO habits (id, owner_id, title, emoji, description, rule, reminder_enabled,
                                 reminder_time, timezone, start_date, end_date, archived,
                                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                emoji = excluded.emoji,
                description = excluded.description,
                rule = excluded.rule,
                reminder_enabled = excluded.reminder_enabled,
                reminder_time = excluded.reminder_time,
                timezone = excluded.timezone,
                start_date = excluded.start_date,
                end_date = excluded.end_date,
                archived = excluded.archived,
                updated_at = excluded.updated_at",
            params![
                habit.id.as_str(),
                habit.owner_id,
                habit.title,
                habit.emoji,
                habit.description,
                rule,
                habit.reminder.enabled,
                habit.reminder.time.format(TIME_FORMAT).to_string(),
                habit.timezone.to_string(),
                format_date(habit.start_date),
                habit.end_date.map(format_date),
                habit.archived,
                habit.created_at.to_rfc3339(),
                habit.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn get_completions(
        &self,
        habit_id: &HabitId,
        range: RangeInclusive<NaiveDate>,
    ) -> Result<Vec<CompletionEvent>, RepositoryError> {
        let mut stmt = self.conn.prepare(
            "SELECT date, note FROM completions
             WHERE habit_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date",
        )?;
        let rows = stmt.query_map(
            params![
                habit_id.as_str(),
                format_date(*range.start()),
                format_date(*range.end())
            ],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?)),
        )?;

        let mut events = Vec::new();
        for row in rows {
            let (date, note) = row?;
            let date = NaiveDate::parse_from_str(&date, DATE_FORMAT)
                .map_err(|e| corrupt("completions", format!("date '{date}': {e}")))?;
            events.push(CompletionEvent {
                habit_id: habit_id.clone(),
                date,
                note,
            });
        }
        Ok(events)
    }

    fn record_completion(&self, event: &CompletionEvent) -> Result<bool, RepositoryError> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO completions (habit_id, date, note) VALUES (?1, ?2, ?3)",
            params![event.habit_id.as_str(), format_date(event.date), event.note],
        )?;
        Ok(inserted == 1)
    }

    fn mark_reminded(&self, habit_id: &HabitId, date: NaiveDate) -> Result<MarkOutcome, RepositoryError> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO reminders_sent (habit_id, date) VALUES (?1, ?2)",
            params![habit_id.as_str(), format_date(date)],
        )?;
        Ok(if inserted == 1 {
            MarkOutcome::Marked
        } else {
            MarkOutcome::AlreadyMarked
        })
    }

    fn is_reminded(&self, habit_id: &HabitId, date: NaiveDate) -> Result<bool, RepositoryError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM reminders_sent WHERE habit_id = ?1 AND date = ?2",
            params![habit_id.as_str(), format_date(date)],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn get_owner_settings(&self, owner_id: OwnerId) -> Result<Option<OwnerSettings>, RepositoryError> {
        let row = self
            .conn
            .query_row(
                "SELECT timezone, default_reminder_time, updated_at
                 FROM owner_settings WHERE owner_id = ?1",
                params![owner_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((timezone, reminder_time, updated_at)) = row else {
            return Ok(None);
        };
        let timezone: UserTimezone = timezone
            .parse()
            .map_err(|e| corrupt("owner_settings", format!("timezone: {e}")))?;
        Ok(Some(OwnerSettings {
            owner_id,
            timezone,
            default_reminder_time: parse_time(&reminder_time)?,
            updated_at: parse_timestamp(&updated_at)?,
        }))
    }

    fn save_owner_settings(&self, settings: &OwnerSettings) -> Result<(), RepositoryError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO owner_settings (owner_id, timezone, default_reminder_time, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                settings.owner_id,
                settings.timezone.to_string(),
                settings.default_reminder_time.format(TIME_FORMAT).to_string(),
                settings.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}
