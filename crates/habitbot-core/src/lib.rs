//! # Habitbot Core Library
//!
//! Scheduling and streak evaluation for a habit-tracking chat bot. The
//! library decides *when* a habit is due and *whether* a reminder should go
//! out; the chat front end and the clock live outside it.
//!
//! ## Architecture
//!
//! - **Recurrence rules**: pure "is this date due" over local calendar dates
//! - **Streaks**: derived from a rule and a completion log, never stored
//! - **Due sets**: which habits are due today or in their reminder slot
//! - **Reminder scheduler**: a tick-driven state machine that hands reminders
//!   to a [`ChatGateway`] at most once per habit and local date
//! - **Storage**: SQLite repository and TOML configuration
//!
//! Nothing in this crate reads the system clock: every operation that
//! depends on time takes `now` or a local date as an argument.
//!
//! ## Key Components
//!
//! - [`RecurrenceRule`]: when a habit is due
//! - [`Habit`]: the habit aggregate
//! - [`ReminderScheduler`]: reminder dispatch per tick
//! - [`HabitService`]: habit actions on behalf of an owner
//! - [`HabitRepository`]: persistence seam, see [`SqliteRepository`]

pub mod due;
pub mod error;
pub mod gateway;
pub mod habit;
pub mod repository;
pub mod scheduler;
pub mod service;
pub mod stats;
pub mod storage;
pub mod streak;
pub mod timezone;

pub use due::{DueSet, DueSetEvaluator, EvaluationFailure, SlotPolicy};
pub use error::{ConfigError, CoreError, DeliveryError, RepositoryError, Result, ValidationError};
pub use gateway::{ChatGateway, MemoryGateway, ReminderMessage};
pub use habit::{
    CompletionEvent, CompletionLog, Habit, HabitId, OwnerId, OwnerSettings, RecurrenceRule,
    ReminderSettings, Reschedule,
};
pub use repository::{HabitRepository, MarkOutcome, MemoryRepository};
pub use scheduler::{FailureStage, ReminderJob, ReminderScheduler, SchedulerState, TickFailure, TickReport};
pub use service::{HabitAction, HabitDefaults, HabitService, NewHabit};
pub use stats::{Period, PeriodSummary};
pub use storage::{Config, SqliteRepository};
pub use streak::StreakSnapshot;
pub use timezone::UserTimezone;
