//! Persistence interface consumed by the core.
//!
//! The scheduler and the habit service only talk to storage through
//! [`HabitRepository`]. [`MemoryRepository`] keeps everything in process;
//! [`crate::storage::SqliteRepository`] is the durable implementation.

mod memory;

pub use memory::MemoryRepository;

use std::ops::RangeInclusive;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::RepositoryError;
use crate::habit::{CompletionEvent, Habit, HabitId, OwnerId, OwnerSettings};

/// Outcome of the "already reminded" check-and-set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkOutcome {
    /// This call set the marker.
    Marked,
    /// The marker was already set by an earlier call.
    AlreadyMarked,
}

/// Storage for habits, completions and reminder markers.
///
/// Every method touches a single habit, completion or marker record; no
/// operation spans several habits.
pub trait HabitRepository {
    /// Non-archived habits, for one owner or for everyone.
    fn get_active_habits(&self, owner_id: Option<OwnerId>) -> Result<Vec<Habit>, RepositoryError>;

    /// All habits of an owner, archived ones included.
    fn get_owner_habits(&self, owner_id: OwnerId) -> Result<Vec<Habit>, RepositoryError>;

    /// A habit by id, archived or not.
    fn get_habit(&self, habit_id: &HabitId) -> Result<Option<Habit>, RepositoryError>;

    /// Insert or replace a habit.
    fn save_habit(&self, habit: &Habit) -> Result<(), RepositoryError>;

    /// Completions of a habit with dates in `range`, ascending by date.
    fn get_completions(
        &self,
        habit_id: &HabitId,
        range: RangeInclusive<NaiveDate>,
    ) -> Result<Vec<CompletionEvent>, RepositoryError>;

    /// Record a completion. Returns `false` when the date was already recorded.
    fn record_completion(&self, event: &CompletionEvent) -> Result<bool, RepositoryError>;

    /// Atomically set the "reminded on `date`" marker.
    fn mark_reminded(&self, habit_id: &HabitId, date: NaiveDate) -> Result<MarkOutcome, RepositoryError>;

    fn is_reminded(&self, habit_id: &HabitId, date: NaiveDate) -> Result<bool, RepositoryError>;

    fn get_owner_settings(&self, owner_id: OwnerId) -> Result<Option<OwnerSettings>, RepositoryError>;

    fn save_owner_settings(&self, settings: &OwnerSettings) -> Result<(), RepositoryError>;
}

impl<T: HabitRepository + ?Sized> HabitRepository for &T {
    fn get_active_habits(&self, owner_id: Option<OwnerId>) -> Result<Vec<Habit>, RepositoryError> {
        (**self).get_active_habits(owner_id)
    }

    fn get_owner_habits(&self, owner_id: OwnerId) -> Result<Vec<Habit>, RepositoryError> {
        (**self).get_owner_habits(owner_id)
    }

    fn get_habit(&self, habit_id: &HabitId) -> Result<Option<Habit>, RepositoryError> {
        (**self).get_habit(habit_id)
    }

    fn save_habit(&self, habit: &Habit) -> Result<(), RepositoryError> {
        (**self).save_habit(habit)
    }

    fn get_completions(
        &self,
        habit_id: &HabitId,
        range: RangeInclusive<NaiveDate>,
    ) -> Result<Vec<CompletionEvent>, RepositoryError> {
        (**self).get_completions(habit_id, range)
    }

    fn record_completion(&self, event: &CompletionEvent) -> Result<bool, RepositoryError> {
        (**self).record_completion(event)
    }

    fn mark_reminded(&self, habit_id: &HabitId, date: NaiveDate) -> Result<MarkOutcome, RepositoryError> {
        (**self).mark_reminded(habit_id, date)
    }

    fn is_reminded(&self, habit_id: &HabitId, date: NaiveDate) -> Result<bool, RepositoryError> {
        (**self).is_reminded(habit_id, date)
    }

    fn get_owner_settings(&self, owner_id: OwnerId) -> Result<Option<OwnerSettings>, RepositoryError> {
        (**self).get_owner_settings(owner_id)
    }

    fn save_owner_settings(&self, settings: &OwnerSettings) -> Result<(), RepositoryError> {
        (**self).save_owner_settings(settings)
    }
}
