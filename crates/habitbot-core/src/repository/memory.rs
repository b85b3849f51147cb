//! In-process repository.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;

use super::{HabitRepository, MarkOutcome};
use crate::error::RepositoryError;
use crate::habit::{CompletionEvent, Habit, HabitId, OwnerId, OwnerSettings};

#[derive(Default)]
struct Inner {
    habits: BTreeMap<HabitId, Habit>,
    completions: BTreeMap<HabitId, BTreeMap<NaiveDate, CompletionEvent>>,
    reminded: BTreeSet<(HabitId, NaiveDate)>,
    owners: BTreeMap<OwnerId, OwnerSettings>,
}

/// Repository backed by in-memory maps behind a mutex.
///
/// Each call holds the lock for its whole duration, which makes
/// `mark_reminded` and `record_completion` atomic.
#[derive(Default)]
pub struct MemoryRepository {
    inner: Mutex<Inner>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, RepositoryError> {
        self.inner
            .lock()
            .map_err(|_| RepositoryError::Unavailable("memory repository lock poisoned".into()))
    }
}

fn by_creation(habits: &mut [Habit]) {
    habits.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}

impl HabitRepository for MemoryRepository {
    fn get_active_habits(&self, owner_id: Option<OwnerId>) -> Result<Vec<Habit>, RepositoryError> {
        let inner = self.lock()?;
        let mut habits: Vec<Habit> = inner
            .habits
            .values()
            .filter(|h| !h.archived)
            .filter(|h| owner_id.map_or(true, |owner| h.owner_id == owner))
            .cloned()
            .collect();
        by_creation(&mut habits);
        Ok(habits)
    }

    fn get_owner_habits(&self, owner_id: OwnerId) -> Result<Vec<Habit>, RepositoryError> {
        let inner = self.lock()?;
        let mut habits: Vec<Habit> = inner
            .habits
            .values()
            .filter(|h| h.owner_id == owner_id)
            .cloned()
            .collect();
        by_creation(&mut habits);
        Ok(habits)
    }

    fn get_habit(&self, habit_id: &HabitId) -> Result<Option<Habit>, RepositoryError> {
        Ok(self.lock()?.habits.get(habit_id).cloned())
    }

    fn save_habit(&self, habit: &Habit) -> Result<(), RepositoryError> {
        self.lock()?.habits.insert(habit.id.clone(), habit.clone());
        Ok(())
    }

    fn get_completions(
        &self,
        habit_id: &HabitId,
        range: RangeInclusive<NaiveDate>,
    ) -> Result<Vec<CompletionEvent>, RepositoryError> {
        let inner = self.lock()?;
        if range.start() > range.end() {
            return Ok(Vec::new());
        }
        Ok(inner
            .completions
            .get(habit_id)
            .map(|events| events.range(range).map(|(_, e)| e.clone()).collect())
            .unwrap_or_default())
    }

    fn record_completion(&self, event: &CompletionEvent) -> Result<bool, RepositoryError> {
        let mut inner = self.lock()?;
        let events = inner.completions.entry(event.habit_id.clone()).or_default();
        if events.contains_key(&event.date) {
            return Ok(false);
        }
        events.insert(event.date, event.clone());
        Ok(true)
    }

    fn mark_reminded(&self, habit_id: &HabitId, date: NaiveDate) -> Result<MarkOutcome, RepositoryError> {
        let inserted = self.lock()?.reminded.insert((habit_id.clone(), date));
        Ok(if inserted {
            MarkOutcome::Marked
        } else {
            MarkOutcome::AlreadyMarked
        })
    }

    fn is_reminded(&self, habit_id: &HabitId, date: NaiveDate) -> Result<bool, RepositoryError> {
        Ok(self.lock()?.reminded.contains(&(habit_id.clone(), date)))
    }

    fn get_owner_settings(&self, owner_id: OwnerId) -> Result<Option<OwnerSettings>, RepositoryError> {
        Ok(self.lock()?.owners.get(&owner_id).cloned())
    }

    fn save_owner_settings(&self, settings: &OwnerSettings) -> Result<(), RepositoryError> {
        self.lock()?.owners.insert(settings.owner_id, settings.clone());
        Ok(())
    }
}
