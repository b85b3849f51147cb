//! Due-set evaluation.
//!
//! Given a batch of habits and an explicit date or instant, works out which
//! of them are due. Each habit is evaluated on its own; a habit whose rule
//! fails validation is reported in [`DueSet::failures`] and the rest of the
//! batch is still evaluated.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

use crate::error::ValidationError;
use crate::habit::{Habit, HabitId};

/// When a habit counts as being in its reminder slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPolicy {
    /// Width of the slot after the reminder time. Should be at least the
    /// interval between external ticks.
    pub tolerance: Duration,
    /// Keep the slot open until the end of the local day, so a reminder
    /// missed by a late or failed tick is still sent.
    pub catch_up: bool,
}

impl Default for SlotPolicy {
    fn default() -> Self {
        Self {
            tolerance: Duration::seconds(60),
            catch_up: true,
        }
    }
}

impl SlotPolicy {
    /// Whether `local_time` falls in the slot opened at `reminder_time`.
    pub fn contains(&self, reminder_time: NaiveTime, local_time: NaiveTime) -> bool {
        if local_time < reminder_time {
            return false;
        }
        if self.catch_up {
            return true;
        }
        let (slot_end, wrapped) = reminder_time.overflowing_add_signed(self.tolerance);
        wrapped != 0 || local_time < slot_end
    }
}

/// A habit whose due status could not be computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationFailure {
    pub habit_id: HabitId,
    pub error: ValidationError,
}

/// Result of one evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DueSet {
    pub habit_ids: BTreeSet<HabitId>,
    pub failures: Vec<EvaluationFailure>,
}

impl DueSet {
    pub fn contains(&self, id: &HabitId) -> bool {
        self.habit_ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.habit_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.habit_ids.is_empty()
    }

    fn push(&mut self, habit: &Habit, due: Result<bool, ValidationError>) {
        match due {
            Ok(true) => {
                self.habit_ids.insert(habit.id().clone());
            }
            Ok(false) => {}
            Err(error) => self.failures.push(EvaluationFailure {
                habit_id: habit.id().clone(),
                error,
            }),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DueSetEvaluator {
    policy: SlotPolicy,
}

impl DueSetEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: SlotPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> SlotPolicy {
        self.policy
    }

    /// Habits due on the local date `today`.
    ///
    /// `today` must already be in the owner's timezone; use this for habits
    /// of a single owner.
    pub fn due_today(&self, habits: &[Habit], today: NaiveDate) -> DueSet {
        let mut set = DueSet::default();
        for habit in habits {
            set.push(habit, habit.is_due_on(today));
        }
        set
    }

    /// Habits whose reminder should fire at `now`.
    ///
    /// Each habit is converted to its own local date and time. Habits with
    /// reminders disabled, archived habits and habits not due today are left
    /// out, as are habits whose reminder time has not been reached yet.
    pub fn due_at_reminder_slot(&self, habits: &[Habit], now: DateTime<Utc>) -> DueSet {
        let mut set = DueSet::default();
        for habit in habits {
            let reminder = habit.reminder();
            if !reminder.enabled {
                continue;
            }
            let local = habit.timezone().local_datetime(now);
            if !self.policy.contains(reminder.time, local.time()) {
                continue;
            }
            set.push(habit, habit.is_due_on(local.date()));
        }
        set
    }
}
