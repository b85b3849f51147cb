//! Habit actions on behalf of an owner.
//!
//! [`HabitService`] is what a chat front end calls when a user creates,
//! edits, completes or inspects habits. It checks ownership, loads and
//! saves through the repository and returns a structured [`HabitAction`]
//! for the front end to render.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::due::DueSetEvaluator;
use crate::error::{CoreError, Result, ValidationError};
use crate::habit::{
    CompletionEvent, CompletionLog, Habit, HabitId, OwnerId, OwnerSettings, RecurrenceRule,
    Reschedule,
};
use crate::repository::HabitRepository;
use crate::stats::{self, Period, PeriodSummary};
use crate::streak::StreakSnapshot;
use crate::timezone::UserTimezone;

/// Values used when an owner has no stored settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HabitDefaults {
    pub timezone: UserTimezone,
    pub reminder_time: NaiveTime,
}

/// Input for [`HabitService::create_habit`]. Unset fields fall back to the
/// owner's settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewHabit {
    pub title: String,
    #[serde(default)]
    pub rule: RecurrenceRule,
    #[serde(default)]
    pub reminder_time: Option<NaiveTime>,
    #[serde(default)]
    pub timezone: Option<UserTimezone>,
    #[serde(default)]
    pub emoji: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl NewHabit {
    pub fn new(title: impl Into<String>, rule: RecurrenceRule) -> Self {
        Self {
            title: title.into(),
            rule,
            ..Default::default()
        }
    }
}

/// Result of a habit action, for the chat front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum HabitAction {
    Created {
        habit: Habit,
    },
    Renamed {
        habit: Habit,
    },
    Rescheduled {
        habit: Habit,
    },
    Archived {
        habit_id: HabitId,
    },
    Completed {
        habit_id: HabitId,
        date: NaiveDate,
        /// `false` when the date was already recorded.
        newly_recorded: bool,
        streak: StreakSnapshot,
    },
}

pub struct HabitService<R> {
    repository: R,
    defaults: HabitDefaults,
    evaluator: DueSetEvaluator,
}

impl<R: HabitRepository> HabitService<R> {
    pub fn new(repository: R, defaults: HabitDefaults) -> Self {
        Self {
            repository,
            defaults,
            evaluator: DueSetEvaluator::new(),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    // ── Owner settings ───────────────────────────────────────────────

    /// Stored settings, or the service defaults for an unknown owner.
    pub fn owner_settings(&self, owner_id: OwnerId, now: DateTime<Utc>) -> Result<OwnerSettings> {
        Ok(self
            .repository
            .get_owner_settings(owner_id)?
            .unwrap_or_else(|| {
                OwnerSettings::new(owner_id, self.defaults.timezone, self.defaults.reminder_time, now)
            }))
    }

    /// Change an owner's timezone and/or default reminder time.
    ///
    /// Existing habits keep their own timezone and reminder time.
    pub fn update_owner_settings(
        &self,
        owner_id: OwnerId,
        timezone: Option<UserTimezone>,
        default_reminder_time: Option<NaiveTime>,
        now: DateTime<Utc>,
    ) -> Result<OwnerSettings> {
        if timezone.is_none() && default_reminder_time.is_none() {
            return Err(ValidationError::invalid_value("settings", "nothing to change").into());
        }
        let mut settings = self.owner_settings(owner_id, now)?;
        if let Some(tz) = timezone {
            settings.timezone = tz;
        }
        if let Some(time) = default_reminder_time {
            settings.default_reminder_time = time;
        }
        settings.updated_at = now;
        self.repository.save_owner_settings(&settings)?;
        Ok(settings)
    }

    // ── Habit actions ────────────────────────────────────────────────

    pub fn create_habit(&self, owner_id: OwnerId, new: NewHabit, now: DateTime<Utc>) -> Result<HabitAction> {
        let settings = self.owner_settings(owner_id, now)?;
        let mut habit = Habit::create(
            owner_id,
            &new.title,
            new.rule,
            new.reminder_time.unwrap_or(settings.default_reminder_time),
            new.timezone.unwrap_or(settings.timezone),
            now,
        )?
        .with_emoji(new.emoji)
        .with_description(new.description);
        if let Some(start) = new.start_date {
            habit = habit.with_start_date(start)?;
        }
        habit = habit.with_end_date(new.end_date)?;

        self.repository.save_habit(&habit)?;
        info!(habit_id = %habit.id(), owner_id, rule = %habit.rule(), "habit created");
        Ok(HabitAction::Created { habit })
    }

    pub fn rename_habit(
        &self,
        owner_id: OwnerId,
        habit_id: &HabitId,
        title: &str,
        now: DateTime<Utc>,
    ) -> Result<HabitAction> {
        let mut habit = self.load_active(owner_id, habit_id)?;
        habit.rename(title, now)?;
        self.repository.save_habit(&habit)?;
        Ok(HabitAction::Renamed { habit })
    }

    /// Change the rule and/or reminder. If today's reminder was already
    /// sent, a new reminder time takes effect from the next local date.
    pub fn reschedule_habit(
        &self,
        owner_id: OwnerId,
        habit_id: &HabitId,
        change: Reschedule,
        now: DateTime<Utc>,
    ) -> Result<HabitAction> {
        let mut habit = self.load_active(owner_id, habit_id)?;
        habit.reschedule(change, now)?;
        self.repository.save_habit(&habit)?;
        info!(habit_id = %habit.id(), rule = %habit.rule(), "habit rescheduled");
        Ok(HabitAction::Rescheduled { habit })
    }

    pub fn archive_habit(&self, owner_id: OwnerId, habit_id: &HabitId, now: DateTime<Utc>) -> Result<HabitAction> {
        let mut habit = self.load_active(owner_id, habit_id)?;
        habit.archive(now);
        self.repository.save_habit(&habit)?;
        info!(habit_id = %habit.id(), "habit archived");
        Ok(HabitAction::Archived {
            habit_id: habit.id().clone(),
        })
    }

    /// Mark a habit done on `date`, or on the habit's local today.
    ///
    /// # Errors
    /// Future dates and dates before the habit's start are rejected.
    pub fn complete_habit(
        &self,
        owner_id: OwnerId,
        habit_id: &HabitId,
        date: Option<NaiveDate>,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<HabitAction> {
        let habit = self.load_active(owner_id, habit_id)?;
        let today = habit.local_date(now);
        let date = date.unwrap_or(today);
        if date > today {
            return Err(ValidationError::invalid_value("date", format!("{date} is in the future")).into());
        }
        if date < habit.start_date() {
            return Err(ValidationError::invalid_value(
                "date",
                format!("{date} is before the habit started on {}", habit.start_date()),
            )
            .into());
        }

        let mut event = CompletionEvent::new(habit.id().clone(), date);
        if let Some(note) = note {
            event = event.with_note(note);
        }
        let newly_recorded = self.repository.record_completion(&event)?;
        let streak = self.streak_for(&habit, today)?;
        info!(habit_id = %habit.id(), %date, newly_recorded, current = streak.current, "habit completed");

        Ok(HabitAction::Completed {
            habit_id: habit.id().clone(),
            date,
            newly_recorded,
            streak,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Streak of a habit as of its local today. Archived habits are readable.
    pub fn habit_streak(&self, owner_id: OwnerId, habit_id: &HabitId, now: DateTime<Utc>) -> Result<StreakSnapshot> {
        let habit = self.load_owned(owner_id, habit_id)?;
        self.streak_for(&habit, habit.local_date(now))
    }

    pub fn list_habits(&self, owner_id: OwnerId, include_archived: bool) -> Result<Vec<Habit>> {
        if include_archived {
            Ok(self.repository.get_owner_habits(owner_id)?)
        } else {
            Ok(self.repository.get_active_habits(Some(owner_id))?)
        }
    }

    /// Active habits due on their own local today. Habits with an invalid
    /// stored rule are logged and left out.
    pub fn due_today(&self, owner_id: OwnerId, now: DateTime<Utc>) -> Result<Vec<Habit>> {
        let habits = self.repository.get_active_habits(Some(owner_id))?;
        let mut due = Vec::new();
        for habit in habits {
            let set = self
                .evaluator
                .due_today(std::slice::from_ref(&habit), habit.local_date(now));
            for failure in &set.failures {
                warn!(habit_id = %failure.habit_id, error = %failure.error, "cannot evaluate habit");
            }
            if set.contains(habit.id()) {
                due.push(habit);
            }
        }
        Ok(due)
    }

    /// Completion summary over `period`, ending at `now`. Each habit is
    /// counted up to its own local today.
    pub fn period_summary(&self, owner_id: OwnerId, period: Period, now: DateTime<Utc>) -> Result<PeriodSummary> {
        let timezone = self.owner_settings(owner_id, now)?.timezone;
        let mut entries = Vec::new();
        for habit in self.repository.get_owner_habits(owner_id)? {
            let range = period.resolve(habit.local_date(now));
            let events = self.repository.get_completions(habit.id(), range)?;
            let log = CompletionLog::from_events(habit.id().clone(), events);
            entries.push((habit, log));
        }
        Ok(stats::summarize(&entries, period, now, timezone)?)
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn streak_for(&self, habit: &Habit, as_of: NaiveDate) -> Result<StreakSnapshot> {
        let events = self
            .repository
            .get_completions(habit.id(), habit.start_date()..=as_of)?;
        let log = CompletionLog::from_events(habit.id().clone(), events);
        Ok(habit.streak(&log, as_of)?)
    }

    /// The habit if it exists and belongs to `owner_id`.
    fn load_owned(&self, owner_id: OwnerId, habit_id: &HabitId) -> Result<Habit> {
        match self.repository.get_habit(habit_id)? {
            Some(habit) if habit.owner_id() == owner_id => Ok(habit),
            _ => Err(CoreError::not_found(habit_id.as_str())),
        }
    }

    fn load_active(&self, owner_id: OwnerId, habit_id: &HabitId) -> Result<Habit> {
        let habit = self.load_owned(owner_id, habit_id)?;
        if habit.is_archived() {
            return Err(CoreError::not_found(habit_id.as_str()));
        }
        Ok(habit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;
    use chrono::TimeZone;

    const OWNER: OwnerId = 7;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 3, 12, 0, 0).unwrap()
    }

    fn service() -> HabitService<MemoryRepository> {
        HabitService::new(
            MemoryRepository::new(),
            HabitDefaults {
                timezone: "+05:00".parse().unwrap(),
                reminder_time: NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
            },
        )
    }

    fn created(action: HabitAction) -> Habit {
        match action {
            HabitAction::Created { habit } => habit,
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn test_create_uses_owner_defaults() {
        let svc = service();
        let habit = created(svc.create_habit(OWNER, NewHabit::new("Read", RecurrenceRule::daily()), now()).unwrap());
        assert_eq!(habit.reminder().time, NaiveTime::from_hms_opt(21, 0, 0).unwrap());
        assert_eq!(habit.timezone().to_string(), "+05:00");
        assert_eq!(svc.list_habits(OWNER, false).unwrap().len(), 1);
    }

    #[test]
    fn test_create_rejects_blank_title() {
        let err = service()
            .create_habit(OWNER, NewHabit::new("   ", RecurrenceRule::daily()), now())
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::EmptyTitle)));
    }

    #[test]
    fn test_other_owner_gets_not_found() {
        let svc = service();
        let habit = created(svc.create_habit(OWNER, NewHabit::new("Read", RecurrenceRule::daily()), now()).unwrap());
        let err = svc.rename_habit(OWNER + 1, habit.id(), "Mine", now()).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn test_archived_habit_rejects_actions_but_stays_readable() {
        let svc = service();
        let habit = created(svc.create_habit(OWNER, NewHabit::new("Read", RecurrenceRule::daily()), now()).unwrap());
        svc.archive_habit(OWNER, habit.id(), now()).unwrap();

        assert!(matches!(
            svc.complete_habit(OWNER, habit.id(), None, None, now()),
            Err(CoreError::NotFound { .. })
        ));
        assert!(matches!(
            svc.archive_habit(OWNER, habit.id(), now()),
            Err(CoreError::NotFound { .. })
        ));
        assert!(svc.habit_streak(OWNER, habit.id(), now()).is_ok());
        assert_eq!(svc.list_habits(OWNER, false).unwrap().len(), 0);
        assert_eq!(svc.list_habits(OWNER, true).unwrap().len(), 1);
    }

    #[test]
    fn test_complete_reports_streak_and_is_idempotent() {
        let svc = service();
        let new = NewHabit {
            start_date: NaiveDate::from_ymd_opt(2024, 5, 1),
            ..NewHabit::new("Read", RecurrenceRule::daily())
        };
        let habit = created(svc.create_habit(OWNER, new, now()).unwrap());
        for day in 1..=3 {
            svc.complete_habit(OWNER, habit.id(), NaiveDate::from_ymd_opt(2024, 5, day), None, now())
                .unwrap();
        }
        match svc.complete_habit(OWNER, habit.id(), None, None, now()).unwrap() {
            HabitAction::Completed {
                newly_recorded,
                streak,
                date,
                ..
            } => {
                assert!(!newly_recorded);
                assert_eq!(date, NaiveDate::from_ymd_opt(2024, 5, 3).unwrap());
                assert_eq!(streak.current, 3);
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn test_complete_rejects_future_and_pre_start_dates() {
        let svc = service();
        let habit = created(svc.create_habit(OWNER, NewHabit::new("Read", RecurrenceRule::daily()), now()).unwrap());
        let future = NaiveDate::from_ymd_opt(2024, 5, 4);
        let before = NaiveDate::from_ymd_opt(2024, 5, 2);
        assert!(matches!(
            svc.complete_habit(OWNER, habit.id(), future, None, now()),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            svc.complete_habit(OWNER, habit.id(), before, None, now()),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_reschedule_reminder_keeps_todays_marker() {
        let svc = service();
        let habit = created(svc.create_habit(OWNER, NewHabit::new("Read", RecurrenceRule::daily()), now()).unwrap());
        let today = habit.local_date(now());
        svc.repository().mark_reminded(habit.id(), today).unwrap();

        svc.reschedule_habit(
            OWNER,
            habit.id(),
            Reschedule {
                reminder_time: NaiveTime::from_hms_opt(22, 0, 0),
                ..Default::default()
            },
            now(),
        )
        .unwrap();
        assert!(svc.repository().is_reminded(habit.id(), today).unwrap());
    }

    #[test]
    fn test_due_today_uses_rule() {
        let svc = service();
        // 2024-05-03 is a Friday (index 4).
        svc.create_habit(OWNER, NewHabit::new("Gym", RecurrenceRule::weekly([4]).unwrap()), now())
            .unwrap();
        svc.create_habit(OWNER, NewHabit::new("Swim", RecurrenceRule::weekly([5]).unwrap()), now())
            .unwrap();
        let due = svc.due_today(OWNER, now()).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].title(), "Gym");
    }

    #[test]
    fn test_owner_settings_update() {
        let svc = service();
        let settings = svc
            .update_owner_settings(OWNER, Some("UTC".parse().unwrap()), None, now())
            .unwrap();
        assert_eq!(settings.timezone, UserTimezone::utc());
        assert_eq!(settings.default_reminder_time, NaiveTime::from_hms_opt(21, 0, 0).unwrap());
        assert_eq!(svc.owner_settings(OWNER, now()).unwrap(), settings);
        assert!(svc.update_owner_settings(OWNER, None, None, now()).is_err());
    }

    #[test]
    fn test_period_summary_counts_habit_on_its_local_day() {
        let svc = service();
        let new = NewHabit {
            timezone: Some("-08:00".parse().unwrap()),
            ..NewHabit::new("Walk", RecurrenceRule::daily())
        };
        let habit = created(svc.create_habit(OWNER, new, now()).unwrap());
        svc.complete_habit(OWNER, habit.id(), None, None, now()).unwrap();

        // 20:00 UTC is 05-04 for the owner at +05:00 but still 05-03 for the habit.
        let evening = Utc.with_ymd_and_hms(2024, 5, 3, 20, 0, 0).unwrap();
        let summary = svc.period_summary(OWNER, Period::Day, evening).unwrap();
        assert_eq!(summary.start, NaiveDate::from_ymd_opt(2024, 5, 4).unwrap());
        assert_eq!(summary.total_completed, 1);
        assert_eq!(summary.habits[0].completion_rate, 1.0);
    }
}
