//! Habit aggregate.
//!
//! A habit is created, renamed, rescheduled and archived through the methods
//! on [`Habit`]; nothing else mutates it. Archiving is terminal: an archived
//! habit is never due and cannot be modified, but its history stays readable.

pub mod completion;
pub mod owner;
pub mod recurrence;

pub use completion::{CompletionEvent, CompletionLog};
pub use owner::OwnerSettings;
pub use recurrence::RecurrenceRule;

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result, ValidationError};
use crate::streak::{self, StreakSnapshot};
use crate::timezone::UserTimezone;

/// Chat user id of the habit owner.
pub type OwnerId = i64;

/// Opaque habit identifier (UUID v4 string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HabitId(String);

impl HabitId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HabitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for HabitId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for HabitId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Reminder configuration of a habit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderSettings {
    pub enabled: bool,
    /// Local time of day in the owner's timezone.
    pub time: NaiveTime,
}

/// Changes applied by [`Habit::reschedule`]. Unset fields are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reschedule {
    pub rule: Option<RecurrenceRule>,
    pub reminder_time: Option<NaiveTime>,
    pub reminder_enabled: Option<bool>,
}

impl Reschedule {
    pub fn is_empty(&self) -> bool {
        self.rule.is_none() && self.reminder_time.is_none() && self.reminder_enabled.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    pub(crate) id: HabitId,
    pub(crate) owner_id: OwnerId,
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) emoji: Option<String>,
    #[serde(default)]
    pub(crate) description: String,
    pub(crate) rule: RecurrenceRule,
    pub(crate) reminder: ReminderSettings,
    pub(crate) timezone: UserTimezone,
    /// First local date the habit can be due.
    pub(crate) start_date: NaiveDate,
    /// Last local date the habit can be due.
    #[serde(default)]
    pub(crate) end_date: Option<NaiveDate>,
    #[serde(default)]
    pub(crate) archived: bool,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl Habit {
    /// Create a habit starting on the owner's local date at `now`.
    ///
    /// # Errors
    /// Returns a validation error for an empty title or invalid rule.
    pub fn create(
        owner_id: OwnerId,
        title: &str,
        rule: RecurrenceRule,
        reminder_time: NaiveTime,
        timezone: UserTimezone,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let title = validate_title(title)?;
        rule.validate()?;
        Ok(Self {
            id: HabitId::generate(),
            owner_id,
            title,
            emoji: None,
            description: String::new(),
            rule,
            reminder: ReminderSettings {
                enabled: true,
                time: reminder_time,
            },
            timezone,
            start_date: timezone.local_date(now),
            end_date: None,
            archived: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Move the first due date. Must not be after the end date.
    pub fn with_start_date(mut self, start_date: NaiveDate) -> Result<Self> {
        check_window(start_date, self.end_date)?;
        self.start_date = start_date;
        Ok(self)
    }

    /// Set or clear the last due date. Must not be before the start date.
    pub fn with_end_date(mut self, end_date: Option<NaiveDate>) -> Result<Self> {
        check_window(self.start_date, end_date)?;
        self.end_date = end_date;
        Ok(self)
    }

    pub fn with_emoji(mut self, emoji: Option<String>) -> Self {
        self.emoji = emoji.filter(|e| !e.trim().is_empty());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into().trim().to_string();
        self
    }

    pub fn with_reminder_enabled(mut self, enabled: bool) -> Self {
        self.reminder.enabled = enabled;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn id(&self) -> &HabitId {
        &self.id
    }

    pub fn owner_id(&self) -> OwnerId {
        self.owner_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn emoji(&self) -> Option<&str> {
        self.emoji.as_deref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn rule(&self) -> &RecurrenceRule {
        &self.rule
    }

    pub fn reminder(&self) -> ReminderSettings {
        self.reminder
    }

    pub fn timezone(&self) -> UserTimezone {
        self.timezone
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.end_date
    }

    pub fn is_archived(&self) -> bool {
        self.archived
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Owner's local date at `now`.
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        self.timezone.local_date(now)
    }

    /// Local date-time at which the reminder for `date` is due.
    pub fn reminder_at(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.reminder.time)
    }

    /// Whether `date` lies inside the start/end window.
    pub fn is_within_window(&self, date: NaiveDate) -> bool {
        date >= self.start_date && self.end_date.map_or(true, |end| date <= end)
    }

    /// Whether the rule fires on `date` within the window, ignoring the
    /// archived flag. Used for history and statistics.
    pub fn is_scheduled_on(&self, date: NaiveDate) -> Result<bool, ValidationError> {
        if !self.is_within_window(date) {
            return Ok(false);
        }
        self.rule.is_due(date)
    }

    /// Whether the habit is due on `date`. Archived habits are never due.
    pub fn is_due_on(&self, date: NaiveDate) -> Result<bool, ValidationError> {
        if self.archived {
            return Ok(false);
        }
        self.is_scheduled_on(date)
    }

    /// Streak statistics as of the local date `as_of`.
    pub fn streak(
        &self,
        completions: &CompletionLog,
        as_of: NaiveDate,
    ) -> Result<StreakSnapshot, ValidationError> {
        streak::compute_window(&self.rule, self.start_date, self.end_date, completions, as_of)
    }

    /// Next due date on or after `from`, if the habit is still running.
    pub fn next_due_on_or_after(&self, from: NaiveDate) -> Result<Option<NaiveDate>, ValidationError> {
        if self.archived {
            return Ok(None);
        }
        let from = from.max(self.start_date);
        let next = self.rule.next_due(from)?;
        Ok(next.filter(|d| self.is_within_window(*d)))
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    pub fn rename(&mut self, title: &str, now: DateTime<Utc>) -> Result<()> {
        self.ensure_active()?;
        self.title = validate_title(title)?;
        self.updated_at = now;
        Ok(())
    }

    /// Replace the rule and/or reminder settings. Completion history is not
    /// touched, so streaks are recomputed against the new rule.
    pub fn reschedule(&mut self, change: Reschedule, now: DateTime<Utc>) -> Result<()> {
        self.ensure_active()?;
        if change.is_empty() {
            return Err(ValidationError::invalid_value("reschedule", "nothing to change").into());
        }
        if let Some(rule) = &change.rule {
            rule.validate()?;
        }
        if let Some(rule) = change.rule {
            self.rule = rule;
        }
        if let Some(time) = change.reminder_time {
            self.reminder.time = time;
        }
        if let Some(enabled) = change.reminder_enabled {
            self.reminder.enabled = enabled;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Archive the habit. Returns `false` if it was already archived.
    pub fn archive(&mut self, now: DateTime<Utc>) -> bool {
        if self.archived {
            return false;
        }
        self.archived = true;
        self.updated_at = now;
        true
    }

    fn ensure_active(&self) -> Result<()> {
        if self.archived {
            return Err(CoreError::not_found(self.id.as_str()));
        }
        Ok(())
    }
}

fn validate_title(title: &str) -> Result<String, ValidationError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    Ok(title.to_string())
}

fn check_window(start: NaiveDate, end: Option<NaiveDate>) -> Result<(), ValidationError> {
    match end {
        Some(end) if end < start => Err(ValidationError::invalid_value(
            "end_date",
            format!("{end} is before start date {start}"),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    fn nine() -> NaiveTime {
        NaiveTime::from_hms_opt(9, 0, 0).unwrap()
    }

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn habit() -> Habit {
        Habit::create(1, "Read", RecurrenceRule::daily(), nine(), UserTimezone::utc(), now()).unwrap()
    }

    #[test]
    fn create_trims_title_and_starts_on_local_date() {
        let tz: UserTimezone = "-10:00".parse().unwrap();
        let h = Habit::create(7, "  Stretch ", RecurrenceRule::daily(), nine(), tz, now()).unwrap();
        assert_eq!(h.title(), "Stretch");
        assert_eq!(h.owner_id(), 7);
        assert_eq!(h.start_date(), d(4, 30));
        assert!(h.reminder().enabled);
        assert!(!h.is_archived());
    }

    #[test]
    fn create_rejects_empty_title() {
        let err = Habit::create(1, "   ", RecurrenceRule::daily(), nine(), UserTimezone::utc(), now())
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::EmptyTitle)));
    }

    #[test]
    fn create_rejects_invalid_rule() {
        let rule = RecurrenceRule::MonthlyByDay { day: 40 };
        let err = Habit::create(1, "Pay rent", rule, nine(), UserTimezone::utc(), now()).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::InvalidRule(_))));
    }

    #[test]
    fn dates_before_start_are_never_due() {
        let h = habit();
        assert!(!h.is_due_on(d(4, 30)).unwrap());
        assert!(h.is_due_on(d(5, 1)).unwrap());
    }

    #[test]
    fn end_date_bounds_the_window() {
        let h = habit().with_end_date(Some(d(5, 10))).unwrap();
        assert!(h.is_due_on(d(5, 10)).unwrap());
        assert!(!h.is_due_on(d(5, 11)).unwrap());
        assert!(habit().with_end_date(Some(d(4, 1))).is_err());
    }

    #[test]
    fn archived_habit_is_never_due_but_still_scheduled() {
        let mut h = habit();
        assert!(h.archive(now()));
        assert!(!h.archive(now()));
        assert!(!h.is_due_on(d(5, 2)).unwrap());
        assert!(h.is_scheduled_on(d(5, 2)).unwrap());
    }

    #[test]
    fn archived_habit_cannot_be_modified() {
        let mut h = habit();
        h.archive(now());
        assert!(matches!(h.rename("Other", now()), Err(CoreError::NotFound { .. })));
        let change = Reschedule {
            reminder_time: Some(nine()),
            ..Default::default()
        };
        assert!(matches!(h.reschedule(change, now()), Err(CoreError::NotFound { .. })));
    }

    #[test]
    fn reschedule_replaces_rule_and_time() {
        let mut h = habit();
        let later = now() + chrono::Duration::hours(1);
        h.reschedule(
            Reschedule {
                rule: Some(RecurrenceRule::weekly([0]).unwrap()),
                reminder_time: Some(NaiveTime::from_hms_opt(20, 30, 0).unwrap()),
                reminder_enabled: None,
            },
            later,
        )
        .unwrap();
        assert_eq!(h.rule(), &RecurrenceRule::weekly([0]).unwrap());
        assert_eq!(h.reminder().time, NaiveTime::from_hms_opt(20, 30, 0).unwrap());
        assert_eq!(h.updated_at(), later);
    }

    #[test]
    fn reschedule_rejects_invalid_rule_without_side_effects() {
        let mut h = habit();
        let change = Reschedule {
            rule: Some(RecurrenceRule::Weekly {
                days: Default::default(),
            }),
            reminder_time: Some(NaiveTime::from_hms_opt(6, 0, 0).unwrap()),
            reminder_enabled: None,
        };
        assert!(h.reschedule(change, now()).is_err());
        assert_eq!(h.reminder().time, nine());
        assert_eq!(h.rule(), &RecurrenceRule::Daily);
        assert!(h.reschedule(Reschedule::default(), now()).is_err());
    }

    #[test]
    fn next_due_respects_window() {
        let h = Habit::create(1, "Gym", RecurrenceRule::weekly([4]).unwrap(), nine(), UserTimezone::utc(), now())
            .unwrap()
            .with_end_date(Some(d(5, 5)))
            .unwrap();
        assert_eq!(h.next_due_on_or_after(d(4, 1)).unwrap(), Some(d(5, 3)));
        assert_eq!(h.next_due_on_or_after(d(5, 4)).unwrap(), None);
    }
}
