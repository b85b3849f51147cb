//! Streak calculation.
//!
//! A streak is a run of consecutive *due* dates that each have a
//! completion. Dates on which the rule does not fire are skipped, so a
//! Monday/Wednesday habit completed every Monday and Wednesday keeps its
//! streak across the days in between.
//!
//! The `as_of` date is treated as "today": if it is due and not yet
//! completed, it is reported as pending and does not break the streak.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::habit::{CompletionLog, RecurrenceRule};

/// Derived streak statistics. Never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakSnapshot {
    /// Completed due dates in a row ending at the latest settled due date.
    pub current: u32,
    /// Longest run over the whole history.
    pub longest: u32,
    /// Most recent completion on or before `as_of`.
    pub last_completed: Option<NaiveDate>,
    /// `as_of` is due and still open.
    pub pending_today: bool,
}

/// Streak over a habit that started on `start` and has no end date.
///
/// # Errors
/// Returns [`ValidationError::InvalidRule`] if the rule is invalid.
pub fn compute(
    rule: &RecurrenceRule,
    start: NaiveDate,
    completions: &CompletionLog,
    as_of: NaiveDate,
) -> Result<StreakSnapshot, ValidationError> {
    compute_window(rule, start, None, completions, as_of)
}

/// Streak over the due dates in `start..=min(as_of, end)`.
///
/// Runs a single forward pass over the due dates, so the cost is linear in
/// the number of due dates since `start`.
pub fn compute_window(
    rule: &RecurrenceRule,
    start: NaiveDate,
    end: Option<NaiveDate>,
    completions: &CompletionLog,
    as_of: NaiveDate,
) -> Result<StreakSnapshot, ValidationError> {
    rule.validate()?;

    let mut snapshot = StreakSnapshot {
        last_completed: completions.last_on_or_before(as_of),
        ..StreakSnapshot::default()
    };

    let last = end.map_or(as_of, |end| end.min(as_of));
    if last < start {
        return Ok(snapshot);
    }

    let mut run: u32 = 0;
    for date in rule.due_dates(start, last)? {
        if completions.contains(date) {
            run += 1;
            snapshot.longest = snapshot.longest.max(run);
        } else if date == as_of {
            snapshot.pending_today = true;
        } else {
            run = 0;
        }
    }
    snapshot.current = run;

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::habit::{CompletionEvent, HabitId};

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn log(dates: &[NaiveDate]) -> CompletionLog {
        let id = HabitId::from("h");
        CompletionLog::from_events(
            id.clone(),
            dates.iter().map(|date| CompletionEvent::new(id.clone(), *date)),
        )
    }

    #[test]
    fn gap_breaks_current_streak() {
        let completions = log(&[d(5, 1), d(5, 2), d(5, 4), d(5, 5)]);
        let snap = compute(&RecurrenceRule::daily(), d(5, 1), &completions, d(5, 5)).unwrap();
        assert_eq!(snap.current, 2);
        assert_eq!(snap.longest, 2);
        assert_eq!(snap.last_completed, Some(d(5, 5)));
        assert!(!snap.pending_today);
    }

    #[test]
    fn today_open_is_pending_not_broken() {
        let completions = log(&[d(5, 1), d(5, 2), d(5, 3)]);
        let snap = compute(&RecurrenceRule::daily(), d(5, 1), &completions, d(5, 4)).unwrap();
        assert_eq!(snap.current, 3);
        assert!(snap.pending_today);
    }

    #[test]
    fn yesterday_missed_breaks_streak() {
        let completions = log(&[d(5, 1), d(5, 2)]);
        let snap = compute(&RecurrenceRule::daily(), d(5, 1), &completions, d(5, 4)).unwrap();
        assert_eq!(snap.current, 0);
        assert_eq!(snap.longest, 2);
        assert!(snap.pending_today);
    }

    #[test]
    fn non_due_dates_are_skipped() {
        // Mon/Wed/Fri starting Monday 2024-05-06.
        let rule = RecurrenceRule::weekly([0, 2, 4]).unwrap();
        let completions = log(&[d(5, 6), d(5, 8), d(5, 10), d(5, 13)]);
        let snap = compute(&rule, d(5, 6), &completions, d(5, 14)).unwrap();
        assert_eq!(snap.current, 4);
        assert_eq!(snap.longest, 4);
        assert!(!snap.pending_today);
    }

    #[test]
    fn completions_on_non_due_dates_do_not_count() {
        let rule = RecurrenceRule::interval_days(2, d(5, 1)).unwrap();
        let completions = log(&[d(5, 1), d(5, 2), d(5, 4)]);
        let snap = compute(&rule, d(5, 1), &completions, d(5, 5)).unwrap();
        // Due 1, 3, 5: 1 done, 3 missed, 5 pending.
        assert_eq!(snap.current, 0);
        assert_eq!(snap.longest, 1);
        assert!(snap.pending_today);
        assert_eq!(snap.last_completed, Some(d(5, 4)));
    }

    #[test]
    fn longest_survives_later_break() {
        let completions = log(&[d(5, 1), d(5, 2), d(5, 3), d(5, 4), d(5, 6)]);
        let snap = compute(&RecurrenceRule::daily(), d(5, 1), &completions, d(5, 6)).unwrap();
        assert_eq!(snap.current, 1);
        assert_eq!(snap.longest, 4);
    }

    #[test]
    fn as_of_before_start_is_empty() {
        let snap = compute(&RecurrenceRule::daily(), d(5, 10), &log(&[]), d(5, 1)).unwrap();
        assert_eq!(snap, StreakSnapshot::default());
    }

    #[test]
    fn ended_habit_has_no_pending_day() {
        let completions = log(&[d(5, 1), d(5, 2)]);
        let snap =
            compute_window(&RecurrenceRule::daily(), d(5, 1), Some(d(5, 3)), &completions, d(5, 9)).unwrap();
        assert_eq!(snap.current, 0);
        assert_eq!(snap.longest, 2);
        assert!(!snap.pending_today);
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let completions = log(&[d(5, 1), d(5, 3)]);
        let a = compute(&RecurrenceRule::daily(), d(5, 1), &completions, d(5, 3)).unwrap();
        let b = compute(&RecurrenceRule::daily(), d(5, 1), &completions, d(5, 3)).unwrap();
        assert_eq!(a, b);
    }
}
