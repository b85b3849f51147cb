//! Per-period completion summary.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::Period;
use crate::error::ValidationError;
use crate::habit::{CompletionLog, Habit, HabitId};
use crate::timezone::UserTimezone;

/// Counts for one habit over a period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitPeriodStats {
    pub habit_id: HabitId,
    pub title: String,
    /// Due dates inside the period and the habit's own window
    pub due: u32,
    /// Completions recorded inside the period
    pub completed: u32,
    /// Completed due dates divided by due dates (0.0 when nothing was due)
    pub completion_rate: f64,
}

/// Date with the most completions in a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestDay {
    pub date: NaiveDate,
    pub completed: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub period: Period,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub habits: Vec<HabitPeriodStats>,
    pub total_completed: u32,
    pub best_day: Option<BestDay>,
}

impl PeriodSummary {
    /// Overall completion rate across all habits.
    pub fn completion_rate(&self) -> f64 {
        let due: u32 = self.habits.iter().map(|h| h.due).sum();
        if due == 0 {
            return 0.0;
        }
        let done: f64 = self
            .habits
            .iter()
            .map(|h| h.completion_rate * f64::from(h.due))
            .sum();
        done / f64::from(due)
    }
}

/// Summarize `habits` over `period` ending at `now`.
///
/// The reported range is the owner's local period in `timezone`. Each habit
/// is counted over the same period ending at its own local today, so a
/// habit in another timezone is not cut off a day early or late.
/// Archived habits are included; their history still counts.
///
/// # Errors
/// Returns the first invalid stored rule encountered.
pub fn summarize(
    habits: &[(Habit, CompletionLog)],
    period: Period,
    now: DateTime<Utc>,
    timezone: UserTimezone,
) -> Result<PeriodSummary, ValidationError> {
    let owner_range = period.resolve(timezone.local_date(now));
    let (start, end) = (*owner_range.start(), *owner_range.end());

    let mut per_day: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    let mut stats = Vec::with_capacity(habits.len());

    for (habit, log) in habits {
        let range = period.resolve(habit.local_date(now));
        let lo = (*range.start()).max(habit.start_date());
        let hi = habit.end_date().map_or(*range.end(), |e| e.min(*range.end()));
        let due_dates = if lo <= hi {
            habit.rule().due_dates(lo, hi)?
        } else {
            Vec::new()
        };

        let mut completed = 0u32;
        for event in log.in_range(range.clone()) {
            completed += 1;
            *per_day.entry(event.date).or_default() += 1;
        }
        let completed_due = due_dates.iter().filter(|d| log.contains(**d)).count() as u32;
        let due = due_dates.len() as u32;

        stats.push(HabitPeriodStats {
            habit_id: habit.id().clone(),
            title: habit.title().to_string(),
            due,
            completed,
            completion_rate: if due == 0 {
                0.0
            } else {
                f64::from(completed_due) / f64::from(due)
            },
        });
    }

    // Ascending date order plus strict `>` keeps the earliest date on ties.
    let mut best_day: Option<BestDay> = None;
    for (date, completed) in per_day.iter() {
        if best_day.map_or(true, |best| *completed > best.completed) {
            best_day = Some(BestDay {
                date: *date,
                completed: *completed,
            });
        }
    }

    Ok(PeriodSummary {
        period,
        start,
        end,
        total_completed: stats.iter().map(|s| s.completed).sum(),
        habits: stats,
        best_day,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::habit::{CompletionEvent, RecurrenceRule};
    use chrono::{NaiveTime, TimeZone};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    /// Noon UTC on 2024-05-`day`.
    fn noon(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap()
    }

    fn habit_in(title: &str, rule: RecurrenceRule, tz: &str) -> Habit {
        Habit::create(
            1,
            title,
            rule,
            NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
            tz.parse().unwrap(),
            Utc.with_ymd_and_hms(2024, 4, 30, 0, 0, 0).unwrap(),
        )
        .unwrap()
        .with_start_date(d(1))
        .unwrap()
    }

    fn habit(title: &str, rule: RecurrenceRule) -> Habit {
        habit_in(title, rule, "UTC")
    }

    fn log_for(habit: &Habit, days: &[u32]) -> CompletionLog {
        CompletionLog::from_events(
            habit.id().clone(),
            days.iter().map(|day| CompletionEvent::new(habit.id().clone(), d(*day))),
        )
    }

    #[test]
    fn test_week_summary_counts_due_and_completed() {
        let read = habit("Read", RecurrenceRule::daily());
        let read_log = log_for(&read, &[1, 2, 4]);
        let summary = summarize(&[(read, read_log)], Period::Week, noon(7), UserTimezone::utc()).unwrap();

        assert_eq!(summary.start, d(1));
        assert_eq!(summary.habits[0].due, 7);
        assert_eq!(summary.habits[0].completed, 3);
        assert!((summary.habits[0].completion_rate - 3.0 / 7.0).abs() < 1e-9);
        assert_eq!(summary.total_completed, 3);
    }

    #[test]
    fn test_due_count_respects_start_date() {
        // Habit starts 05-01, week ending 05-03 covers 04-27..05-03.
        let read = habit("Read", RecurrenceRule::daily());
        let log = log_for(&read, &[]);
        let summary = summarize(&[(read, log)], Period::Week, noon(3), UserTimezone::utc()).unwrap();
        assert_eq!(summary.habits[0].due, 3);
        assert_eq!(summary.habits[0].completion_rate, 0.0);
        assert_eq!(summary.best_day, None);
    }

    #[test]
    fn test_best_day_prefers_earliest_on_tie() {
        let a = habit("A", RecurrenceRule::daily());
        let b = habit("B", RecurrenceRule::daily());
        let a_log = log_for(&a, &[2, 5]);
        let b_log = log_for(&b, &[2, 5, 6]);
        let summary = summarize(&[(a, a_log), (b, b_log)], Period::Month, noon(10), UserTimezone::utc()).unwrap();
        assert_eq!(
            summary.best_day,
            Some(BestDay {
                date: d(2),
                completed: 2
            })
        );
        assert_eq!(summary.total_completed, 5);
    }

    #[test]
    fn test_completions_on_non_due_days_do_not_raise_rate() {
        // Weekly on Wednesday; 2024-05-01 and 05-08 are Wednesdays.
        let gym = habit("Gym", RecurrenceRule::weekly([2]).unwrap());
        let log = log_for(&gym, &[1, 2]);
        let summary = summarize(&[(gym, log)], Period::Week, noon(7), UserTimezone::utc()).unwrap();
        assert_eq!(summary.habits[0].due, 1);
        assert_eq!(summary.habits[0].completed, 2);
        assert_eq!(summary.habits[0].completion_rate, 1.0);
    }

    #[test]
    fn test_each_habit_uses_its_own_local_today() {
        // 20:00 UTC on 05-07 is already 05-08 at +05:00.
        let now = Utc.with_ymd_and_hms(2024, 5, 7, 20, 0, 0).unwrap();
        let east = habit_in("East", RecurrenceRule::daily(), "+05:00");
        let log = log_for(&east, &[8]);
        let summary = summarize(&[(east, log)], Period::Day, now, UserTimezone::utc()).unwrap();

        assert_eq!((summary.start, summary.end), (d(7), d(7)));
        assert_eq!(summary.habits[0].due, 1);
        assert_eq!(summary.habits[0].completed, 1);
        assert_eq!(summary.habits[0].completion_rate, 1.0);
    }
}
