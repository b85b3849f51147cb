//! Property tests for recurrence rules and streaks.

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDate};
use habitbot_core::habit::recurrence::{days_in_month, weekday_index};
use habitbot_core::streak;
use habitbot_core::{CompletionEvent, CompletionLog, HabitId, RecurrenceRule};
use proptest::prelude::*;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// 400 days spanning the 2024 leap day.
fn leap_window() -> impl Iterator<Item = NaiveDate> {
    let start = date(2023, 12, 1);
    (0..400).map(move |i| start + Duration::days(i))
}

fn arb_weekdays() -> impl Strategy<Value = BTreeSet<u8>> {
    prop::collection::btree_set(0u8..7, 1..=7)
}

#[test]
fn test_interval_rule_examples() {
    let rule = RecurrenceRule::interval_days(3, date(2024, 1, 1)).unwrap();
    for due in [date(2024, 1, 1), date(2024, 1, 4), date(2024, 1, 7)] {
        assert!(rule.is_due(due).unwrap(), "{due} should be due");
    }
    for not_due in [date(2024, 1, 2), date(2024, 1, 3), date(2023, 12, 29)] {
        assert!(!rule.is_due(not_due).unwrap(), "{not_due} should not be due");
    }
}

#[test]
fn test_monthly_31_clamps_to_month_end() {
    let rule = RecurrenceRule::monthly_by_day(31).unwrap();
    assert!(rule.is_due(date(2024, 2, 29)).unwrap());
    assert!(rule.is_due(date(2024, 4, 30)).unwrap());
    assert!(!rule.is_due(date(2024, 4, 29)).unwrap());
    assert!(rule.is_due(date(2023, 2, 28)).unwrap());
}

#[test]
fn test_invalid_rules_are_rejected() {
    assert!(RecurrenceRule::interval_days(0, date(2024, 1, 1)).is_err());
    assert!(RecurrenceRule::monthly_by_day(0).is_err());
    assert!(RecurrenceRule::monthly_by_day(32).is_err());
    assert!(RecurrenceRule::weekly(Vec::<u8>::new()).is_err());
    assert!(RecurrenceRule::weekly([7]).is_err());
}

#[test]
fn test_missed_day_breaks_current_streak() {
    let id = HabitId::from("h");
    let log = CompletionLog::from_events(
        id.clone(),
        [1, 2, 4, 5].map(|d| CompletionEvent::new(id.clone(), date(2024, 5, d))),
    );
    let snap = streak::compute(&RecurrenceRule::daily(), date(2024, 5, 1), &log, date(2024, 5, 5)).unwrap();
    assert_eq!(snap.current, 2);
    assert_eq!(snap.longest, 2);
    assert_eq!(snap.last_completed, Some(date(2024, 5, 5)));
}

proptest! {
    #[test]
    fn prop_weekly_matches_weekday(days in arb_weekdays()) {
        let rule = RecurrenceRule::weekly(days.iter().copied()).unwrap();
        for d in leap_window() {
            prop_assert_eq!(rule.is_due(d).unwrap(), days.contains(&weekday_index(d)));
        }
    }

    #[test]
    fn prop_interval_is_periodic(every in 1u32..60, offset in 0i64..400) {
        let anchor = date(2024, 1, 1);
        let rule = RecurrenceRule::interval_days(every, anchor).unwrap();
        let d = anchor + Duration::days(offset);
        prop_assert_eq!(rule.is_due(d).unwrap(), offset % i64::from(every) == 0);
        prop_assert!(!rule.is_due(anchor - Duration::days(offset + 1)).unwrap());
    }

    #[test]
    fn prop_monthly_fires_once_per_month(day in 1u32..=31) {
        let rule = RecurrenceRule::monthly_by_day(day).unwrap();
        for d in leap_window() {
            let expected = d.day() == day.min(days_in_month(d));
            prop_assert_eq!(rule.is_due(d).unwrap(), expected);
        }
    }

    #[test]
    fn prop_next_due_is_due_and_minimal(days in arb_weekdays(), offset in 0i64..400) {
        let rule = RecurrenceRule::weekly(days.iter().copied()).unwrap();
        let from = date(2023, 12, 1) + Duration::days(offset);
        let next = rule.next_due(from).unwrap().unwrap();
        prop_assert!(next >= from);
        prop_assert!(rule.is_due(next).unwrap());
        let mut d = from;
        while d < next {
            prop_assert!(!rule.is_due(d).unwrap());
            d += Duration::days(1);
        }
    }

    #[test]
    fn prop_streak_bounds(completed in prop::collection::btree_set(0i64..60, 0..60)) {
        let id = HabitId::from("h");
        let start = date(2024, 1, 1);
        let log = CompletionLog::from_events(
            id.clone(),
            completed.iter().map(|o| CompletionEvent::new(id.clone(), start + Duration::days(*o))),
        );
        let as_of = start + Duration::days(59);
        let snap = streak::compute(&RecurrenceRule::daily(), start, &log, as_of).unwrap();
        prop_assert!(snap.current <= snap.longest);
        prop_assert!(snap.longest as usize <= completed.len());
        prop_assert_eq!(snap.pending_today, !completed.contains(&59));
    }
}
