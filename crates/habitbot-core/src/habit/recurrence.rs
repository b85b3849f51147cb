//! Recurrence rules.
//!
//! A rule answers one question: is a given local calendar date a due date?
//! The answer depends only on the date and the rule's own parameters, never
//! on the clock, so rules can be evaluated for any past or future date.
//!
//! Weekdays are numbered Monday = 0 through Sunday = 6.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const WEEKDAY_NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// When a habit is due.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RecurrenceRule {
    /// Every day.
    #[default]
    Daily,
    /// On the listed weekdays (0 = Monday .. 6 = Sunday).
    Weekly { days: BTreeSet<u8> },
    /// Every `every` days counting from `anchor`.
    IntervalDays { every: u32, anchor: NaiveDate },
    /// Once a month on `day`, clamped to the last day of short months.
    MonthlyByDay { day: u32 },
}

impl RecurrenceRule {
    pub fn daily() -> Self {
        RecurrenceRule::Daily
    }

    pub fn weekly<I>(days: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = u8>,
    {
        let rule = RecurrenceRule::Weekly {
            days: days.into_iter().collect(),
        };
        rule.validate()?;
        Ok(rule)
    }

    pub fn interval_days(every: u32, anchor: NaiveDate) -> Result<Self, ValidationError> {
        let rule = RecurrenceRule::IntervalDays { every, anchor };
        rule.validate()?;
        Ok(rule)
    }

    pub fn monthly_by_day(day: u32) -> Result<Self, ValidationError> {
        let rule = RecurrenceRule::MonthlyByDay { day };
        rule.validate()?;
        Ok(rule)
    }

    /// Check the rule parameters.
    ///
    /// # Errors
    /// Returns [`ValidationError::InvalidRule`] when a parameter is out of range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            RecurrenceRule::Daily => Ok(()),
            RecurrenceRule::Weekly { days } => {
                if days.is_empty() {
                    return Err(ValidationError::InvalidRule(
                        "weekly rule needs at least one weekday".into(),
                    ));
                }
                if let Some(bad) = days.iter().find(|d| **d > 6) {
                    return Err(ValidationError::InvalidRule(format!(
                        "weekday {bad} is out of range 0-6"
                    )));
                }
                Ok(())
            }
            RecurrenceRule::IntervalDays { every, .. } => {
                if *every < 1 {
                    return Err(ValidationError::InvalidRule(
                        "interval must be at least 1 day".into(),
                    ));
                }
                Ok(())
            }
            RecurrenceRule::MonthlyByDay { day } => {
                if !(1..=31).contains(day) {
                    return Err(ValidationError::InvalidRule(format!(
                        "day of month {day} is out of range 1-31"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Whether `date` is a due date under this rule.
    ///
    /// # Errors
    /// Returns [`ValidationError::InvalidRule`] for a rule with out-of-range
    /// parameters (for example one loaded from a damaged record).
    pub fn is_due(&self, date: NaiveDate) -> Result<bool, ValidationError> {
        self.validate()?;
        Ok(self.matches(date))
    }

    /// Predicate for an already validated rule.
    fn matches(&self, date: NaiveDate) -> bool {
        match self {
            RecurrenceRule::Daily => true,
            RecurrenceRule::Weekly { days } => days.contains(&weekday_index(date)),
            RecurrenceRule::IntervalDays { every, anchor } => {
                if date < *anchor {
                    return false;
                }
                (date - *anchor).num_days() % i64::from(*every) == 0
            }
            RecurrenceRule::MonthlyByDay { day } => date.day() == effective_day(date, *day),
        }
    }

    /// Latest due date strictly before `before` and not earlier than `floor`.
    pub fn previous_due(
        &self,
        before: NaiveDate,
        floor: NaiveDate,
    ) -> Result<Option<NaiveDate>, ValidationError> {
        self.validate()?;
        let candidate = match self {
            RecurrenceRule::Daily => before.pred_opt(),
            RecurrenceRule::Weekly { .. } => (1..=7)
                .filter_map(|back| before.checked_sub_signed(Duration::days(back)))
                .find(|d| self.matches(*d)),
            RecurrenceRule::IntervalDays { every, anchor } => {
                if before <= *anchor {
                    None
                } else {
                    let every = i64::from(*every);
                    let steps = ((before - *anchor).num_days() - 1) / every;
                    anchor.checked_add_signed(Duration::days(steps * every))
                }
            }
            RecurrenceRule::MonthlyByDay { day } => {
                let this_month = with_effective_day(before, *day);
                if this_month.is_some_and(|d| d < before) {
                    this_month
                } else {
                    first_of_month(before)
                        .and_then(|first| first.pred_opt())
                        .and_then(|prev| with_effective_day(prev, *day))
                }
            }
        };
        Ok(candidate.filter(|d| *d >= floor))
    }

    /// Earliest due date on or after `from`.
    pub fn next_due(&self, from: NaiveDate) -> Result<Option<NaiveDate>, ValidationError> {
        self.validate()?;
        let candidate = match self {
            RecurrenceRule::Daily => Some(from),
            RecurrenceRule::Weekly { .. } => (0..7)
                .filter_map(|ahead| from.checked_add_signed(Duration::days(ahead)))
                .find(|d| self.matches(*d)),
            RecurrenceRule::IntervalDays { every, anchor } => {
                if from <= *anchor {
                    Some(*anchor)
                } else {
                    let every = i64::from(*every);
                    let elapsed = (from - *anchor).num_days();
                    let steps = (elapsed + every - 1) / every;
                    anchor.checked_add_signed(Duration::days(steps * every))
                }
            }
            RecurrenceRule::MonthlyByDay { day } => {
                let this_month = with_effective_day(from, *day);
                if this_month.is_some_and(|d| d >= from) {
                    this_month
                } else {
                    next_month_first(from).and_then(|next| with_effective_day(next, *day))
                }
            }
        };
        Ok(candidate)
    }

    /// All due dates in `start..=end`, ascending.
    pub fn due_dates(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>, ValidationError> {
        let mut dates = Vec::new();
        let mut cursor = start;
        while cursor <= end {
            match self.next_due(cursor)? {
                Some(due) if due <= end => {
                    dates.push(due);
                    match due.succ_opt() {
                        Some(next) => cursor = next,
                        None => break,
                    }
                }
                _ => break,
            }
        }
        Ok(dates)
    }

    /// Parse the compact form, filling in `default_anchor` for interval
    /// rules written without one (`every:3`).
    pub fn parse_with_anchor(
        s: &str,
        default_anchor: Option<NaiveDate>,
    ) -> Result<Self, ValidationError> {
        let raw = s.trim().to_ascii_lowercase();
        let (kind, args) = raw.split_once(':').unwrap_or((raw.as_str(), ""));
        let invalid = |msg: &str| ValidationError::InvalidRule(format!("'{s}': {msg}"));

        match kind {
            "daily" => Ok(RecurrenceRule::Daily),
            "weekly" => {
                let days = args
                    .split(',')
                    .filter(|part| !part.trim().is_empty())
                    .map(|part| parse_weekday(part.trim()).ok_or_else(|| invalid("unknown weekday")))
                    .collect::<Result<Vec<_>, _>>()?;
                RecurrenceRule::weekly(days)
            }
            "every" => {
                let (every, anchor) = match args.split_once('@') {
                    Some((every, anchor)) => {
                        let anchor = NaiveDate::parse_from_str(anchor.trim(), "%Y-%m-%d")
                            .map_err(|_| invalid("anchor must be YYYY-MM-DD"))?;
                        (every, Some(anchor))
                    }
                    None => (args, default_anchor),
                };
                let every: u32 = every.trim().parse().map_err(|_| invalid("interval must be a number"))?;
                let anchor = anchor.ok_or_else(|| invalid("interval rule needs an anchor date"))?;
                RecurrenceRule::interval_days(every, anchor)
            }
            "monthly" => {
                let day: u32 = args.trim().parse().map_err(|_| invalid("day must be a number"))?;
                RecurrenceRule::monthly_by_day(day)
            }
            _ => Err(invalid("expected daily, weekly:, every: or monthly:")),
        }
    }

    /// Compact form accepted by [`FromStr`].
    pub fn to_compact(&self) -> String {
        match self {
            RecurrenceRule::Daily => "daily".to_string(),
            RecurrenceRule::Weekly { days } => {
                let list: Vec<String> = days.iter().map(|d| d.to_string()).collect();
                format!("weekly:{}", list.join(","))
            }
            RecurrenceRule::IntervalDays { every, anchor } => {
                format!("every:{every}@{}", anchor.format("%Y-%m-%d"))
            }
            RecurrenceRule::MonthlyByDay { day } => format!("monthly:{day}"),
        }
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecurrenceRule::Daily => write!(f, "every day"),
            RecurrenceRule::Weekly { days } => {
                let names: Vec<&str> = days
                    .iter()
                    .filter_map(|d| WEEKDAY_NAMES.get(usize::from(*d)).copied())
                    .collect();
                write!(f, "weekly on {}", names.join(", "))
            }
            RecurrenceRule::IntervalDays { every: 1, anchor } => {
                write!(f, "every day from {}", anchor.format("%Y-%m-%d"))
            }
            RecurrenceRule::IntervalDays { every, anchor } => {
                write!(f, "every {every} days from {}", anchor.format("%Y-%m-%d"))
            }
            RecurrenceRule::MonthlyByDay { day } => write!(f, "monthly on day {day}"),
        }
    }
}

impl FromStr for RecurrenceRule {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_with_anchor(s, None)
    }
}

/// Monday = 0 .. Sunday = 6.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_monday() as u8
}

/// Number of days in the month containing `date`.
pub fn days_in_month(date: NaiveDate) -> u32 {
    next_month_first(date)
        .and_then(|next| next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(31)
}

fn effective_day(date: NaiveDate, day: u32) -> u32 {
    day.min(days_in_month(date))
}

fn with_effective_day(date: NaiveDate, day: u32) -> Option<NaiveDate> {
    date.with_day(effective_day(date, day))
}

fn first_of_month(date: NaiveDate) -> Option<NaiveDate> {
    date.with_day(1)
}

fn next_month_first(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}

fn parse_weekday(s: &str) -> Option<u8> {
    if let Ok(n) = s.parse::<u8>() {
        return Some(n);
    }
    WEEKDAY_NAMES
        .iter()
        .position(|name| s.get(..3).is_some_and(|prefix| name.eq_ignore_ascii_case(prefix)))
        .map(|idx| idx as u8)
}
