//! Reporting periods.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Days covered by [`Period::All`].
pub const ALL_TIME_DAYS: i64 = 5 * 365;

/// A date range a summary is computed over, relative to a local "today".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    /// Today only
    Day,
    /// Last 7 days including today
    #[default]
    Week,
    /// Since the 1st of the current month
    Month,
    /// Since January 1st
    Year,
    /// Last five years
    All,
}

impl Period {
    /// Inclusive date range ending at `today`.
    pub fn resolve(self, today: NaiveDate) -> RangeInclusive<NaiveDate> {
        let start = match self {
            Period::Day => today,
            Period::Week => today - Duration::days(6),
            Period::Month => today.with_day(1).unwrap_or(today),
            Period::Year => today.with_ordinal(1).unwrap_or(today),
            Period::All => today - Duration::days(ALL_TIME_DAYS),
        };
        start..=today
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
            Period::Year => "year",
            Period::All => "all",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" | "today" => Ok(Period::Day),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            "year" => Ok(Period::Year),
            "all" => Ok(Period::All),
            other => Err(ValidationError::invalid_value(
                "period",
                format!("unknown period '{other}' (expected day, week, month, year or all)"),
            )),
        }
    }
}
