//! Owner timezones.
//!
//! A timezone is either an IANA zone name (`Asia/Almaty`, `Europe/Berlin`)
//! or a fixed UTC offset. Conversion from an instant to the owner's local
//! calendar date happens here and nowhere else, so every rule and streak
//! computation downstream works on plain local dates.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Zone {
    Fixed(FixedOffset),
    Named(Tz),
}

/// Timezone of a habit owner.
///
/// Named zones follow daylight saving transitions. Fixed offsets are written
/// `+HH:MM` / `-HH:MM`; `UTC`, `Z`, `UTC+5` and `UTC-03:30` are accepted on
/// input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserTimezone {
    zone: Zone,
}

impl UserTimezone {
    pub fn utc() -> Self {
        Self {
            zone: Zone::Fixed(Utc.fix()),
        }
    }

    /// Build from an offset in minutes east of UTC.
    pub fn from_offset_minutes(minutes: i32) -> Result<Self, ValidationError> {
        FixedOffset::east_opt(minutes * 60)
            .map(|offset| Self {
                zone: Zone::Fixed(offset),
            })
            .ok_or_else(|| {
                ValidationError::invalid_value("timezone", format!("offset {minutes} min out of range"))
            })
    }

    /// Offset in minutes for fixed-offset zones. Named zones have none.
    pub fn offset_minutes(&self) -> Option<i32> {
        match self.zone {
            Zone::Fixed(offset) => Some(offset.local_minus_utc() / 60),
            Zone::Named(_) => None,
        }
    }

    /// Offset in effect at `now`, in minutes east of UTC.
    pub fn offset_minutes_at(&self, now: DateTime<Utc>) -> i32 {
        let offset = match self.zone {
            Zone::Fixed(offset) => offset,
            Zone::Named(tz) => now.with_timezone(&tz).offset().fix(),
        };
        offset.local_minus_utc() / 60
    }

    /// IANA name for named zones.
    pub fn name(&self) -> Option<&'static str> {
        match self.zone {
            Zone::Fixed(_) => None,
            Zone::Named(tz) => Some(tz.name()),
        }
    }

    /// Local wall-clock time at `now`.
    pub fn local_datetime(&self, now: DateTime<Utc>) -> NaiveDateTime {
        match self.zone {
            Zone::Fixed(offset) => now.with_timezone(&offset).naive_local(),
            Zone::Named(tz) => now.with_timezone(&tz).naive_local(),
        }
    }

    /// Local calendar date at `now`.
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        self.local_datetime(now).date()
    }

    /// Local time of day at `now`.
    pub fn local_time(&self, now: DateTime<Utc>) -> NaiveTime {
        self.local_datetime(now).time()
    }
}

impl Default for UserTimezone {
    fn default() -> Self {
        Self::utc()
    }
}

impl From<Tz> for UserTimezone {
    fn from(tz: Tz) -> Self {
        Self {
            zone: Zone::Named(tz),
        }
    }
}

impl fmt::Display for UserTimezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.zone {
            Zone::Named(tz) => f.write_str(tz.name()),
            Zone::Fixed(offset) => {
                let minutes = offset.local_minus_utc() / 60;
                let sign = if minutes < 0 { '-' } else { '+' };
                let abs = minutes.abs();
                write!(f, "{sign}{:02}:{:02}", abs / 60, abs % 60)
            }
        }
    }
}

/// Parse `+HH:MM`, `-HHMM`, `+H` and the `UTC`/`GMT` prefixed forms.
fn parse_fixed(raw: &str) -> Option<UserTimezone> {
    let upper = raw.to_ascii_uppercase();
    if upper.is_empty() || upper == "UTC" || upper == "Z" || upper == "GMT" {
        return Some(UserTimezone::utc());
    }
    let rest = upper
        .strip_prefix("UTC")
        .or_else(|| upper.strip_prefix("GMT"))
        .unwrap_or(&upper);

    let (sign, digits) = if let Some(digits) = rest.strip_prefix('+') {
        (1, digits)
    } else if let Some(digits) = rest.strip_prefix('-') {
        (-1, digits)
    } else {
        return None;
    };
    // Only ASCII digits and one separator; signed or multibyte parts are rejected.
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit() || b == b':') {
        return None;
    }

    let (hours, minutes) = if let Some((h, m)) = digits.split_once(':') {
        (h, m)
    } else if digits.len() == 4 {
        digits.split_at(2)
    } else {
        (digits, "0")
    };
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes >= 60 {
        return None;
    }
    UserTimezone::from_offset_minutes(sign * (hours * 60 + minutes)).ok()
}

impl FromStr for UserTimezone {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if let Some(tz) = parse_fixed(raw) {
            return Ok(tz);
        }
        raw.parse::<Tz>()
            .map(Self::from)
            .map_err(|_| ValidationError::invalid_value("timezone", format!("cannot parse '{raw}'")))
    }
}

impl TryFrom<String> for UserTimezone {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<UserTimezone> for String {
    fn from(tz: UserTimezone) -> Self {
        tz.to_string()
    }
}
