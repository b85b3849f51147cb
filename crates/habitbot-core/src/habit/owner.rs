//! Per-owner preferences.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::OwnerId;
use crate::timezone::UserTimezone;

/// Defaults applied to habits an owner creates. Each habit keeps its own
/// copy of the timezone, so changing these does not move existing habits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerSettings {
    pub owner_id: OwnerId,
    pub timezone: UserTimezone,
    pub default_reminder_time: NaiveTime,
    pub updated_at: DateTime<Utc>,
}

impl OwnerSettings {
    pub fn new(
        owner_id: OwnerId,
        timezone: UserTimezone,
        default_reminder_time: NaiveTime,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            owner_id,
            timezone,
            default_reminder_time,
            updated_at: now,
        }
    }
}
