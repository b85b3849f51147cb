//! Statistics for habit completion.
//!
//! Summaries are computed from habits and their completion logs over a
//! [`Period`] relative to the owner's local date. Nothing here is stored.

mod period;
mod summary;

pub use period::{Period, ALL_TIME_DAYS};
pub use summary::{summarize, BestDay, HabitPeriodStats, PeriodSummary};
