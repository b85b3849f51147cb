//! Completion history.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::HabitId;

/// A habit marked done on a local calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub habit_id: HabitId,
    pub date: NaiveDate,
    #[serde(default)]
    pub note: Option<String>,
}

impl CompletionEvent {
    pub fn new(habit_id: HabitId, date: NaiveDate) -> Self {
        Self {
            habit_id,
            date,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        let note = note.into();
        self.note = if note.trim().is_empty() { None } else { Some(note) };
        self
    }
}

/// Date-ordered completion history of one habit.
///
/// At most one event per date: recording a date that is already present
/// keeps the first event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionLog {
    habit_id: HabitId,
    events: BTreeMap<NaiveDate, CompletionEvent>,
}

impl CompletionLog {
    pub fn new(habit_id: HabitId) -> Self {
        Self {
            habit_id,
            events: BTreeMap::new(),
        }
    }

    /// Build from stored events; events of other habits are ignored.
    pub fn from_events<I>(habit_id: HabitId, events: I) -> Self
    where
        I: IntoIterator<Item = CompletionEvent>,
    {
        let mut log = Self::new(habit_id);
        for event in events {
            log.record(event);
        }
        log
    }

    pub fn habit_id(&self) -> &HabitId {
        &self.habit_id
    }

    /// Append an event. Returns `false` when the date was already recorded
    /// or the event belongs to another habit.
    pub fn record(&mut self, event: CompletionEvent) -> bool {
        if event.habit_id != self.habit_id || self.events.contains_key(&event.date) {
            return false;
        }
        self.events.insert(event.date, event);
        true
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.events.contains_key(&date)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events in ascending date order.
    pub fn events(&self) -> impl Iterator<Item = &CompletionEvent> {
        self.events.values()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.events.keys().copied()
    }

    /// Events with dates in `range`. An inverted range yields nothing.
    pub fn in_range(&self, range: RangeInclusive<NaiveDate>) -> impl Iterator<Item = &CompletionEvent> {
        let (start, end) = range.into_inner();
        self.events
            .range(start..)
            .take_while(move |(date, _)| **date <= end)
            .map(|(_, event)| event)
    }

    /// Most recent completion on or before `date`.
    pub fn last_on_or_before(&self, date: NaiveDate) -> Option<NaiveDate> {
        self.events.range(..=date).next_back().map(|(d, _)| *d)
    }
}
