//! Outbound side of the chat gateway.
//!
//! The core never formats chat protocol messages. It hands a
//! [`ReminderMessage`] to a [`ChatGateway`] and only cares whether the
//! gateway accepted it.

use std::collections::BTreeSet;
use std::sync::Mutex;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::DeliveryError;
use crate::habit::{Habit, HabitId, OwnerId};
use crate::streak::StreakSnapshot;

/// Reminder payload for one habit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderMessage {
    pub owner_id: OwnerId,
    pub habit_id: HabitId,
    pub habit_title: String,
    pub current_streak: u32,
    pub message: String,
}

impl ReminderMessage {
    pub fn for_habit(habit: &Habit, streak: &StreakSnapshot, date: NaiveDate) -> Self {
        let emoji = habit.emoji().unwrap_or("✅");
        let mut message = format!(
            "{emoji} Habit reminder\nToday {} is the day to do \"{}\"!",
            date.format("%d.%m.%Y"),
            habit.title()
        );
        if streak.current > 0 {
            message.push_str(&format!("\nCurrent streak: {}", streak.current));
        }
        Self {
            owner_id: habit.owner_id(),
            habit_id: habit.id().clone(),
            habit_title: habit.title().to_string(),
            current_streak: streak.current,
            message,
        }
    }
}

/// Anything that can deliver a reminder to an owner.
pub trait ChatGateway {
    /// Deliver `message`. `Ok` means the gateway accepted it.
    fn send_reminder(&self, message: &ReminderMessage) -> Result<(), DeliveryError>;
}

impl<T: ChatGateway + ?Sized> ChatGateway for &T {
    fn send_reminder(&self, message: &ReminderMessage) -> Result<(), DeliveryError> {
        (**self).send_reminder(message)
    }
}

impl<T: ChatGateway + ?Sized> ChatGateway for Box<T> {
    fn send_reminder(&self, message: &ReminderMessage) -> Result<(), DeliveryError> {
        (**self).send_reminder(message)
    }
}

/// Gateway that keeps delivered messages in memory.
///
/// Owners listed with [`MemoryGateway::fail_for`] get a
/// [`DeliveryError::Unavailable`] instead.
#[derive(Default)]
pub struct MemoryGateway {
    sent: Mutex<Vec<ReminderMessage>>,
    failing: Mutex<BTreeSet<OwnerId>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, owner_id: OwnerId) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(owner_id);
        }
    }

    pub fn recover(&self, owner_id: OwnerId) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.remove(&owner_id);
        }
    }

    /// Messages delivered so far.
    pub fn sent(&self) -> Vec<ReminderMessage> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

impl ChatGateway for MemoryGateway {
    fn send_reminder(&self, message: &ReminderMessage) -> Result<(), DeliveryError> {
        let failing = self
            .failing
            .lock()
            .map(|failing| failing.contains(&message.owner_id))
            .unwrap_or(false);
        if failing {
            return Err(DeliveryError::Unavailable(format!(
                "owner {} unreachable",
                message.owner_id
            )));
        }
        self.sent
            .lock()
            .map_err(|_| DeliveryError::Unavailable("gateway lock poisoned".into()))?
            .push(message.clone());
        Ok(())
    }
}
