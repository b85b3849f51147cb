//! Reminder scheduler.
//!
//! Driven by an external tick. Each tick:
//! - loads active habits from the repository
//! - asks the [`DueSetEvaluator`] which ones are in their reminder slot
//! - drops habits already reminded or already completed on their local date
//! - hands one [`ReminderMessage`] per remaining habit to the gateway
//! - marks the habit reminded for that date once the gateway accepted it
//!
//! A failure on one habit is recorded in the [`TickReport`] and never stops
//! the rest of the tick. Undelivered reminders stay unmarked and are picked
//! up again by the next tick.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::due::DueSetEvaluator;
use crate::error::Result;
use crate::gateway::{ChatGateway, ReminderMessage};
use crate::habit::{CompletionLog, Habit, HabitId, OwnerId};
use crate::repository::{HabitRepository, MarkOutcome};

/// Where the scheduler is within a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Evaluating,
    Dispatched,
}

/// A reminder the scheduler decided to send on this tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderJob {
    pub habit_id: HabitId,
    pub owner_id: OwnerId,
    /// Date in the habit's timezone the reminder belongs to.
    pub local_date: NaiveDate,
    /// Reminder time-of-day in the habit's timezone.
    pub due_time: NaiveTime,
}

/// Step of the tick a habit failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Evaluate,
    Dedupe,
    LoadHistory,
    Deliver,
    Mark,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickFailure {
    pub habit_id: HabitId,
    pub stage: FailureStage,
    pub message: String,
}

/// Outcome of one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub now: Option<DateTime<Utc>>,
    /// Active habits looked at.
    pub evaluated: usize,
    /// Reminders accepted by the gateway, in dispatch order.
    pub jobs: Vec<ReminderJob>,
    /// Due habits skipped because an earlier tick already reminded them.
    pub already_reminded: usize,
    /// Due habits skipped because they were completed on their local date.
    pub skipped_completed: usize,
    pub failures: Vec<TickFailure>,
}

impl TickReport {
    pub fn dispatched(&self) -> usize {
        self.jobs.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    fn fail(&mut self, habit_id: &HabitId, stage: FailureStage, message: impl ToString) {
        let message = message.to_string();
        warn!(habit_id = %habit_id, ?stage, %message, "reminder step failed");
        self.failures.push(TickFailure {
            habit_id: habit_id.clone(),
            stage,
            message,
        });
    }
}

/// Periodic reminder driver over a repository and a chat gateway.
pub struct ReminderScheduler<R, G> {
    repository: R,
    gateway: G,
    evaluator: DueSetEvaluator,
    state: SchedulerState,
}

impl<R: HabitRepository, G: ChatGateway> ReminderScheduler<R, G> {
    pub fn new(repository: R, gateway: G) -> Self {
        Self::with_evaluator(repository, gateway, DueSetEvaluator::new())
    }

    pub fn with_evaluator(repository: R, gateway: G, evaluator: DueSetEvaluator) -> Self {
        Self {
            repository,
            gateway,
            evaluator,
            state: SchedulerState::Idle,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn evaluator(&self) -> &DueSetEvaluator {
        &self.evaluator
    }

    /// Run one tick at `now`.
    ///
    /// Fails only when the active habits cannot be loaded; every per-habit
    /// problem ends up in [`TickReport::failures`].
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<TickReport> {
        self.state = SchedulerState::Evaluating;
        let habits = match self.repository.get_active_habits(None) {
            Ok(habits) => habits,
            Err(e) => {
                self.state = SchedulerState::Idle;
                warn!(error = %e, "could not load active habits");
                return Err(e.into());
            }
        };

        let mut report = TickReport {
            now: Some(now),
            evaluated: habits.len(),
            ..Default::default()
        };

        let due = self.evaluator.due_at_reminder_slot(&habits, now);
        for failure in &due.failures {
            report.fail(&failure.habit_id, FailureStage::Evaluate, &failure.error);
        }

        let mut outgoing = Vec::new();
        for habit in habits.iter().filter(|h| due.contains(h.id())) {
            // Duplicate ids in one batch are collapsed by the due set.
            if outgoing
                .iter()
                .any(|(job, _): &(ReminderJob, ReminderMessage)| &job.habit_id == habit.id())
            {
                continue;
            }
            if let Some(prepared) = self.prepare(habit, now, &mut report) {
                outgoing.push(prepared);
            }
        }

        self.state = SchedulerState::Dispatched;
        for (job, message) in outgoing {
            self.dispatch(job, &message, &mut report);
        }

        self.state = SchedulerState::Idle;
        info!(
            evaluated = report.evaluated,
            dispatched = report.dispatched(),
            already_reminded = report.already_reminded,
            skipped_completed = report.skipped_completed,
            failures = report.failures.len(),
            "tick finished"
        );
        Ok(report)
    }

    /// Build the job and message for a due habit, or `None` when it should
    /// not be reminded on this tick.
    fn prepare(
        &self,
        habit: &Habit,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) -> Option<(ReminderJob, ReminderMessage)> {
        let local_date = habit.local_date(now);

        match self.repository.is_reminded(habit.id(), local_date) {
            Ok(true) => {
                debug!(habit_id = %habit.id(), %local_date, "already reminded");
                report.already_reminded += 1;
                return None;
            }
            Ok(false) => {}
            Err(e) => {
                report.fail(habit.id(), FailureStage::Dedupe, e);
                return None;
            }
        }

        let events = match self
            .repository
            .get_completions(habit.id(), habit.start_date()..=local_date)
        {
            Ok(events) => events,
            Err(e) => {
                report.fail(habit.id(), FailureStage::LoadHistory, e);
                return None;
            }
        };
        let log = CompletionLog::from_events(habit.id().clone(), events);
        if log.contains(local_date) {
            debug!(habit_id = %habit.id(), %local_date, "already completed today");
            report.skipped_completed += 1;
            return None;
        }

        let streak = match habit.streak(&log, local_date) {
            Ok(streak) => streak,
            Err(e) => {
                report.fail(habit.id(), FailureStage::Evaluate, e);
                return None;
            }
        };

        let job = ReminderJob {
            habit_id: habit.id().clone(),
            owner_id: habit.owner_id(),
            local_date,
            due_time: habit.reminder().time,
        };
        let message = ReminderMessage::for_habit(habit, &streak, local_date);
        Some((job, message))
    }

    fn dispatch(&self, job: ReminderJob, message: &ReminderMessage, report: &mut TickReport) {
        if let Err(e) = self.gateway.send_reminder(message) {
            report.fail(&job.habit_id, FailureStage::Deliver, e);
            return;
        }

        match self.repository.mark_reminded(&job.habit_id, job.local_date) {
            Ok(MarkOutcome::Marked) => {
                debug!(habit_id = %job.habit_id, local_date = %job.local_date, "reminder sent");
            }
            Ok(MarkOutcome::AlreadyMarked) => {
                warn!(
                    habit_id = %job.habit_id,
                    local_date = %job.local_date,
                    "reminder was marked by a concurrent tick"
                );
            }
            Err(e) => {
                // Delivered but unmarked: the next tick may send it again.
                report.fail(&job.habit_id, FailureStage::Mark, e);
                return;
            }
        }
        report.jobs.push(job);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryGateway;
    use crate::habit::{CompletionEvent, RecurrenceRule};
    use crate::repository::MemoryRepository;
    use chrono::TimeZone;

    fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, h, m, 0).unwrap()
    }

    fn make_habit(owner: OwnerId, title: &str, hour: u32) -> Habit {
        Habit::create(
            owner,
            title,
            RecurrenceRule::daily(),
            NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            "UTC".parse().unwrap(),
            at(1, 0, 0),
        )
        .unwrap()
    }

    fn scheduler_with(habits: &[Habit]) -> ReminderScheduler<MemoryRepository, MemoryGateway> {
        let repo = MemoryRepository::new();
        for h in habits {
            repo.save_habit(h).unwrap();
        }
        ReminderScheduler::new(repo, MemoryGateway::new())
    }

    #[test]
    fn test_tick_sends_due_reminder_once_per_day() {
        let habit = make_habit(1, "Read", 9);
        let mut scheduler = scheduler_with(&[habit.clone()]);

        let first = scheduler.tick(at(1, 9, 0)).unwrap();
        assert_eq!(first.dispatched(), 1);
        assert_eq!(first.jobs[0].habit_id, *habit.id());
        assert_eq!(first.jobs[0].local_date, at(1, 0, 0).date_naive());

        let second = scheduler.tick(at(1, 9, 1)).unwrap();
        assert_eq!(second.dispatched(), 0);
        assert_eq!(second.already_reminded, 1);
        assert_eq!(scheduler.gateway().sent().len(), 1);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[test]
    fn test_tick_before_reminder_time_sends_nothing() {
        let mut scheduler = scheduler_with(&[make_habit(1, "Read", 21)]);
        let report = scheduler.tick(at(1, 20, 59)).unwrap();
        assert_eq!(report.dispatched(), 0);
        assert_eq!(report.evaluated, 1);
    }

    #[test]
    fn test_completed_habit_is_not_reminded() {
        let habit = make_habit(1, "Read", 9);
        let mut scheduler = scheduler_with(&[habit.clone()]);
        scheduler
            .repository()
            .record_completion(&CompletionEvent::new(habit.id().clone(), at(1, 0, 0).date_naive()))
            .unwrap();

        let report = scheduler.tick(at(1, 10, 0)).unwrap();
        assert_eq!(report.dispatched(), 0);
        assert_eq!(report.skipped_completed, 1);
    }

    #[test]
    fn test_delivery_failure_is_retried_next_tick() {
        let failing = make_habit(1, "Read", 9);
        let other = make_habit(2, "Run", 9);
        let mut scheduler = scheduler_with(&[failing.clone(), other.clone()]);
        scheduler.gateway().fail_for(1);

        let report = scheduler.tick(at(1, 9, 0)).unwrap();
        assert_eq!(report.dispatched(), 1);
        assert_eq!(report.jobs[0].habit_id, *other.id());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].stage, FailureStage::Deliver);
        assert!(!scheduler
            .repository()
            .is_reminded(failing.id(), at(1, 0, 0).date_naive())
            .unwrap());

        scheduler.gateway().recover(1);
        let retry = scheduler.tick(at(1, 9, 1)).unwrap();
        assert_eq!(retry.dispatched(), 1);
        assert_eq!(retry.jobs[0].habit_id, *failing.id());
        assert_eq!(retry.already_reminded, 1);
    }

    #[test]
    fn test_message_carries_current_streak() {
        let habit = make_habit(1, "Read", 9);
        let mut scheduler = scheduler_with(&[habit.clone()]);
        for day in 1..=3 {
            scheduler
                .repository()
                .record_completion(&CompletionEvent::new(
                    habit.id().clone(),
                    at(day, 0, 0).date_naive(),
                ))
                .unwrap();
        }

        let report = scheduler.tick(at(4, 9, 0)).unwrap();
        assert_eq!(report.dispatched(), 1);
        let sent = scheduler.gateway().sent();
        assert_eq!(sent[0].current_streak, 3);
    }

    #[test]
    fn test_new_local_day_reminds_again() {
        let habit = make_habit(1, "Read", 9);
        let mut scheduler = scheduler_with(&[habit]);
        assert_eq!(scheduler.tick(at(1, 9, 0)).unwrap().dispatched(), 1);
        assert_eq!(scheduler.tick(at(2, 9, 0)).unwrap().dispatched(), 1);
        assert_eq!(scheduler.gateway().sent().len(), 2);
    }
}
