//! Habit management commands for CLI.

use chrono::{NaiveDate, Utc};
use clap::Subcommand;
use habitbot_core::storage::parse_reminder_time;
use habitbot_core::{HabitId, NewHabit, RecurrenceRule, Reschedule, UserTimezone};

use crate::context::{open_service, print_json, CliResult};

#[derive(Subcommand)]
pub enum HabitAction {
    /// Create a new habit
    Create {
        /// Habit title
        title: String,
        /// Recurrence: daily, weekly:0,2,4, every:3[@YYYY-MM-DD], monthly:15
        #[arg(long, default_value = "daily")]
        rule: String,
        /// Reminder time HH:MM (default: owner setting)
        #[arg(long)]
        time: Option<String>,
        /// IANA zone (Asia/Almaty) or UTC offset (+05:00) (default: owner setting)
        #[arg(long)]
        tz: Option<String>,
        #[arg(long)]
        emoji: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
        /// First due date YYYY-MM-DD (default: today)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last due date YYYY-MM-DD
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// List habits
    List {
        /// Include archived habits
        #[arg(long)]
        all: bool,
    },
    /// Habits due today
    Due,
    /// Rename a habit
    Rename {
        /// Habit ID
        id: String,
        /// New title
        title: String,
    },
    /// Change recurrence or reminder
    Reschedule {
        /// Habit ID
        id: String,
        #[arg(long)]
        rule: Option<String>,
        /// New reminder time HH:MM
        #[arg(long)]
        time: Option<String>,
        /// Turn reminders on or off
        #[arg(long)]
        reminders: Option<bool>,
    },
    /// Archive a habit
    Archive {
        /// Habit ID
        id: String,
    },
    /// Mark a habit done
    Done {
        /// Habit ID
        id: String,
        /// Date YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        note: Option<String>,
    },
    /// Show the current streak
    Streak {
        /// Habit ID
        id: String,
    },
}

fn parse_time(value: &str) -> CliResult<chrono::NaiveTime> {
    parse_reminder_time(value).ok_or_else(|| format!("invalid time '{value}', expected HH:MM").into())
}

pub fn run(owner: i64, action: HabitAction) -> CliResult {
    let service = open_service()?;
    let now = Utc::now();

    match action {
        HabitAction::Create {
            title,
            rule,
            time,
            tz,
            emoji,
            description,
            start,
            end,
        } => {
            let timezone = tz.as_deref().map(str::parse::<UserTimezone>).transpose()?;
            let anchor_tz = match timezone {
                Some(tz) => tz,
                None => service.owner_settings(owner, now)?.timezone,
            };
            let anchor = start.unwrap_or_else(|| anchor_tz.local_date(now));
            let new = NewHabit {
                title,
                rule: RecurrenceRule::parse_with_anchor(&rule, Some(anchor))?,
                reminder_time: time.as_deref().map(parse_time).transpose()?,
                timezone,
                emoji,
                description,
                start_date: start,
                end_date: end,
            };
            print_json(&service.create_habit(owner, new, now)?)?;
        }
        HabitAction::List { all } => {
            print_json(&service.list_habits(owner, all)?)?;
        }
        HabitAction::Due => {
            print_json(&service.due_today(owner, now)?)?;
        }
        HabitAction::Rename { id, title } => {
            print_json(&service.rename_habit(owner, &HabitId::from(id), &title, now)?)?;
        }
        HabitAction::Reschedule {
            id,
            rule,
            time,
            reminders,
        } => {
            let habit_id = HabitId::from(id);
            let rule = match rule {
                Some(rule) => {
                    let tz = service.owner_settings(owner, now)?.timezone;
                    Some(RecurrenceRule::parse_with_anchor(&rule, Some(tz.local_date(now)))?)
                }
                None => None,
            };
            let change = Reschedule {
                rule,
                reminder_time: time.as_deref().map(parse_time).transpose()?,
                reminder_enabled: reminders,
            };
            print_json(&service.reschedule_habit(owner, &habit_id, change, now)?)?;
        }
        HabitAction::Archive { id } => {
            print_json(&service.archive_habit(owner, &HabitId::from(id), now)?)?;
        }
        HabitAction::Done { id, date, note } => {
            print_json(&service.complete_habit(owner, &HabitId::from(id), date, note, now)?)?;
        }
        HabitAction::Streak { id } => {
            print_json(&service.habit_streak(owner, &HabitId::from(id), now)?)?;
        }
    }
    Ok(())
}
