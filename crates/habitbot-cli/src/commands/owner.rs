use chrono::Utc;
use clap::Subcommand;
use habitbot_core::storage::parse_reminder_time;
use habitbot_core::UserTimezone;

use crate::context::{open_service, print_json, CliResult};

#[derive(Subcommand)]
pub enum OwnerAction {
    /// Show the owner's settings
    Show,
    /// Change timezone and/or default reminder time
    Set {
        /// IANA zone (Asia/Almaty) or UTC offset (+05:00)
        #[arg(long)]
        tz: Option<UserTimezone>,
        /// Default reminder time HH:MM
        #[arg(long)]
        time: Option<String>,
    },
}

pub fn run(owner: i64, action: OwnerAction) -> CliResult {
    let service = open_service()?;
    let now = Utc::now();

    match action {
        OwnerAction::Show => print_json(&service.owner_settings(owner, now)?),
        OwnerAction::Set { tz, time } => {
            let time = match time {
                Some(value) => Some(
                    parse_reminder_time(&value).ok_or_else(|| format!("invalid time '{value}', expected HH:MM"))?,
                ),
                None => None,
            };
            print_json(&service.update_owner_settings(owner, tz, time, now)?)
        }
    }
}
