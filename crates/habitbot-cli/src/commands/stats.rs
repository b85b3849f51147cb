use chrono::Utc;
use clap::Args;
use habitbot_core::Period;

use crate::context::{open_service, print_json, CliResult};

#[derive(Args)]
pub struct StatsArgs {
    /// day, week, month, year or all
    #[arg(long, default_value = "week")]
    pub period: Period,
}

pub fn run(owner: i64, args: StatsArgs) -> CliResult {
    let service = open_service()?;
    let summary = service.period_summary(owner, args.period, Utc::now())?;
    print_json(&summary)
}
