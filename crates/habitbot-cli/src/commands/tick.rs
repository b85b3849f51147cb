//! External trigger for the reminder scheduler.

use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Args;
use habitbot_core::{DueSetEvaluator, ReminderScheduler, SqliteRepository, TickReport};
use tracing::{info, warn};

use crate::context::{load_config, open_repository, CliResult, StdoutGateway};

#[derive(Args)]
pub struct TickArgs {
    /// Evaluate at this instant (RFC 3339) instead of now
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,
}

#[derive(Args)]
pub struct RunArgs {
    /// Seconds between ticks (default: scheduler.tick_interval_secs)
    #[arg(long)]
    pub interval: Option<u64>,
    /// Stop after this many ticks
    #[arg(long)]
    pub ticks: Option<u64>,
}

fn scheduler() -> CliResult<(ReminderScheduler<SqliteRepository, StdoutGateway>, u64)> {
    let config = load_config()?;
    let repository = open_repository(&config)?;
    let evaluator = DueSetEvaluator::with_policy(config.slot_policy());
    Ok((
        ReminderScheduler::with_evaluator(repository, StdoutGateway, evaluator),
        config.scheduler.tick_interval_secs,
    ))
}

fn report_to_stderr(report: &TickReport) -> CliResult {
    eprintln!("{}", serde_json::to_string(report)?);
    Ok(())
}

pub fn run_once(args: TickArgs) -> CliResult {
    let (mut scheduler, _) = scheduler()?;
    let report = scheduler.tick(args.at.unwrap_or_else(Utc::now))?;
    report_to_stderr(&report)
}

pub async fn run_loop(args: RunArgs) -> CliResult {
    let (mut scheduler, configured) = scheduler()?;
    let interval = args.interval.unwrap_or(configured).max(1);
    info!(interval_secs = interval, "reminder loop started");

    let mut ticker = tokio::time::interval(Duration::from_secs(interval));
    let mut done: u64 = 0;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping");
                break;
            }
        }

        // SQLite calls block; keep them off the async worker's budget.
        let result = tokio::task::block_in_place(|| scheduler.tick(Utc::now()));
        match result {
            Ok(report) if report.has_failures() => report_to_stderr(&report)?,
            Ok(_) => {}
            // Nothing was marked; the next tick retries.
            Err(e) => warn!(error = %e, "tick failed"),
        }

        done += 1;
        if args.ticks.is_some_and(|limit| done >= limit) {
            break;
        }
    }
    Ok(())
}
