use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod context;

#[derive(Parser)]
#[command(name = "habitbot", version, about = "Habit reminders and streaks")]
struct Cli {
    /// Chat user id to act as
    #[arg(long, global = true, env = "HABITBOT_OWNER", default_value_t = 0)]
    owner: i64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Habit management
    Habit {
        #[command(subcommand)]
        action: commands::habit::HabitAction,
    },
    /// Owner settings
    Owner {
        #[command(subcommand)]
        action: commands::owner::OwnerAction,
    },
    /// Completion statistics
    Stats(commands::stats::StatsArgs),
    /// Run one reminder tick and print reminders as JSON lines
    Tick(commands::tick::TickArgs),
    /// Run reminder ticks on an interval
    Run(commands::tick::RunArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let owner = cli.owner;
    let result = match cli.command {
        Commands::Habit { action } => commands::habit::run(owner, action),
        Commands::Owner { action } => commands::owner::run(owner, action),
        Commands::Stats(args) => commands::stats::run(owner, args),
        Commands::Tick(args) => commands::tick::run_once(args),
        Commands::Run(args) => commands::tick::run_loop(args).await,
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
