use chrono::{DateTime, FixedOffset};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "coachroom-cli", version, about = "Coachroom CLI")]
struct Cli {
    /// Pin the clock to an RFC 3339 instant (e.g. 2026-01-12T18:30:00+01:00)
    #[arg(long, global = true)]
    at: Option<DateTime<FixedOffset>>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record an app foreground event
    Open,
    /// Coaching messages
    Message {
        #[command(subcommand)]
        action: commands::message::MessageAction,
    },
    /// Push notification gate
    Push {
        #[command(subcommand)]
        action: commands::push::PushAction,
    },
    /// Show the engagement and cooldown ledger
    Ledger {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Delete the persisted ledger and message set
    Reset,
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("COACHROOM_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Open => commands::push::open(cli.at).await,
        Commands::Message { action } => commands::message::run(action, cli.at).await,
        Commands::Push { action } => commands::push::run(action, cli.at).await,
        Commands::Ledger { json } => commands::push::show_ledger(json, cli.at).await,
        Commands::Config { action } => commands::config::run(action),
        Commands::Reset => commands::reset().await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
