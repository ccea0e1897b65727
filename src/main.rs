use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hn_triage::config::Config;
use hn_triage::hn::HnClient;
use hn_triage::pipeline::{Pipeline, RunOptions};
use hn_triage::report;
use hn_triage::store::{OverrideResolution, SqliteStore, Store};

/// Deterministic triage pipeline for the Hacker News feed.
#[derive(Parser)]
#[command(name = "hn-triage", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize the database schema.
    Init,
    /// Run one ingestion + scoring pass.
    Run {
        /// Number of ranked items to ingest.
        #[arg(long)]
        count: Option<usize>,
        /// Execute every stage but write nothing.
        #[arg(long)]
        dry_run: bool,
    },
    /// Print all records for one week as JSON for the brief renderer.
    Brief {
        /// Week designator (YYYY-W##, default: current week).
        #[arg(long)]
        week: Option<String>,
    },
    /// Resolve a pending override decision.
    Resolve {
        /// Decision row id.
        #[arg(long)]
        decision: i64,
        /// Terminal resolution to apply.
        #[arg(long = "as", value_enum)]
        resolution: Resolution,
        /// Operator identifier recorded with the resolution.
        #[arg(long)]
        operator: String,
    },
    /// List unresolved override decisions.
    Pending,
    /// Display the database schema.
    Schema,
}

#[derive(Clone, Copy, ValueEnum)]
enum Resolution {
    Accepted,
    Rejected,
    Escalated,
}

impl From<Resolution> for OverrideResolution {
    fn from(resolution: Resolution) -> Self {
        match resolution {
            Resolution::Accepted => OverrideResolution::Accepted,
            Resolution::Rejected => OverrideResolution::Rejected,
            Resolution::Escalated => OverrideResolution::Escalated,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    match cli.command {
        Command::Init => {
            SqliteStore::init(&config.database).await?;
            println!("Database initialized at {}", config.database.path.display());
        }
        Command::Run { count, dry_run } => {
            let store = open_store(&config).await?;
            let client = match HnClient::new(&config.feed, config.fetch.clone()) {
                Ok(c) => {
                    info!(base_url = %config.feed.base_url, "Feed client initialized");
                    c
                }
                Err(e) => {
                    error!(error = %e, "Failed to initialize feed client");
                    return Err(e.into());
                }
            };

            let count = count.unwrap_or(config.feed.ranking_count);
            let pipeline =
                Pipeline::new(client, store, config.scoring.clone(), config.fetch.clone())?;

            let summary = pipeline.run(RunOptions { count, dry_run }).await?;

            println!("{}", serde_json::to_string_pretty(&summary)?);
            for outcome in summary.outcomes.iter().filter(|o| o.error.is_some()) {
                eprintln!(
                    "item {} failed: {}",
                    outcome.story_id,
                    outcome.error.as_deref().unwrap_or("unknown")
                );
            }
        }
        Command::Brief { week } => {
            let store = open_store(&config).await?;
            let week_start = report::resolve_week(week.as_deref())?;
            let records = report::records_for_week(&store, week_start).await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Command::Resolve {
            decision,
            resolution,
            operator,
        } => {
            let store = open_store(&config).await?;
            store
                .resolve_override(decision, resolution.into(), &operator)
                .await?;
            println!("Decision {} resolved", decision);
        }
        Command::Pending => {
            let store = open_store(&config).await?;
            let pending = store.pending_overrides().await?;
            println!("{}", serde_json::to_string_pretty(&pending)?);
        }
        Command::Schema => {
            println!("{}", include_str!("../migrations/0001_initial.sql"));
        }
    }

    Ok(())
}

async fn open_store(config: &Config) -> anyhow::Result<SqliteStore> {
    match SqliteStore::open(&config.database).await {
        Ok(s) => {
            info!(path = %config.database.path.display(), "Database opened");
            Ok(s)
        }
        Err(e) => {
            error!(error = %e, "Failed to open database");
            Err(e.into())
        }
    }
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        hn_triage::config::LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        hn_triage::config::LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
