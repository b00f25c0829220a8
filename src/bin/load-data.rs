//! Bulk-load timetable rows or user accounts into the data store.
//!
//! Usage: load-data <timetable|users> --file PATH
//!   Reads .json, .jsonl/.ndjson, .csv or .xlsx (first sheet, header row)
//!   and upserts every row. STORE_URL / STORE_KEY come from the environment.
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use class_tracker_api::{config::Config, services::loader, store};

#[derive(Parser)]
#[command(name = "load-data", about = "Load timetable rows or users into the class tracker store")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upsert timetable rows keyed on (day, time, subject, faculty, division, batch)
    Timetable {
        #[arg(long)]
        file: PathBuf,
    },
    /// Upsert user accounts keyed on username
    Users {
        #[arg(long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;
    let store = store::create_store(&config).await?;

    let (path, summary) = match args.command {
        Command::Timetable { file } => {
            let rows = loader::read_rows(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            tracing::info!("Loaded {} timetable rows from {}", rows.len(), file.display());
            let summary = loader::load_timetable(store.as_ref(), rows).await;
            (file, summary)
        }
        Command::Users { file } => {
            let rows = loader::read_rows(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            tracing::info!("Loaded {} user rows from {}", rows.len(), file.display());
            let summary = loader::load_users(store.as_ref(), rows).await;
            (file, summary)
        }
    };

    println!("{}", path.display());
    println!("Inserted/Updated: {}", summary.upserted);
    println!("Failed: {}", summary.failed);

    if summary.failed > 0 && summary.upserted == 0 {
        anyhow::bail!("No rows were loaded");
    }
    Ok(())
}
