//! FX-exposure job-market signal pipeline CLI entry point.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use fxsignal_pipeline::http::HttpClient;
use fxsignal_pipeline::sheet::{google::GoogleSheetsExporter, NullExporter, SheetExporter};
use fxsignal_pipeline::store::{SqliteStore, Store};
use fxsignal_pipeline::{lock::RunLock, orchestrator, Config};

#[derive(Parser)]
#[command(name = "fxsignal", about = "FX-exposure job-market signal pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full stage sequence once: directory, discovery, ATS
    /// ingest, aggregator ingest, aggregation, spreadsheet export.
    Run,
    /// Print the most recent ingestion runs recorded in the store.
    Summary,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("loading configuration")?;

    match cli.command {
        Command::Run => run(&config).await,
        Command::Summary => summary(&config).await,
    }
}

async fn run(config: &Config) -> Result<()> {
    let store = SqliteStore::open(&config.db_path).context("opening store")?;
    let catalog = config.load_catalog()?;
    let scoring_cfg = fxsignal_pipeline::scorer::ScoringConfig::default();

    let owner_id = Uuid::new_v4().to_string();
    let lock = RunLock::new(store.conn_handle(), owner_id, config.lock_ttl_seconds);

    let exporter: Box<dyn SheetExporter> = match &config.google_sheets_credentials_path {
        Some(path) => {
            let client = HttpClient::new(&config.http_user_agent, config.http_timeout)?;
            Box::new(GoogleSheetsExporter::from_credentials_file(client, path)?)
        }
        None => Box::new(NullExporter),
    };

    let outcomes = orchestrator::run_once(config, &store, &catalog, &scoring_cfg, exporter.as_ref(), &lock)
        .await
        .context("running pipeline")?;

    for outcome in &outcomes {
        tracing::info!(
            stage = outcome.name,
            offers = outcome.counters.offers_fetched,
            errors = outcome.counters.errors_count,
            error = outcome.error.as_deref(),
            "stage result"
        );
    }

    Ok(())
}

async fn summary(config: &Config) -> Result<()> {
    let store = SqliteStore::open(&config.db_path).context("opening store")?;
    let runs = store.list_recent_runs(config.recent_runs_limit).await?;

    if runs.is_empty() {
        println!("no ingestion runs recorded yet");
        return Ok(());
    }

    for run in runs {
        println!(
            "#{:<5} {:<12} status={:<8} offers={:<5} pages={:<4} errors={:<3} started={}",
            run.id,
            run.provider,
            run.status.as_deref().unwrap_or("unknown"),
            run.offers_fetched,
            run.pages_fetched,
            run.errors_count,
            run.started_at,
        );
    }

    Ok(())
}
