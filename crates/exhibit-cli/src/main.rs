//! Exhibit CLI: stage evidence files from disk and commit them to a report.
//!
//! Backends and limits come from the environment (see `Config::from_env`).

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use exhibit_cli::IngestSummary;
use exhibit_core::{Config, MetadataBackend};
use exhibit_db::{connect, create_metadata_store, run_migrations};
use exhibit_infra::{init_telemetry, shutdown_telemetry};
use exhibit_ingest::{CommitRequest, IngestionCoordinator, LoggingCommitListener, RawHandle};
use exhibit_storage::create_storage;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "exhibit", about = "Evidence ingestion CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stage files and commit them as evidence of a report
    Ingest {
        /// Owner of the evidence
        #[arg(long)]
        owner: String,
        /// Existing report UUID; a new report is created when omitted
        #[arg(long)]
        report: Option<Uuid>,
        /// Title of a newly created report
        #[arg(long)]
        title: Option<String>,
        /// Files to ingest
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Apply pending database migrations
    Migrate,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

async fn ingest(
    config: &Config,
    owner: String,
    report: Option<Uuid>,
    title: Option<String>,
    files: Vec<PathBuf>,
) -> anyhow::Result<IngestSummary> {
    let storage = create_storage(&config.storage)
        .await
        .context("Failed to initialize storage")?;
    let metadata = create_metadata_store(&config.metadata).await?;
    let coordinator = IngestionCoordinator::new(config.ingest.clone(), storage, metadata)
        .with_listener(Arc::new(LoggingCommitListener));

    let outcome = coordinator
        .stage(files.iter().map(RawHandle::from_path).collect())
        .await;
    for rejected in &outcome.rejected {
        tracing::warn!(file = %rejected.filename, error = %rejected.error, "File rejected");
    }
    if outcome.staged.is_empty() {
        bail!("None of the {} files could be staged", files.len());
    }

    coordinator.wait_for_intake().await;
    let filenames: HashMap<_, _> = coordinator
        .snapshot()
        .into_iter()
        .map(|view| (view.id, view.filename))
        .collect();

    let mut request = CommitRequest::new(owner);
    if let Some(report_id) = report {
        request = request.with_report(report_id);
    }
    if let Some(title) = title {
        request = request.with_title(title);
    }
    let result = coordinator
        .commit_request(request)
        .await
        .context("Commit failed")?;

    Ok(IngestSummary::new(&outcome, &result, &filenames))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    init_telemetry(config.log_format, &config.environment)?;

    let complete = match cli.command {
        Commands::Ingest {
            owner,
            report,
            title,
            files,
        } => {
            let summary = ingest(&config, owner, report, title, files).await?;
            print_json(&summary)?;
            summary.is_complete()
        }
        Commands::Migrate => {
            if config.metadata.backend != MetadataBackend::Postgres {
                bail!("migrate requires METADATA_BACKEND=postgres");
            }
            let pool = connect(&config.metadata).await?;
            run_migrations(&pool).await?;
            print_json(&serde_json::json!({ "migrated": true }))?;
            true
        }
    };

    shutdown_telemetry().await;
    if !complete {
        bail!("Some files were not committed");
    }
    Ok(())
}
