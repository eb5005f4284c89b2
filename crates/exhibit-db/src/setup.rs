//! Metadata store setup: connection pool, migrations and backend selection.

use anyhow::{Context, Result};
use exhibit_core::{MetadataBackend, MetadataConfig};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::memory::MemoryMetadataStore;
use crate::repository::PgMetadataStore;
use crate::traits::MetadataStore;

/// Open a Postgres connection pool.
pub async fn connect(config: &MetadataConfig) -> Result<PgPool> {
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL is required for the postgres metadata backend")?;

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!(
        max_connections = config.db_max_connections,
        "Database connected successfully"
    );
    Ok(pool)
}

/// Apply pending migrations from the workspace `migrations/` directory.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    let migrations_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../migrations");
    let migrator = sqlx::migrate::Migrator::new(migrations_dir)
        .await
        .context("Failed to load migrations")?;
    migrator
        .run(pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");
    Ok(())
}

/// Build the metadata store selected by `config.backend`.
///
/// The postgres backend connects and applies migrations before returning.
pub async fn create_metadata_store(config: &MetadataConfig) -> Result<Arc<dyn MetadataStore>> {
    match config.backend {
        MetadataBackend::Postgres => {
            let pool = connect(config).await?;
            run_migrations(&pool).await?;
            Ok(Arc::new(PgMetadataStore::new(pool)))
        }
        MetadataBackend::Memory => {
            tracing::warn!("Using in-memory metadata store; records are lost on exit");
            Ok(Arc::new(MemoryMetadataStore::new()))
        }
    }
}
