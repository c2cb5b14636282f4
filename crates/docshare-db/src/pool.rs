//! Database setup and initialization

use anyhow::{Context, Result};
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Workspace migrations, embedded at compile time.
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Connect a pool and apply pending migrations
pub async fn setup_database(database_url: &str, max_connections: u32) -> Result<PgPool> {
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!(max_connections, "Database connected successfully");

    MIGRATOR
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}
