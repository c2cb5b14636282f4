//! Metadata and share-token store selection

use anyhow::{Context, Result};
use docshare_core::{Config, MetadataBackend};
use docshare_db::{
    setup_database, InMemoryMetadataStore, InMemoryShareTokenStore, MetadataStore,
    PgMetadataStore, PgShareTokenStore, ShareTokenStore,
};
use std::sync::Arc;

pub struct Stores {
    pub metadata: Arc<dyn MetadataStore>,
    pub tokens: Arc<dyn ShareTokenStore>,
}

/// Build the stores named by `METADATA_BACKEND`
pub async fn setup_stores(config: &Config) -> Result<Stores> {
    match config.base.metadata_backend {
        MetadataBackend::Memory => {
            tracing::warn!("Using in-memory metadata; records are lost on restart");
            Ok(Stores {
                metadata: Arc::new(InMemoryMetadataStore::new()),
                tokens: Arc::new(InMemoryShareTokenStore::new()),
            })
        }
        MetadataBackend::Postgres => {
            let url = config
                .base
                .database_url
                .as_deref()
                .context("DATABASE_URL is required when METADATA_BACKEND=postgres")?;
            let pool = setup_database(url, config.base.db_max_connections).await?;
            Ok(Stores {
                metadata: Arc::new(PgMetadataStore::new(pool.clone())),
                tokens: Arc::new(PgShareTokenStore::new(pool)),
            })
        }
    }
}
