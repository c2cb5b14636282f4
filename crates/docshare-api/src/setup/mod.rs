//! Application setup and initialization

pub mod routes;
pub mod server;
pub mod stores;

use crate::auth::{create_resolver, PrincipalResolver};
use crate::services::{FileService, LinkIssuer, RetainedBlobSweeper};
use crate::state::{AppState, BlobState};
use anyhow::{Context, Result};
use docshare_core::{Clock, Config, SystemClock, UploadValidator};
use docshare_db::{SharePolicy, ShareTokenRegistry};
use docshare_storage::create_storage;
use std::sync::Arc;
use std::time::Duration;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Validate configuration first - fail fast on misconfiguration
    config
        .validate()
        .context("Configuration validation failed")?;

    crate::telemetry::init_telemetry(config.base.log_json)
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.base.environment,
        "Configuration loaded and validated successfully"
    );

    let resolver = create_resolver(&config.auth)?;
    let state = build_state(config, Arc::new(SystemClock), resolver).await?;
    let router = routes::setup_routes(&state.config, state.clone())?;

    let sweep_period = Duration::from_secs(state.config.storage.retained_sweep_interval_secs);
    Arc::new(RetainedBlobSweeper::new(state.files.clone(), sweep_period)).start();
    tracing::info!(
        interval_secs = sweep_period.as_secs(),
        "Retained blob sweeper started"
    );

    Ok((state, router))
}

/// Wire stores, storage and services into the shared state.
pub async fn build_state(
    config: Config,
    clock: Arc<dyn Clock>,
    resolver: Arc<dyn PrincipalResolver>,
) -> Result<Arc<AppState>> {
    let stores = stores::setup_stores(&config).await?;

    let handles = create_storage(&config)
        .await
        .context("Failed to initialize storage")?;
    tracing::info!(backend = %handles.storage.backend_type(), "Storage initialized");

    let registry = ShareTokenRegistry::new(
        stores.metadata.clone(),
        stores.tokens.clone(),
        clock.clone(),
        SharePolicy::from(&config.share),
    );
    let links = LinkIssuer::new(stores.metadata.clone(), handles.signer.clone());

    let files = FileService::new(
        stores.metadata,
        handles.storage.clone(),
        links,
        registry,
        UploadValidator::from_config(&config.upload),
        clock,
        config.base.public_base_url.clone(),
        Duration::from_secs(config.storage.download_link_ttl_secs),
        Duration::from_secs(config.storage.listing_link_ttl_secs),
    );

    Ok(Arc::new(AppState {
        config: Arc::new(config),
        files,
        blobs: BlobState {
            storage: handles.storage,
            signer: handles.hmac_signer,
        },
        resolver,
    }))
}
