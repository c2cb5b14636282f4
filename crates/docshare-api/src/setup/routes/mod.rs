//! Route configuration and setup.

pub mod health;

use crate::constants::{API_PREFIX, BLOB_PREFIX};
use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use docshare_core::Config;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Headroom above the file ceiling for multipart framing and the category field.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;

    let protected_routes = protected_routes(config).layer(axum::middleware::from_fn_with_state(
        state.clone(),
        crate::auth::auth_middleware,
    ));

    tracing::info!(
        http_concurrency_limit = config.base.http_concurrency_limit,
        "HTTP concurrency limit layer enabled"
    );

    let app = public_routes()
        .merge(protected_routes)
        .layer(ConcurrencyLimitLayer::new(config.base.http_concurrency_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/api/openapi.json", get(openapi_json))
        .route(
            &format!("{}/shared/{{token_id}}", API_PREFIX),
            get(handlers::shares::redeem_share),
        )
        .route(
            &format!("{}/{{*storage_path}}", BLOB_PREFIX),
            get(handlers::blob::serve_blob),
        )
}

fn protected_routes(config: &Config) -> Router<Arc<AppState>> {
    let upload_limit = config.upload.max_file_size_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route(
            &format!("{}/upload", API_PREFIX),
            post(handlers::files::upload_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            &format!("{}/user/{{user_id}}", API_PREFIX),
            get(handlers::files::list_user_files),
        )
        .route(
            &format!("{}/all", API_PREFIX),
            get(handlers::files::list_all_files),
        )
        .route(
            &format!("{}/download-links", API_PREFIX),
            post(handlers::files::download_links),
        )
        .route(
            &format!("{}/list/{{user_id}}", API_PREFIX),
            get(handlers::files::list_paths),
        )
        .route(
            &format!("{}/{{file_id}}/share", API_PREFIX),
            post(handlers::shares::create_share),
        )
        .route(
            &format!("{}/{{file_id}}/shares", API_PREFIX),
            get(handlers::shares::list_shares),
        )
        .route(
            &format!("{}/shares/{{token_id}}", API_PREFIX),
            delete(handlers::shares::revoke_share),
        )
        .route(
            &format!("{}/{{file_id}}/category", API_PREFIX),
            put(handlers::files::update_category),
        )
        .route(
            &format!("{}/remove/{{*storage_path}}", API_PREFIX),
            delete(handlers::files::delete_file),
        )
}

async fn openapi_json() -> impl IntoResponse {
    Json(crate::api_doc::get_openapi_spec())
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}
