//! Serves blobs behind HMAC-signed links issued for the local backend.

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::rejection::QueryRejection,
    extract::{Path, Query, State},
    http::header::{CACHE_CONTROL, CONTENT_TYPE},
    response::IntoResponse,
};
use docshare_core::{content_type_for, AppError};
use docshare_storage::SignatureError;
use serde::Deserialize;
use std::path::Path as FsPath;
use std::sync::Arc;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
pub struct BlobQuery {
    /// Unix timestamp after which the link is dead
    pub expires: i64,
    /// Hex HMAC-SHA256 over the storage path and `expires`
    pub signature: String,
}

#[utoipa::path(
    get,
    path = "/blob/{storage_path}",
    tag = "files",
    params(("storage_path" = String, Path, description = "Storage path of the file"), BlobQuery),
    responses(
        (status = 200, description = "File bytes"),
        (status = 403, description = "Invalid or expired link", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(storage_path = %storage_path))]
pub async fn serve_blob(
    State(state): State<Arc<AppState>>,
    Path(storage_path): Path<String>,
    query: Result<Query<BlobQuery>, QueryRejection>,
) -> Result<impl IntoResponse, HttpAppError> {
    let signer = state
        .blobs
        .signer
        .as_ref()
        .ok_or_else(|| AppError::NotFound("Not found".to_string()))?;

    let Query(query) = query?;
    signer
        .verify(&storage_path, query.expires, &query.signature)
        .map_err(|e| {
            tracing::debug!(error = %e, "Rejected blob link");
            match e {
                SignatureError::Expired => AppError::Forbidden("Link expired".to_string()),
                SignatureError::Malformed | SignatureError::Mismatch => {
                    AppError::Forbidden("Invalid link signature".to_string())
                }
            }
        })?;

    let data = state.blobs.storage.download(&storage_path).await?;
    let extension = FsPath::new(&storage_path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();

    Ok((
        [
            (CONTENT_TYPE, content_type_for(extension)),
            (CACHE_CONTROL, "private, no-store"),
        ],
        data,
    ))
}
