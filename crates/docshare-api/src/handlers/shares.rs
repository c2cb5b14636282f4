//! Share token handlers: issue, redeem, revoke and list.

use super::file_id_param;
use crate::auth::AuthPrincipal;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{
    extract::rejection::PathRejection,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use docshare_core::models::{FileRecordResponse, ShareTokenResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ShareRequest {
    #[serde(default, alias = "expirationHours")]
    pub expiration_hours: Option<i64>,
    #[serde(default, alias = "maxDownloads")]
    pub max_downloads: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ShareResponse {
    pub token_id: String,
    pub share_link: String,
    pub expires_at: DateTime<Utc>,
    pub max_uses: u32,
}

#[utoipa::path(
    post,
    path = "/api/files/{file_id}/share",
    tag = "shares",
    params(("file_id" = Uuid, Path, description = "File ID")),
    request_body = ShareRequest,
    responses(
        (status = 200, description = "Share token issued", body = ShareResponse),
        (status = 400, description = "TTL or use count out of bounds", body = ErrorResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_share(
    State(state): State<Arc<AppState>>,
    principal: AuthPrincipal,
    file_id: Result<Path<Uuid>, PathRejection>,
    ValidatedJson(request): ValidatedJson<ShareRequest>,
) -> Result<Json<ShareResponse>, HttpAppError> {
    let file_id = file_id_param(file_id)?;
    let grant = state
        .files
        .share(
            &principal.0,
            file_id,
            request.expiration_hours,
            request.max_downloads,
        )
        .await?;

    Ok(Json(ShareResponse {
        token_id: grant.token.token_id,
        share_link: grant.share_link,
        expires_at: grant.token.expires_at,
        max_uses: grant.token.max_uses,
    }))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SharedFileResponse {
    pub file: FileRecordResponse,
    pub download_url: String,
    pub expires_in_seconds: u64,
}

/// Unauthenticated: the token itself is the capability.
#[utoipa::path(
    get,
    path = "/api/files/shared/{token_id}",
    tag = "shares",
    params(("token_id" = String, Path, description = "Share token")),
    responses(
        (status = 200, description = "Token redeemed", body = SharedFileResponse),
        (status = 404, description = "Unknown, expired or exhausted token, or file gone", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn redeem_share(
    State(state): State<Arc<AppState>>,
    Path(token_id): Path<String>,
) -> Result<Json<SharedFileResponse>, HttpAppError> {
    let shared = state.files.redeem(&token_id).await?;
    Ok(Json(SharedFileResponse {
        file: shared.record.into(),
        download_url: shared.download_url,
        expires_in_seconds: shared.expires_in_seconds,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/files/shares/{token_id}",
    tag = "shares",
    params(("token_id" = String, Path, description = "Share token")),
    responses(
        (status = 204, description = "Token revoked"),
        (status = 403, description = "Not the issuer", body = ErrorResponse),
        (status = 404, description = "Token not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn revoke_share(
    State(state): State<Arc<AppState>>,
    principal: AuthPrincipal,
    Path(token_id): Path<String>,
) -> Result<StatusCode, HttpAppError> {
    state.files.revoke_share(&principal.0, &token_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/files/{file_id}/shares",
    tag = "shares",
    params(("file_id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "Tokens issued for the file", body = Vec<ShareTokenResponse>),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_shares(
    State(state): State<Arc<AppState>>,
    principal: AuthPrincipal,
    file_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<ShareTokenResponse>>, HttpAppError> {
    let file_id = file_id_param(file_id)?;
    let tokens = state.files.list_shares(&principal.0, file_id).await?;
    let now = state.files.registry().clock().now();
    Ok(Json(
        tokens
            .into_iter()
            .map(|token| ShareTokenResponse::from_token(token, now))
            .collect(),
    ))
}
