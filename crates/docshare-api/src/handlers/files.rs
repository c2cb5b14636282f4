//! Upload, listing, download-link, category and delete handlers.

use super::file_id_param;
use crate::auth::AuthPrincipal;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::services::{LinkOutcome, Page, PathListing};
use crate::state::AppState;
use axum::{
    extract::multipart::MultipartRejection,
    extract::rejection::{PathRejection, QueryRejection},
    extract::{Multipart, Path, Query, State},
    Json,
};
use bytes::Bytes;
use docshare_core::models::FileRecordResponse;
use docshare_core::AppError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, IntoParams)]
pub struct UploadQuery {
    /// Used when the form carries no `category` field
    pub category: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub success: bool,
    pub file_id: Uuid,
    pub storage_path: String,
    pub message: String,
}

#[utoipa::path(
    post,
    path = "/api/files/upload",
    tag = "files",
    params(UploadQuery),
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File uploaded", body = UploadResponse),
        (status = 400, description = "Invalid file", body = ErrorResponse),
        (status = 401, description = "Unauthenticated", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all, fields(principal = %principal.0.principal_id))]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    principal: AuthPrincipal,
    query: Result<Query<UploadQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, HttpAppError> {
    let Query(query) = query?;
    let mut multipart = multipart?;

    let mut file: Option<(String, Bytes)> = None;
    let mut category = query.category;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| AppError::InvalidInput("File part has no filename".into()))?;
                let data = field.bytes().await?;
                file = Some((file_name, data));
            }
            Some("category") => {
                category = Some(field.text().await?);
            }
            _ => {}
        }
    }

    let (file_name, data) =
        file.ok_or_else(|| AppError::InvalidInput("Missing 'file' field".to_string()))?;

    let record = state
        .files
        .upload(&principal.0, &file_name, data, category.as_deref())
        .await?;

    Ok(Json(UploadResponse {
        success: true,
        file_id: record.file_id,
        storage_path: record.storage_path,
        message: "File uploaded successfully".to_string(),
    }))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct UserFilesQuery {
    pub page: Option<usize>,
    pub size: Option<usize>,
    #[serde(default)]
    pub verified_only: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PageQuery {
    pub page: Option<usize>,
    pub size: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FileListResponse {
    pub total_files: usize,
    pub page: usize,
    pub page_size: usize,
    pub files: Vec<FileRecordResponse>,
}

impl From<Page> for FileListResponse {
    fn from(page: Page) -> Self {
        FileListResponse {
            total_files: page.total,
            page: page.page,
            page_size: page.page_size,
            files: page.items.into_iter().map(Into::into).collect(),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/files/user/{user_id}",
    tag = "files",
    params(("user_id" = String, Path, description = "Owner principal id"), UserFilesQuery),
    responses(
        (status = 200, description = "Owner's files", body = FileListResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user_id))]
pub async fn list_user_files(
    State(state): State<Arc<AppState>>,
    principal: AuthPrincipal,
    Path(user_id): Path<String>,
    query: Result<Query<UserFilesQuery>, QueryRejection>,
) -> Result<Json<FileListResponse>, HttpAppError> {
    let Query(query) = query?;
    let page = state
        .files
        .list_user_files(
            &principal.0,
            &user_id,
            query.page,
            query.size,
            query.verified_only,
        )
        .await?;
    Ok(Json(page.into()))
}

#[utoipa::path(
    get,
    path = "/api/files/all",
    tag = "files",
    params(PageQuery),
    responses(
        (status = 200, description = "Every file", body = FileListResponse),
        (status = 403, description = "Administrator role required", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_all_files(
    State(state): State<Arc<AppState>>,
    principal: AuthPrincipal,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<FileListResponse>, HttpAppError> {
    let Query(query) = query?;
    let page = state
        .files
        .list_all_files(&principal.0, query.page, query.size)
        .await?;
    Ok(Json(page.into()))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DownloadLinksRequest {
    #[serde(alias = "filePaths")]
    #[validate(length(max = 100, message = "At most 100 paths per request"))]
    pub file_paths: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LinkError {
    pub status: u16,
    pub code: String,
    pub error: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DownloadLinksResponse {
    pub download_links: BTreeMap<String, String>,
    pub errors: BTreeMap<String, LinkError>,
}

#[utoipa::path(
    post,
    path = "/api/files/download-links",
    tag = "files",
    request_body = DownloadLinksRequest,
    responses(
        (status = 200, description = "Links and per-path errors", body = DownloadLinksResponse),
        (status = 400, description = "Too many paths", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all, fields(paths = request.file_paths.len()))]
pub async fn download_links(
    State(state): State<Arc<AppState>>,
    principal: AuthPrincipal,
    ValidatedJson(request): ValidatedJson<DownloadLinksRequest>,
) -> Result<Json<DownloadLinksResponse>, HttpAppError> {
    request.validate().map_err(AppError::from)?;

    let mut response = DownloadLinksResponse {
        download_links: BTreeMap::new(),
        errors: BTreeMap::new(),
    };

    for (path, outcome) in state
        .files
        .download_links(&principal.0, &request.file_paths)
        .await
    {
        match outcome {
            LinkOutcome::Link(url) => {
                response.download_links.insert(path, url);
            }
            LinkOutcome::Error {
                status,
                code,
                message,
            } => {
                response.errors.insert(
                    path,
                    LinkError {
                        status,
                        code: code.to_string(),
                        error: message,
                    },
                );
            }
        }
    }

    Ok(Json(response))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PathListQuery {
    #[serde(default)]
    pub include_links: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum PathListResponse {
    Paths { file_paths: Vec<String> },
    Links { download_links: BTreeMap<String, String> },
}

#[utoipa::path(
    get,
    path = "/api/files/list/{user_id}",
    tag = "files",
    params(("user_id" = String, Path, description = "Owner principal id"), PathListQuery),
    responses(
        (status = 200, description = "Owner's storage paths", body = PathListResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user_id))]
pub async fn list_paths(
    State(state): State<Arc<AppState>>,
    principal: AuthPrincipal,
    Path(user_id): Path<String>,
    query: Result<Query<PathListQuery>, QueryRejection>,
) -> Result<Json<PathListResponse>, HttpAppError> {
    let Query(query) = query?;
    let listing = state
        .files
        .list_paths(&principal.0, &user_id, query.include_links)
        .await?;

    Ok(Json(match listing {
        PathListing::Paths(file_paths) => PathListResponse::Paths { file_paths },
        PathListing::Links(links) => PathListResponse::Links {
            download_links: links.into_iter().collect(),
        },
    }))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CategoryRequest {
    #[validate(length(min = 1, max = 64))]
    pub category: String,
}

#[utoipa::path(
    put,
    path = "/api/files/{file_id}/category",
    tag = "files",
    params(("file_id" = Uuid, Path, description = "File ID")),
    request_body = CategoryRequest,
    responses(
        (status = 200, description = "Updated record", body = FileRecordResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_category(
    State(state): State<Arc<AppState>>,
    principal: AuthPrincipal,
    file_id: Result<Path<Uuid>, PathRejection>,
    ValidatedJson(request): ValidatedJson<CategoryRequest>,
) -> Result<Json<FileRecordResponse>, HttpAppError> {
    let file_id = file_id_param(file_id)?;
    request.validate().map_err(AppError::from)?;
    let record = state
        .files
        .update_category(&principal.0, file_id, &request.category)
        .await?;
    Ok(Json(record.into()))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
    pub file_path: String,
}

#[utoipa::path(
    delete,
    path = "/api/files/remove/{storage_path}",
    tag = "files",
    params(("storage_path" = String, Path, description = "Storage path of the file")),
    responses(
        (status = 200, description = "File removed", body = DeleteResponse),
        (status = 403, description = "Not allowed", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all, fields(storage_path = %storage_path))]
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    principal: AuthPrincipal,
    Path(storage_path): Path<String>,
) -> Result<Json<DeleteResponse>, HttpAppError> {
    let record = state.files.delete(&principal.0, &storage_path).await?;
    Ok(Json(DeleteResponse {
        success: true,
        message: "File deleted".to_string(),
        file_path: record.storage_path,
    }))
}
