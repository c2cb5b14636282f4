//! OpenAPI documentation, served at `/api/openapi.json`.

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error;
use crate::handlers;
use crate::setup::routes::health;
use docshare_core::models;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }
}

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "docshare API",
        version = "0.1.0",
        description = "Document upload and retrieval with expiring download links and bounded-use share tokens."
    ),
    paths(
        // Files
        handlers::files::upload_file,
        handlers::files::list_user_files,
        handlers::files::list_all_files,
        handlers::files::download_links,
        handlers::files::list_paths,
        handlers::files::update_category,
        handlers::files::delete_file,
        handlers::blob::serve_blob,
        // Shares
        handlers::shares::create_share,
        handlers::shares::redeem_share,
        handlers::shares::revoke_share,
        handlers::shares::list_shares,
        // Health
        health::health_check,
        health::readiness_check,
    ),
    components(
        schemas(
            models::FileRecordResponse,
            models::ShareTokenResponse,
            models::TokenState,
            handlers::files::UploadResponse,
            handlers::files::FileListResponse,
            handlers::files::DownloadLinksRequest,
            handlers::files::DownloadLinksResponse,
            handlers::files::LinkError,
            handlers::files::PathListResponse,
            handlers::files::CategoryRequest,
            handlers::files::DeleteResponse,
            handlers::shares::ShareRequest,
            handlers::shares::ShareResponse,
            handlers::shares::SharedFileResponse,
            error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "files", description = "Upload, listing, download links and removal"),
        (name = "shares", description = "Share token issue, redemption and revocation"),
        (name = "health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;
