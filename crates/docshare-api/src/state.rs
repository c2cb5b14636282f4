//! Application state shared by every handler.

use crate::auth::PrincipalResolver;
use crate::services::FileService;
use docshare_core::Config;
use docshare_storage::{HmacUrlSigner, Storage};
use std::sync::Arc;

/// Blob access for the self-served `/blob` route.
#[derive(Clone)]
pub struct BlobState {
    pub storage: Arc<dyn Storage>,
    /// Present only for the local backend; `/blob` answers 404 without it.
    pub signer: Option<Arc<HmacUrlSigner>>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub files: FileService,
    pub blobs: BlobState,
    pub resolver: Arc<dyn PrincipalResolver>,
}
