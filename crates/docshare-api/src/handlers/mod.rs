pub mod blob;
pub mod files;
pub mod shares;

use axum::extract::{rejection::PathRejection, Path};
use docshare_core::AppError;
use uuid::Uuid;

/// Resolve a `{file_id}` segment. A segment that is not a UUID names no file
/// and is reported as not found.
pub(crate) fn file_id_param(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, AppError> {
    path.map(|Path(file_id)| file_id)
        .map_err(|_| AppError::NotFound("File not found".to_string()))
}
