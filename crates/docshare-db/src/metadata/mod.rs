//! File metadata store
//!
//! Records are keyed by storage path with a secondary index by file id. Both
//! keys are unique. Listings come back in insertion order.

mod memory;
mod postgres;

pub use memory::InMemoryMetadataStore;
pub use postgres::PgMetadataStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docshare_core::{AppError, FileRecord};
use uuid::Uuid;

/// Blob of a deleted record, kept while share tokens for the file may still
/// be live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetainedBlob {
    pub storage_path: String,
    pub file_id: Uuid,
    pub retained_at: DateTime<Utc>,
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a new record. An existing path or file id fails with
    /// [`AppError::InternalConflict`] and leaves the store unchanged.
    async fn put(&self, record: FileRecord) -> Result<(), AppError>;

    async fn get(&self, storage_path: &str) -> Result<FileRecord, AppError>;

    async fn get_by_file_id(&self, file_id: Uuid) -> Result<FileRecord, AppError>;

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<FileRecord>, AppError>;

    async fn list_all(&self) -> Result<Vec<FileRecord>, AppError>;

    /// Remove a record and both of its index entries, returning it.
    async fn delete(&self, storage_path: &str) -> Result<FileRecord, AppError>;

    /// Remove a record like [`MetadataStore::delete`] and, in the same step,
    /// mark its blob as retained until [`MetadataStore::release_blob`].
    async fn delete_retaining_blob(
        &self,
        storage_path: &str,
        now: DateTime<Utc>,
    ) -> Result<FileRecord, AppError>;

    /// Retained blobs, oldest first.
    async fn retained_blobs(&self) -> Result<Vec<RetainedBlob>, AppError>;

    /// Forget a retained blob. Releasing an unknown path is a no-op.
    async fn release_blob(&self, storage_path: &str) -> Result<(), AppError>;

    async fn update_category(
        &self,
        storage_path: &str,
        category: &str,
    ) -> Result<FileRecord, AppError>;

    async fn set_verified(&self, storage_path: &str, verified: bool)
        -> Result<FileRecord, AppError>;

    /// Readiness probe
    async fn ping(&self) -> Result<(), AppError>;
}

pub(crate) fn path_not_found(storage_path: &str) -> AppError {
    AppError::NotFound(format!("File not found: {}", storage_path))
}

pub(crate) fn id_not_found(file_id: Uuid) -> AppError {
    AppError::NotFound(format!("File not found: {}", file_id))
}
