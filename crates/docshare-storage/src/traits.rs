//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use docshare_core::AppError;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("File not found: {}", key)),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            StorageError::AlreadyExists(key) => {
                AppError::InternalConflict(format!("Storage path already exists: {}", key))
            }
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Storage abstraction trait
///
/// Backends persist opaque bytes under a caller-chosen key. Keys come from
/// [`crate::keys::generate_storage_path`].
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write `data` under a fresh `storage_key`. An existing object is never
    /// replaced; the write fails with [`StorageError::AlreadyExists`].
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Download a file by its storage key
    async fn download(&self, storage_key: &str) -> StorageResult<Bytes>;

    /// Delete a file by its storage key. Deleting a missing key succeeds.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Check if a file exists
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
