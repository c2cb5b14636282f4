use crate::keys::validate_storage_key;
use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem storage implementation
#[derive(Clone, Debug)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at `base_path`, creating it if needed.
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage { base_path })
    }

    /// Convert storage key to filesystem path with security validation
    ///
    /// Rejects keys that contain traversal sequences or that resolve outside
    /// the base storage directory.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        validate_storage_key(storage_key)?;

        let path = self.base_path.join(storage_key);

        let base_canonical = self.base_path.canonicalize().map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
        })?;

        if let Ok(canonical) = path.canonicalize() {
            if canonical.strip_prefix(&base_canonical).is_err() {
                return Err(StorageError::InvalidKey(
                    "Storage key resolves outside storage directory".to_string(),
                ));
            }
        }

        Ok(path)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Bytes,
        _content_type: &str,
    ) -> StorageResult<()> {
        let path = self.key_to_path(storage_key)?;
        let size = data.len();

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => StorageError::AlreadyExists(storage_key.to_string()),
                _ => StorageError::UploadFailed(format!(
                    "Failed to create file {}: {}",
                    path.display(),
                    e
                )),
            })?;

        let written = async {
            file.write_all(&data).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = written {
            drop(file);
            if let Err(cleanup) = fs::remove_file(&path).await {
                tracing::warn!(
                    error = %cleanup,
                    path = %path.display(),
                    "Failed to remove partially written file"
                );
            }
            return Err(StorageError::UploadFailed(format!(
                "Failed to write file {}: {}",
                path.display(),
                e
            )));
        }

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(())
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Bytes> {
        let path = self.key_to_path(storage_key)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(storage_key.to_string()));
        }

        let data = fs::read(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to read file {}: {}", path.display(), e))
        })?;

        tracing::debug!(
            key = %storage_key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage download successful"
        );

        Ok(Bytes::from(data))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let path = self.key_to_path(storage_key)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(storage_key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_local_storage_upload_download() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let key = "files/u1/report_20240101T000000000.pdf";
        storage
            .upload_with_key(key, Bytes::from_static(b"%PDF-1.7"), "application/pdf")
            .await
            .unwrap();

        let downloaded = storage.download(key).await.unwrap();
        assert_eq!(&downloaded[..], b"%PDF-1.7");
        assert!(dir.path().join(key).exists());
    }

    #[tokio::test]
    async fn test_upload_never_replaces_existing_object() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let key = "files/u1/id_20240101T000000000.pdf";
        storage
            .upload_with_key(key, Bytes::from_static(b"first"), "application/pdf")
            .await
            .unwrap();

        let result = storage
            .upload_with_key(key, Bytes::from_static(b"second"), "application/pdf")
            .await;
        assert!(matches!(result, Err(StorageError::AlreadyExists(_))));
        assert_eq!(&storage.download(key).await.unwrap()[..], b"first");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_uploads_to_one_key_have_one_winner() {
        let dir = tempdir().unwrap();
        let storage = std::sync::Arc::new(LocalStorage::new(dir.path()).await.unwrap());
        let key = "files/u1/race_20240101T000000000.pdf";

        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let storage = storage.clone();
                tokio::spawn(async move {
                    storage
                        .upload_with_key(key, Bytes::from(vec![i; 4096]), "application/pdf")
                        .await
                        .map(|_| i)
                })
            })
            .collect();

        let mut winners = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(i) => winners.push(i),
                Err(e) => assert!(matches!(e, StorageError::AlreadyExists(_))),
            }
        }
        assert_eq!(winners.len(), 1);
        assert_eq!(
            storage.download(key).await.unwrap().to_vec(),
            vec![winners[0]; 4096]
        );
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let result = storage.download("../../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.delete("../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.exists("/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_missing_key_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let result = storage.download("files/u1/missing.pdf").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_local_storage_delete_nonexistent() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        assert!(storage.delete("nonexistent/file.txt").await.is_ok());
    }

    #[tokio::test]
    async fn test_local_storage_exists() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let key = "files/u1/a.png";
        assert!(!storage.exists(key).await.unwrap());
        storage
            .upload_with_key(key, Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();
        assert!(storage.exists(key).await.unwrap());
        storage.delete(key).await.unwrap();
        assert!(!storage.exists(key).await.unwrap());
    }
}
