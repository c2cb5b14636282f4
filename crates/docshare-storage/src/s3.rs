use crate::signer::UrlSigner;
use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{
    ObjectStore, ObjectStoreExt, PutMode, PutOptions, PutPayload, Result as ObjectResult,
};
use std::time::Duration;

/// S3 storage implementation
///
/// Also signs download links natively through S3 presigned GET URLs.
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub fn new(bucket: String, region: String, endpoint_url: Option<String>) -> StorageResult<Self> {
        // Credentials come from the standard AWS environment variables.
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder.with_endpoint(endpoint).with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage { store, bucket })
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Bytes,
        _content_type: &str,
    ) -> StorageResult<()> {
        let size = data.len() as u64;
        let location = Path::from(storage_key.to_string());
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self
            .store
            .put_opts(
                &location,
                PutPayload::from(data),
                PutOptions::from(PutMode::Create),
            )
            .await;

        result.map_err(|e| match e {
            ObjectStoreError::AlreadyExists { .. } => {
                tracing::warn!(
                    bucket = %self.bucket,
                    key = %storage_key,
                    "S3 object already exists"
                );
                StorageError::AlreadyExists(storage_key.to_string())
            }
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %self.bucket,
                    key = %storage_key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                StorageError::UploadFailed(other.to_string())
            }
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(())
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Bytes> {
        let start = std::time::Instant::now();
        let location = Path::from(storage_key.to_string());

        let result: ObjectResult<_> = self.store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(storage_key.to_string()),
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %self.bucket,
                    key = %storage_key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 download failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        tracing::debug!(
            bucket = %self.bucket,
            key = %storage_key,
            size_bytes = bytes.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 download successful"
        );

        Ok(bytes)
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let start = std::time::Instant::now();
        let location = Path::from(storage_key.to_string());

        let result: ObjectResult<_> = self.store.delete(&location).await;

        match result {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {}
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %storage_key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete failed"
                );
                return Err(StorageError::DeleteFailed(e.to_string()));
            }
        }

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let location = Path::from(storage_key.to_string());
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}

#[async_trait]
impl UrlSigner for S3Storage {
    async fn sign(&self, storage_key: &str, expires_in: Duration) -> StorageResult<String> {
        let location = Path::from(storage_key.to_string());
        let url_result: ObjectResult<_> = self
            .store
            .signed_url(Method::GET, &location, expires_in)
            .await;

        let url = url_result
            .map_err(|e| StorageError::BackendError(e.to_string()))?
            .to_string();

        Ok(url)
    }
}
