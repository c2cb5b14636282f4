#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{HmacUrlSigner, Storage, StorageBackend, StorageError, StorageResult, UrlSigner};
use docshare_core::Config;
use std::sync::Arc;

const DEFAULT_S3_REGION: &str = "us-east-1";

/// The blob store together with the signer that produces its download links.
#[derive(Clone)]
pub struct StorageHandles {
    pub storage: Arc<dyn Storage>,
    pub signer: Arc<dyn UrlSigner>,
    /// Present only for the local backend, where the service serves signed links itself.
    pub hmac_signer: Option<Arc<HmacUrlSigner>>,
}

/// Create a storage backend and its signer based on configuration
pub async fn create_storage(config: &Config) -> StorageResult<StorageHandles> {
    match config.storage.backend {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let bucket = config.storage.s3_bucket.clone().ok_or_else(|| {
                StorageError::ConfigError("S3_BUCKET_NAME not configured".to_string())
            })?;
            let region = config
                .storage
                .s3_region
                .clone()
                .unwrap_or_else(|| DEFAULT_S3_REGION.to_string());
            let endpoint = config.storage.s3_endpoint.clone();

            let storage = Arc::new(S3Storage::new(bucket, region, endpoint)?);
            Ok(StorageHandles {
                storage: storage.clone(),
                signer: storage,
                hmac_signer: None,
            })
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let secret = config.storage.url_signing_secret.clone().ok_or_else(|| {
                StorageError::ConfigError("URL_SIGNING_SECRET not configured".to_string())
            })?;

            let storage = LocalStorage::new(&config.storage.local_storage_path).await?;
            let signer = Arc::new(HmacUrlSigner::new(
                secret.into_bytes(),
                config.base.public_base_url.clone(),
            )?);
            Ok(StorageHandles {
                storage: Arc::new(storage),
                signer: signer.clone(),
                hmac_signer: Some(signer),
            })
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}
