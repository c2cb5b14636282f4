//! File service facade
//!
//! Composes the metadata store, the blob store, the link issuer and the share
//! token registry into the operations exposed over HTTP. Access decisions are
//! taken here (or in the registry) before any collaborator is touched.

use super::links::{LinkIssuer, LinkOutcome};
use bytes::Bytes;
use docshare_core::constants::{ADMIN_LISTING_PAGE_SIZE, DEFAULT_CATEGORY, MAX_PAGE_SIZE, USER_LISTING_PAGE_SIZE};
use docshare_core::{
    can_access, can_access_owner, content_type_for, AppError, Clock, FileRecord, Operation,
    Principal, ShareToken, UploadValidator,
};
use docshare_db::{MetadataStore, ShareTokenRegistry};
use docshare_storage::{generate_storage_path, Storage};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const MAX_CATEGORY_LEN: usize = 64;

/// One page of a stable listing
#[derive(Debug, Clone)]
pub struct Page {
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub items: Vec<FileRecord>,
}

/// Slice `records` into the requested page. Pages are 1-based; the size is
/// capped at [`MAX_PAGE_SIZE`].
pub fn paginate(
    records: Vec<FileRecord>,
    page: Option<usize>,
    size: Option<usize>,
    default_size: usize,
) -> Result<Page, AppError> {
    let page = page.unwrap_or(1);
    let page_size = size.unwrap_or(default_size);
    if page == 0 {
        return Err(AppError::InvalidInput("page must be at least 1".to_string()));
    }
    if page_size == 0 {
        return Err(AppError::InvalidInput("size must be at least 1".to_string()));
    }
    let page_size = page_size.min(MAX_PAGE_SIZE);

    let total = records.len();
    let items = records
        .into_iter()
        .skip((page - 1).saturating_mul(page_size))
        .take(page_size)
        .collect();

    Ok(Page {
        total,
        page,
        page_size,
        items,
    })
}

fn normalize_category(category: Option<&str>) -> Result<String, AppError> {
    let category = category.map(str::trim).unwrap_or_default();
    if category.is_empty() {
        return Ok(DEFAULT_CATEGORY.to_string());
    }
    if category.chars().count() > MAX_CATEGORY_LEN || category.chars().any(char::is_control) {
        return Err(AppError::InvalidInput(format!(
            "category must be at most {} printable characters",
            MAX_CATEGORY_LEN
        )));
    }
    Ok(category.to_string())
}

/// Owner paths, optionally with a download link each
#[derive(Debug, Clone)]
pub enum PathListing {
    Paths(Vec<String>),
    Links(Vec<(String, String)>),
}

/// A freshly issued share token and the link that redeems it
#[derive(Debug, Clone)]
pub struct ShareGrant {
    pub token: ShareToken,
    pub share_link: String,
}

/// What a token holder receives on redemption
#[derive(Debug, Clone)]
pub struct SharedFile {
    pub record: FileRecord,
    pub download_url: String,
    pub expires_in_seconds: u64,
}

#[derive(Clone)]
pub struct FileService {
    metadata: Arc<dyn MetadataStore>,
    storage: Arc<dyn Storage>,
    links: LinkIssuer,
    registry: ShareTokenRegistry,
    validator: UploadValidator,
    clock: Arc<dyn Clock>,
    public_base_url: String,
    download_link_ttl: Duration,
    listing_link_ttl: Duration,
}

impl FileService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        storage: Arc<dyn Storage>,
        links: LinkIssuer,
        registry: ShareTokenRegistry,
        validator: UploadValidator,
        clock: Arc<dyn Clock>,
        public_base_url: impl Into<String>,
        download_link_ttl: Duration,
        listing_link_ttl: Duration,
    ) -> Self {
        Self {
            metadata,
            storage,
            links,
            registry,
            validator,
            clock,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            download_link_ttl,
            listing_link_ttl,
        }
    }

    pub fn validator(&self) -> &UploadValidator {
        &self.validator
    }

    pub fn registry(&self) -> &ShareTokenRegistry {
        &self.registry
    }

    /// Store a new document for `principal`.
    ///
    /// Bytes are written before metadata. The blob write never replaces an
    /// existing object, so a path collision fails before any bytes land and
    /// a blob that was written belongs to this call alone. If the metadata
    /// write then fails the blob is removed again.
    pub async fn upload(
        &self,
        principal: &Principal,
        original_name: &str,
        data: Bytes,
        category: Option<&str>,
    ) -> Result<FileRecord, AppError> {
        let extension = self.validator.validate(original_name, data.len())?;
        let category = normalize_category(category)?;

        let now = self.clock.now();
        let storage_path = generate_storage_path(&principal.principal_id, original_name, now);

        match self.metadata.get(&storage_path).await {
            Ok(_) => {
                return Err(AppError::InternalConflict(format!(
                    "Storage path already exists: {}",
                    storage_path
                )));
            }
            Err(AppError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let checksum = hex::encode(Sha256::digest(&data));
        let size_bytes = data.len() as u64;

        self.storage
            .upload_with_key(&storage_path, data, content_type_for(&extension))
            .await?;

        let record = FileRecord {
            file_id: Uuid::new_v4(),
            owner_id: principal.principal_id.clone(),
            storage_path: storage_path.clone(),
            original_name: original_name.to_string(),
            size_bytes,
            checksum,
            created_at: now,
            verified: false,
            category,
        };

        if let Err(e) = self.metadata.put(record.clone()).await {
            if let Err(cleanup) = self.storage.delete(&storage_path).await {
                tracing::error!(
                    error = %cleanup,
                    storage_path = %storage_path,
                    "Failed to remove orphaned blob after metadata failure"
                );
            }
            return Err(e);
        }

        tracing::info!(
            target: "audit",
            event = "file.uploaded",
            principal = %principal.principal_id,
            file_id = %record.file_id,
            storage_path = %record.storage_path,
            size_bytes = record.size_bytes,
            "File uploaded"
        );

        Ok(record)
    }

    pub async fn list_user_files(
        &self,
        principal: &Principal,
        owner_id: &str,
        page: Option<usize>,
        size: Option<usize>,
        verified_only: bool,
    ) -> Result<Page, AppError> {
        can_access_owner(principal, owner_id, Operation::List)
            .require(|| "Access denied".to_string())?;

        let mut records = self.metadata.list_by_owner(owner_id).await?;
        if verified_only {
            records.retain(|r| r.verified);
        }
        paginate(records, page, size, USER_LISTING_PAGE_SIZE)
    }

    pub async fn list_all_files(
        &self,
        principal: &Principal,
        page: Option<usize>,
        size: Option<usize>,
    ) -> Result<Page, AppError> {
        can_access_owner(principal, "", Operation::AdminList)
            .require(|| "Administrator role required".to_string())?;

        let records = self.metadata.list_all().await?;
        paginate(records, page, size, ADMIN_LISTING_PAGE_SIZE)
    }

    pub async fn download_links(
        &self,
        principal: &Principal,
        paths: &[String],
    ) -> Vec<(String, LinkOutcome)> {
        self.links
            .issue_batch(principal, paths, self.download_link_ttl)
            .await
    }

    pub async fn list_paths(
        &self,
        principal: &Principal,
        owner_id: &str,
        include_links: bool,
    ) -> Result<PathListing, AppError> {
        can_access_owner(principal, owner_id, Operation::List)
            .require(|| "Access denied".to_string())?;

        let records = self.metadata.list_by_owner(owner_id).await?;
        if !include_links {
            return Ok(PathListing::Paths(
                records.into_iter().map(|r| r.storage_path).collect(),
            ));
        }

        let mut links = Vec::with_capacity(records.len());
        for record in &records {
            let url = self.links.issue_link(record, self.listing_link_ttl).await?;
            links.push((record.storage_path.clone(), url));
        }
        Ok(PathListing::Links(links))
    }

    pub fn share_link(&self, token_id: &str) -> String {
        format!("{}/api/files/shared/{}", self.public_base_url, token_id)
    }

    pub async fn share(
        &self,
        principal: &Principal,
        file_id: Uuid,
        ttl_hours: Option<i64>,
        max_uses: Option<i64>,
    ) -> Result<ShareGrant, AppError> {
        let token = self
            .registry
            .issue(principal, file_id, ttl_hours, max_uses)
            .await?;
        let share_link = self.share_link(&token.token_id);
        Ok(ShareGrant { token, share_link })
    }

    /// Spend one use of `token_id` and hand out a fresh download link.
    pub async fn redeem(&self, token_id: &str) -> Result<SharedFile, AppError> {
        let redemption = match self.registry.redeem(token_id).await {
            Ok(redemption) => redemption,
            Err(AppError::NotFound(message)) => {
                // A known token whose file is gone may free a retained blob.
                if let Ok(token) = self.registry.get(token_id).await {
                    self.release_inert_blobs(token.file_id).await;
                }
                return Err(AppError::NotFound(message));
            }
            Err(e) => return Err(e),
        };
        let download_url = self
            .links
            .issue_link(&redemption.record, self.download_link_ttl)
            .await?;

        Ok(SharedFile {
            record: redemption.record,
            download_url,
            expires_in_seconds: self.download_link_ttl.as_secs(),
        })
    }

    pub async fn revoke_share(
        &self,
        principal: &Principal,
        token_id: &str,
    ) -> Result<ShareToken, AppError> {
        let token = self.registry.revoke(principal, token_id).await?;
        self.release_inert_blobs(token.file_id).await;
        Ok(token)
    }

    pub async fn list_shares(
        &self,
        principal: &Principal,
        file_id: Uuid,
    ) -> Result<Vec<ShareToken>, AppError> {
        self.registry.list_for_file(principal, file_id).await
    }

    pub async fn update_category(
        &self,
        principal: &Principal,
        file_id: Uuid,
        category: &str,
    ) -> Result<FileRecord, AppError> {
        let record = self.metadata.get_by_file_id(file_id).await?;
        can_access(principal, &record, Operation::Write)
            .require(|| "Only the owner can change this file".to_string())?;

        let category = normalize_category(Some(category))?;
        self.metadata
            .update_category(&record.storage_path, &category)
            .await
    }

    /// Remove a file. The record goes first and the blob follows, unless a
    /// share token for the file could still be redeemed. Such a blob is kept
    /// and released by [`FileService::sweep_retained_blobs`] once every token
    /// has expired, run out of uses or been revoked. Blob failures are logged
    /// only.
    pub async fn delete(
        &self,
        principal: &Principal,
        storage_path: &str,
    ) -> Result<FileRecord, AppError> {
        let record = self.metadata.get(storage_path).await?;
        can_access(principal, &record, Operation::Delete)
            .require(|| "Not allowed to delete this file".to_string())?;

        let retain = match self.registry.outstanding_for_file(record.file_id).await {
            Ok(0) => false,
            Ok(outstanding) => {
                tracing::warn!(
                    storage_path = %storage_path,
                    outstanding,
                    "Blob retained while share tokens are outstanding"
                );
                true
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    storage_path = %storage_path,
                    "Could not count share tokens; blob retained"
                );
                true
            }
        };

        let record = if retain {
            self.metadata
                .delete_retaining_blob(storage_path, self.clock.now())
                .await?
        } else {
            self.metadata.delete(storage_path).await?
        };

        tracing::info!(
            target: "audit",
            event = "file.deleted",
            principal = %principal.principal_id,
            file_id = %record.file_id,
            storage_path = %record.storage_path,
            blob_retained = retain,
            "File deleted"
        );

        if !retain {
            if let Err(e) = self.storage.delete(storage_path).await {
                tracing::error!(
                    error = %e,
                    storage_path = %storage_path,
                    "Failed to delete blob for removed file"
                );
            }
        }

        Ok(record)
    }

    /// Delete every retained blob whose file no longer has a redeemable share
    /// token. Returns how many blobs were removed.
    #[tracing::instrument(skip(self))]
    pub async fn sweep_retained_blobs(&self) -> Result<usize, AppError> {
        self.release_retained(None).await
    }

    async fn release_retained(&self, file_id: Option<Uuid>) -> Result<usize, AppError> {
        let mut released = 0;

        let blobs = self.metadata.retained_blobs().await?;
        for blob in blobs
            .into_iter()
            .filter(|b| file_id.is_none_or(|id| id == b.file_id))
        {
            match self.registry.outstanding_for_file(blob.file_id).await {
                Ok(0) => {}
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        storage_path = %blob.storage_path,
                        "Could not count share tokens; retained blob skipped"
                    );
                    continue;
                }
            }

            // A live record at the path owns the bytes now.
            let reused = match self.metadata.get(&blob.storage_path).await {
                Ok(_) => true,
                Err(AppError::NotFound(_)) => false,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        storage_path = %blob.storage_path,
                        "Could not check path; retained blob skipped"
                    );
                    continue;
                }
            };

            if !reused {
                if let Err(e) = self.storage.delete(&blob.storage_path).await {
                    tracing::error!(
                        error = %e,
                        storage_path = %blob.storage_path,
                        "Failed to delete retained blob"
                    );
                    continue;
                }
            }

            self.metadata.release_blob(&blob.storage_path).await?;
            released += 1;

            tracing::info!(
                target: "audit",
                event = "file.blob_released",
                file_id = %blob.file_id,
                storage_path = %blob.storage_path,
                "Retained blob released"
            );
        }

        Ok(released)
    }

    async fn release_inert_blobs(&self, file_id: Uuid) {
        if let Err(e) = self.release_retained(Some(file_id)).await {
            tracing::warn!(error = %e, "Retained blob sweep failed");
        }
    }

    /// Readiness of every collaborator the service depends on.
    pub async fn check_metadata(&self) -> Result<(), AppError> {
        self.metadata.ping().await
    }

    pub async fn check_storage(&self) -> Result<(), AppError> {
        self.storage.exists(".readiness-probe").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(n: usize) -> Vec<FileRecord> {
        (0..n)
            .map(|i| FileRecord {
                file_id: Uuid::new_v4(),
                owner_id: "u".to_string(),
                storage_path: format!("files/u/{}.pdf", i),
                original_name: format!("{}.pdf", i),
                size_bytes: 1,
                checksum: "00".repeat(32),
                created_at: chrono::Utc::now(),
                verified: false,
                category: "general".to_string(),
            })
            .collect()
    }

    #[test]
    fn test_paginate_defaults_and_bounds() {
        let page = paginate(records(45), None, None, 20).unwrap();
        assert_eq!(page.total, 45);
        assert_eq!(page.page, 1);
        assert_eq!(page.items.len(), 20);

        let page = paginate(records(45), Some(3), None, 20).unwrap();
        assert_eq!(page.items.len(), 5);
        assert_eq!(page.items[0].storage_path, "files/u/40.pdf");

        let page = paginate(records(45), Some(9), None, 20).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 45);
    }

    #[test]
    fn test_paginate_clamps_and_rejects() {
        let page = paginate(records(5), None, Some(1000), 20).unwrap();
        assert_eq!(page.page_size, MAX_PAGE_SIZE);
        assert!(matches!(
            paginate(records(5), Some(0), None, 20),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            paginate(records(5), None, Some(0), 20),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_category_normalization() {
        assert_eq!(normalize_category(None).unwrap(), DEFAULT_CATEGORY);
        assert_eq!(normalize_category(Some("  ")).unwrap(), DEFAULT_CATEGORY);
        assert_eq!(normalize_category(Some(" identity ")).unwrap(), "identity");
        assert!(normalize_category(Some(&"x".repeat(65))).is_err());
    }
}
