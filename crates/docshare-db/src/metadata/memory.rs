use super::{id_not_found, path_not_found, MetadataStore, RetainedBlob};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docshare_core::{AppError, FileRecord};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    next_seq: u64,
    /// Primary storage, ordered by insertion sequence
    records: BTreeMap<u64, FileRecord>,
    by_path: HashMap<String, u64>,
    by_id: HashMap<Uuid, u64>,
    by_owner: HashMap<String, BTreeSet<u64>>,
    retained: HashMap<String, RetainedBlob>,
}

impl Inner {
    fn seq_for_path(&self, storage_path: &str) -> Result<u64, AppError> {
        self.by_path
            .get(storage_path)
            .copied()
            .ok_or_else(|| path_not_found(storage_path))
    }

    fn remove(&mut self, storage_path: &str) -> Result<FileRecord, AppError> {
        let seq = self
            .by_path
            .remove(storage_path)
            .ok_or_else(|| path_not_found(storage_path))?;
        let record = self
            .records
            .remove(&seq)
            .ok_or_else(|| AppError::Internal(format!("Dangling path index for {}", storage_path)))?;
        self.by_id.remove(&record.file_id);
        if let Some(seqs) = self.by_owner.get_mut(&record.owner_id) {
            seqs.remove(&seq);
            if seqs.is_empty() {
                self.by_owner.remove(&record.owner_id);
            }
        }
        Ok(record)
    }

    fn record_mut(&mut self, storage_path: &str) -> Result<&mut FileRecord, AppError> {
        let seq = self.seq_for_path(storage_path)?;
        self.records
            .get_mut(&seq)
            .ok_or_else(|| AppError::Internal(format!("Dangling path index for {}", storage_path)))
    }
}

/// Process-local metadata store.
///
/// Every mutation runs inside one write guard with no await in between, so
/// readers never observe a record present in one index and absent from another.
#[derive(Default)]
pub struct InMemoryMetadataStore {
    inner: RwLock<Inner>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn put(&self, record: FileRecord) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;

        if inner.by_path.contains_key(&record.storage_path) {
            return Err(AppError::InternalConflict(format!(
                "Storage path already exists: {}",
                record.storage_path
            )));
        }
        if inner.by_id.contains_key(&record.file_id) {
            return Err(AppError::InternalConflict(format!(
                "File id already exists: {}",
                record.file_id
            )));
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.by_path.insert(record.storage_path.clone(), seq);
        inner.by_id.insert(record.file_id, seq);
        inner
            .by_owner
            .entry(record.owner_id.clone())
            .or_default()
            .insert(seq);
        inner.records.insert(seq, record);

        Ok(())
    }

    async fn get(&self, storage_path: &str) -> Result<FileRecord, AppError> {
        let inner = self.inner.read().await;
        let seq = inner.seq_for_path(storage_path)?;
        inner
            .records
            .get(&seq)
            .cloned()
            .ok_or_else(|| path_not_found(storage_path))
    }

    async fn get_by_file_id(&self, file_id: Uuid) -> Result<FileRecord, AppError> {
        let inner = self.inner.read().await;
        inner
            .by_id
            .get(&file_id)
            .and_then(|seq| inner.records.get(seq))
            .cloned()
            .ok_or_else(|| id_not_found(file_id))
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<FileRecord>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_owner
            .get(owner_id)
            .map(|seqs| {
                seqs.iter()
                    .filter_map(|seq| inner.records.get(seq))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_all(&self) -> Result<Vec<FileRecord>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.records.values().cloned().collect())
    }

    async fn delete(&self, storage_path: &str) -> Result<FileRecord, AppError> {
        self.inner.write().await.remove(storage_path)
    }

    async fn delete_retaining_blob(
        &self,
        storage_path: &str,
        now: DateTime<Utc>,
    ) -> Result<FileRecord, AppError> {
        let mut inner = self.inner.write().await;
        let record = inner.remove(storage_path)?;
        inner
            .retained
            .entry(record.storage_path.clone())
            .or_insert_with(|| RetainedBlob {
                storage_path: record.storage_path.clone(),
                file_id: record.file_id,
                retained_at: now,
            });
        Ok(record)
    }

    async fn retained_blobs(&self) -> Result<Vec<RetainedBlob>, AppError> {
        let inner = self.inner.read().await;
        let mut blobs: Vec<RetainedBlob> = inner.retained.values().cloned().collect();
        blobs.sort_by(|a, b| {
            a.retained_at
                .cmp(&b.retained_at)
                .then_with(|| a.storage_path.cmp(&b.storage_path))
        });
        Ok(blobs)
    }

    async fn release_blob(&self, storage_path: &str) -> Result<(), AppError> {
        self.inner.write().await.retained.remove(storage_path);
        Ok(())
    }

    async fn update_category(
        &self,
        storage_path: &str,
        category: &str,
    ) -> Result<FileRecord, AppError> {
        let mut inner = self.inner.write().await;
        let record = inner.record_mut(storage_path)?;
        record.category = category.to_string();
        Ok(record.clone())
    }

    async fn set_verified(
        &self,
        storage_path: &str,
        verified: bool,
    ) -> Result<FileRecord, AppError> {
        let mut inner = self.inner.write().await;
        let record = inner.record_mut(storage_path)?;
        record.verified = verified;
        Ok(record.clone())
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
