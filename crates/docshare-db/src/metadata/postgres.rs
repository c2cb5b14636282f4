use super::{id_not_found, path_not_found, MetadataStore, RetainedBlob};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docshare_core::{AppError, FileRecord};
use sqlx::PgPool;
use uuid::Uuid;

const FILE_COLUMNS: &str = "file_id, owner_id, storage_path, original_name, size_bytes, checksum, created_at, verified, category";

#[derive(sqlx::FromRow)]
struct FileRow {
    file_id: Uuid,
    owner_id: String,
    storage_path: String,
    original_name: String,
    size_bytes: i64,
    checksum: String,
    created_at: DateTime<Utc>,
    verified: bool,
    category: String,
}

impl From<FileRow> for FileRecord {
    fn from(row: FileRow) -> Self {
        FileRecord {
            file_id: row.file_id,
            owner_id: row.owner_id,
            storage_path: row.storage_path,
            original_name: row.original_name,
            size_bytes: row.size_bytes.max(0) as u64,
            checksum: row.checksum,
            created_at: row.created_at,
            verified: row.verified,
            category: row.category,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RetainedRow {
    storage_path: String,
    file_id: Uuid,
    retained_at: DateTime<Utc>,
}

impl From<RetainedRow> for RetainedBlob {
    fn from(row: RetainedRow) -> Self {
        RetainedBlob {
            storage_path: row.storage_path,
            file_id: row.file_id,
            retained_at: row.retained_at,
        }
    }
}

/// PostgreSQL-backed metadata store
#[derive(Clone)]
pub struct PgMetadataStore {
    pool: PgPool,
}

impl PgMetadataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    async fn put(&self, record: FileRecord) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO files (
                file_id, owner_id, storage_path, original_name, size_bytes,
                checksum, created_at, verified, category
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.file_id)
        .bind(&record.owner_id)
        .bind(&record.storage_path)
        .bind(&record.original_name)
        .bind(record.size_bytes as i64)
        .bind(&record.checksum)
        .bind(record.created_at)
        .bind(record.verified)
        .bind(&record.category)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(AppError::InternalConflict(format!(
                    "File record already exists: {}",
                    record.storage_path
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, storage_path: &str) -> Result<FileRecord, AppError> {
        let row = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {} FROM files WHERE storage_path = $1",
            FILE_COLUMNS
        ))
        .bind(storage_path)
        .fetch_optional(&self.pool)
        .await?;

        row.map(FileRecord::from)
            .ok_or_else(|| path_not_found(storage_path))
    }

    async fn get_by_file_id(&self, file_id: Uuid) -> Result<FileRecord, AppError> {
        let row = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {} FROM files WHERE file_id = $1",
            FILE_COLUMNS
        ))
        .bind(file_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(FileRecord::from).ok_or_else(|| id_not_found(file_id))
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<FileRecord>, AppError> {
        let rows = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {} FROM files WHERE owner_id = $1 ORDER BY seq",
            FILE_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FileRecord::from).collect())
    }

    async fn list_all(&self) -> Result<Vec<FileRecord>, AppError> {
        let rows = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {} FROM files ORDER BY seq",
            FILE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FileRecord::from).collect())
    }

    async fn delete(&self, storage_path: &str) -> Result<FileRecord, AppError> {
        let row = sqlx::query_as::<_, FileRow>(&format!(
            "DELETE FROM files WHERE storage_path = $1 RETURNING {}",
            FILE_COLUMNS
        ))
        .bind(storage_path)
        .fetch_optional(&self.pool)
        .await?;

        row.map(FileRecord::from)
            .ok_or_else(|| path_not_found(storage_path))
    }

    async fn delete_retaining_blob(
        &self,
        storage_path: &str,
        now: DateTime<Utc>,
    ) -> Result<FileRecord, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, FileRow>(&format!(
            "DELETE FROM files WHERE storage_path = $1 RETURNING {}",
            FILE_COLUMNS
        ))
        .bind(storage_path)
        .fetch_optional(&mut *tx)
        .await?;
        let record = row
            .map(FileRecord::from)
            .ok_or_else(|| path_not_found(storage_path))?;

        sqlx::query(
            r#"
            INSERT INTO retained_blobs (storage_path, file_id, retained_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (storage_path) DO NOTHING
            "#,
        )
        .bind(&record.storage_path)
        .bind(record.file_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(record)
    }

    async fn retained_blobs(&self) -> Result<Vec<RetainedBlob>, AppError> {
        let rows = sqlx::query_as::<_, RetainedRow>(
            "SELECT storage_path, file_id, retained_at FROM retained_blobs ORDER BY retained_at, storage_path",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RetainedBlob::from).collect())
    }

    async fn release_blob(&self, storage_path: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM retained_blobs WHERE storage_path = $1")
            .bind(storage_path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_category(
        &self,
        storage_path: &str,
        category: &str,
    ) -> Result<FileRecord, AppError> {
        let row = sqlx::query_as::<_, FileRow>(&format!(
            "UPDATE files SET category = $2 WHERE storage_path = $1 RETURNING {}",
            FILE_COLUMNS
        ))
        .bind(storage_path)
        .bind(category)
        .fetch_optional(&self.pool)
        .await?;

        row.map(FileRecord::from)
            .ok_or_else(|| path_not_found(storage_path))
    }

    async fn set_verified(
        &self,
        storage_path: &str,
        verified: bool,
    ) -> Result<FileRecord, AppError> {
        let row = sqlx::query_as::<_, FileRow>(&format!(
            "UPDATE files SET verified = $2 WHERE storage_path = $1 RETURNING {}",
            FILE_COLUMNS
        ))
        .bind(storage_path)
        .bind(verified)
        .fetch_optional(&self.pool)
        .await?;

        row.map(FileRecord::from)
            .ok_or_else(|| path_not_found(storage_path))
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
