use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Descriptive record of one stored document.
///
/// Everything except `verified` and `category` is fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub file_id: Uuid,
    pub owner_id: String,
    pub storage_path: String,
    pub original_name: String,
    pub size_bytes: u64,
    /// SHA-256 of the uploaded bytes, lowercase hex.
    pub checksum: String,
    pub created_at: DateTime<Utc>,
    pub verified: bool,
    pub category: String,
}

impl FileRecord {
    pub fn is_owned_by(&self, principal_id: &str) -> bool {
        self.owner_id == principal_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileRecordResponse {
    pub file_id: Uuid,
    pub user_id: String,
    pub original_name: String,
    pub size_bytes: u64,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
    pub verified: bool,
    pub category: String,
    pub storage_path: String,
}

impl From<FileRecord> for FileRecordResponse {
    fn from(record: FileRecord) -> Self {
        FileRecordResponse {
            file_id: record.file_id,
            user_id: record.owner_id,
            original_name: record.original_name,
            size_bytes: record.size_bytes,
            checksum: record.checksum,
            created_at: record.created_at,
            verified: record.verified,
            category: record.category,
            storage_path: record.storage_path,
        }
    }
}
