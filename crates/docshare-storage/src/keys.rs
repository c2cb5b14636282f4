//! Shared key generation for storage backends.

use chrono::{DateTime, Utc};
use std::path::Path;

use crate::{StorageError, StorageResult};

/// Generate the storage key for a document uploaded by `owner_id`.
///
/// Produces `files/{owner_id}/{stem}_{YYYYMMDDTHHMMSSmmm}{.ext}` where the
/// timestamp is `now` in UTC with millisecond precision. The extension is
/// lowercased; a name without one gets no suffix.
pub fn generate_storage_path(owner_id: &str, original_name: &str, now: DateTime<Utc>) -> String {
    let path = Path::new(original_name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("file");
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default();
    let timestamp = now.format("%Y%m%dT%H%M%S%3f");

    format!("files/{}/{}_{}{}", owner_id, stem, timestamp, extension)
}

/// Reject keys that could escape the storage root. Dots inside a segment
/// are fine; a segment that is exactly `.` or `..` is not.
pub fn validate_storage_key(storage_key: &str) -> StorageResult<()> {
    if storage_key.is_empty()
        || storage_key.split('/').any(|segment| segment == "." || segment == "..")
        || storage_key.starts_with('/')
        || storage_key.contains('\\')
    {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_storage_path_layout() {
        let now = Utc
            .with_ymd_and_hms(2024, 3, 9, 14, 5, 7)
            .single()
            .unwrap()
            + chrono::Duration::milliseconds(42);
        assert_eq!(
            generate_storage_path("user-7", "Passport Scan.PDF", now),
            "files/user-7/Passport Scan_20240309T140507042.pdf"
        );
    }

    #[test]
    fn test_storage_path_without_extension() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap();
        assert_eq!(
            generate_storage_path("u", "notes", now),
            "files/u/notes_20240101T000000000"
        );
    }

    #[test]
    fn test_validate_storage_key() {
        assert!(validate_storage_key("files/u/a.pdf").is_ok());
        assert!(validate_storage_key("files/u/scan..v2_20240101T000000000.pdf").is_ok());
        assert!(validate_storage_key("../etc/passwd").is_err());
        assert!(validate_storage_key("files/u/../../etc/passwd").is_err());
        assert!(validate_storage_key("files/./u/a.pdf").is_err());
        assert!(validate_storage_key("/etc/passwd").is_err());
        assert!(validate_storage_key("").is_err());
    }
}
