//! API route constants

/// Prefix of every authenticated file route
pub const API_PREFIX: &str = "/api/files";

/// Route serving HMAC-signed local blob links
pub const BLOB_PREFIX: &str = "/blob";

/// Service name reported by the health endpoint
pub const SERVICE_NAME: &str = "document-service";
