//! Error types module
//!
//! All errors surfaced by the core are unified under [`AppError`]. Each variant
//! self-describes how it is presented to clients through [`ErrorMetadata`], so
//! the HTTP layer only has to wrap it.
//!
//! The `Database` variant carries a `sqlx::Error` when the `sqlx` feature is on,
//! and a plain message otherwise.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected errors such as validation failures or denied access
    Debug,
    /// Recoverable or suspicious conditions
    Warn,
    /// Unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "TOKEN_INVALID")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden from clients
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("File too large: {0}")]
    PayloadTooLarge(String),

    /// Expired or exhausted share token. Both cases carry the same message.
    #[error("Share token is no longer valid")]
    TokenInvalid,

    #[error("Identifier conflict: {0}")]
    InternalConflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("UUID parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Storage(_) => (
            500,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the resource ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::Forbidden(_) => (
            403,
            "FORBIDDEN",
            false,
            Some("Request access from the file owner"),
            false,
            LogLevel::Debug,
        ),
        AppError::Unauthorized(_) => (
            401,
            "UNAUTHORIZED",
            false,
            Some("Check the bearer token"),
            false,
            LogLevel::Debug,
        ),
        AppError::PayloadTooLarge(_) => (
            413,
            "PAYLOAD_TOO_LARGE",
            false,
            Some("Reduce file size"),
            false,
            LogLevel::Debug,
        ),
        AppError::TokenInvalid => (
            404,
            "TOKEN_INVALID",
            false,
            Some("Ask the owner for a new share link"),
            false,
            LogLevel::Debug,
        ),
        AppError::InternalConflict(_) => (
            500,
            "INTERNAL_CONFLICT",
            true,
            Some("Retry the request"),
            true,
            LogLevel::Error,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Storage(_) => "Storage",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::NotFound(_) => "NotFound",
            AppError::Forbidden(_) => "Forbidden",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::TokenInvalid => "TokenInvalid",
            AppError::InternalConflict(_) => "InternalConflict",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::Forbidden(ref msg) => msg.clone(),
            AppError::Unauthorized(ref msg) => msg.clone(),
            AppError::PayloadTooLarge(ref msg) => msg.clone(),
            AppError::TokenInvalid => "Share token is no longer valid".to_string(),
            AppError::InternalConflict(_) => "Internal server error".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::InternalWithSource { .. } => "Internal server error".to_string(),
        }
    }
}
