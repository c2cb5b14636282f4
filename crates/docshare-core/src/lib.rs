//! docshare core library
//!
//! Domain models, the access control evaluator, error types, configuration and
//! upload validation shared by every docshare component.

pub mod access;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;
pub mod validation;

// Re-export commonly used types
pub use access::{can_access, can_access_owner, Decision, Operation};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    AuthConfig, AuthMode, BaseConfig, Config, MetadataBackend, ShareConfig, StorageConfig,
    UploadConfig,
};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{FileRecord, Principal, Role, ShareToken, TokenState};
pub use storage_types::StorageBackend;
pub use validation::{content_type_for, UploadValidator, ValidationError};
