//! docshare storage library
//!
//! Blob storage abstraction plus the URL signing capability used to hand out
//! expiring download links.
//!
//! # Storage key format
//!
//! Every document lives at `files/{owner_id}/{stem}_{YYYYMMDDTHHMMSSmmm}{.ext}`.
//! Keys must not contain `..` or a leading `/`. Key generation is centralized in
//! the `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod signer;
pub mod traits;

// Re-export commonly used types
pub use docshare_core::StorageBackend;
pub use factory::{create_storage, StorageHandles};
pub use keys::{generate_storage_path, validate_storage_key};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use signer::{HmacUrlSigner, SignatureError, UrlSigner};
pub use traits::{Storage, StorageError, StorageResult};
