//! Metadata and share token persistence
//!
//! Both stores sit behind async traits with an in-memory implementation and a
//! PostgreSQL implementation. The share token registry composes them with the
//! access control evaluator.

pub mod metadata;
pub mod pool;
pub mod share_token;

pub use metadata::{InMemoryMetadataStore, MetadataStore, PgMetadataStore, RetainedBlob};
pub use pool::{setup_database, MIGRATOR};
pub use share_token::{
    generate_token_id, ConsumeOutcome, InMemoryShareTokenStore, PgShareTokenStore, Redemption,
    SharePolicy, ShareTokenRegistry, ShareTokenStore, TokenIdGenerator,
};
