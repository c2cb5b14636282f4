//! Share token persistence and the registry that issues and redeems tokens.

mod memory;
mod postgres;
mod registry;

pub use memory::InMemoryShareTokenStore;
pub use postgres::PgShareTokenStore;
pub use registry::{
    generate_token_id, Redemption, SharePolicy, ShareTokenRegistry, TokenIdGenerator,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docshare_core::{AppError, ShareToken};
use uuid::Uuid;

/// Result of an atomic redemption attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// One use was taken. Carries the token after the decrement.
    Consumed(ShareToken),
    Expired,
    Exhausted,
    Missing,
}

#[async_trait]
pub trait ShareTokenStore: Send + Sync {
    /// Insert a freshly issued token. An existing id fails with
    /// [`AppError::InternalConflict`] and the stored token is not touched.
    async fn insert(&self, token: ShareToken) -> Result<(), AppError>;

    async fn get(&self, token_id: &str) -> Result<Option<ShareToken>, AppError>;

    /// Check validity at `now` and take one use, as a single indivisible step.
    ///
    /// For any token, concurrent calls succeed at most `uses_remaining` times
    /// in total.
    async fn consume(&self, token_id: &str, now: DateTime<Utc>)
        -> Result<ConsumeOutcome, AppError>;

    /// Force `uses_remaining` to zero. Returns `None` for an unknown id.
    async fn revoke(&self, token_id: &str) -> Result<Option<ShareToken>, AppError>;

    /// Tokens issued for `file_id`, oldest first.
    async fn list_for_file(&self, file_id: Uuid) -> Result<Vec<ShareToken>, AppError>;

    async fn ping(&self) -> Result<(), AppError>;
}
