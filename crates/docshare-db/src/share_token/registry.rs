use super::{ConsumeOutcome, ShareTokenStore};
use crate::metadata::MetadataStore;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Duration;
use docshare_core::config::ShareConfig;
use docshare_core::{
    can_access, AppError, Clock, FileRecord, Operation, Principal, ShareToken,
};
use std::sync::Arc;
use uuid::Uuid;

/// Produces token ids. Swappable so id collisions can be forced in tests.
pub type TokenIdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// 32 bytes from the thread-local CSPRNG (seeded from the OS), base64url
/// without padding.
pub fn generate_token_id() -> String {
    URL_SAFE_NO_PAD.encode(rand::random::<[u8; 32]>())
}

/// Defaults and bounds for issued tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharePolicy {
    pub default_ttl_hours: i64,
    pub default_max_uses: u32,
    pub max_ttl_hours: i64,
    pub max_uses: u32,
}

impl Default for SharePolicy {
    fn default() -> Self {
        Self::from(&ShareConfig::default())
    }
}

impl From<&ShareConfig> for SharePolicy {
    fn from(config: &ShareConfig) -> Self {
        Self {
            default_ttl_hours: config.default_ttl_hours,
            default_max_uses: config.default_max_uses,
            max_ttl_hours: config.max_ttl_hours,
            max_uses: config.max_uses,
        }
    }
}

impl SharePolicy {
    fn resolve_ttl(&self, ttl_hours: Option<i64>) -> Result<i64, AppError> {
        let ttl = ttl_hours.unwrap_or(self.default_ttl_hours);
        if ttl <= 0 || ttl > self.max_ttl_hours {
            return Err(AppError::InvalidInput(format!(
                "expiration_hours must be between 1 and {}",
                self.max_ttl_hours
            )));
        }
        Ok(ttl)
    }

    fn resolve_max_uses(&self, max_uses: Option<i64>) -> Result<u32, AppError> {
        let uses = max_uses.unwrap_or(i64::from(self.default_max_uses));
        if uses <= 0 || uses > i64::from(self.max_uses) {
            return Err(AppError::InvalidInput(format!(
                "max_downloads must be between 1 and {}",
                self.max_uses
            )));
        }
        u32::try_from(uses).map_err(|_| AppError::InvalidInput("max_downloads out of range".into()))
    }
}

/// A successful redemption: the token after its use was taken, and the file
/// it grants access to.
#[derive(Debug, Clone)]
pub struct Redemption {
    pub token: ShareToken,
    pub record: FileRecord,
}

/// Short, non-secret prefix of a token id for logs.
fn fingerprint(token_id: &str) -> &str {
    let end = token_id
        .char_indices()
        .nth(8)
        .map(|(i, _)| i)
        .unwrap_or(token_id.len());
    &token_id[..end]
}

/// Issues, redeems, revokes and inspects share tokens.
#[derive(Clone)]
pub struct ShareTokenRegistry {
    metadata: Arc<dyn MetadataStore>,
    tokens: Arc<dyn ShareTokenStore>,
    clock: Arc<dyn Clock>,
    policy: SharePolicy,
    id_generator: TokenIdGenerator,
}

impl ShareTokenRegistry {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        tokens: Arc<dyn ShareTokenStore>,
        clock: Arc<dyn Clock>,
        policy: SharePolicy,
    ) -> Self {
        Self {
            metadata,
            tokens,
            clock,
            policy,
            id_generator: Arc::new(generate_token_id),
        }
    }

    pub fn with_id_generator(mut self, id_generator: TokenIdGenerator) -> Self {
        self.id_generator = id_generator;
        self
    }

    pub fn policy(&self) -> &SharePolicy {
        &self.policy
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Issue a token granting read access to `file_id`.
    ///
    /// Only a principal allowed to write the file may share it. Missing
    /// parameters fall back to the policy defaults.
    pub async fn issue(
        &self,
        issuer: &Principal,
        file_id: Uuid,
        ttl_hours: Option<i64>,
        max_uses: Option<i64>,
    ) -> Result<ShareToken, AppError> {
        let record = self.metadata.get_by_file_id(file_id).await?;
        can_access(issuer, &record, Operation::Write)
            .require(|| "Only the owner can share this file".to_string())?;

        let ttl_hours = self.policy.resolve_ttl(ttl_hours)?;
        let max_uses = self.policy.resolve_max_uses(max_uses)?;

        let now = self.clock.now();
        let token = ShareToken {
            token_id: (self.id_generator)(),
            file_id,
            issuer_id: issuer.principal_id.clone(),
            created_at: now,
            expires_at: now + Duration::hours(ttl_hours),
            max_uses,
            uses_remaining: max_uses,
        };

        self.tokens.insert(token.clone()).await?;

        tracing::info!(
            target: "audit",
            event = "share.issued",
            issuer = %issuer.principal_id,
            file_id = %file_id,
            token = %fingerprint(&token.token_id),
            ttl_hours,
            max_uses,
            "Share token issued"
        );

        Ok(token)
    }

    /// Redeem one use of a token.
    ///
    /// The use is taken before the file is resolved. If the file was deleted
    /// in the meantime the call fails with `NotFound` and the use stays spent.
    pub async fn redeem(&self, token_id: &str) -> Result<Redemption, AppError> {
        let now = self.clock.now();

        let token = match self.tokens.consume(token_id, now).await? {
            ConsumeOutcome::Consumed(token) => token,
            ConsumeOutcome::Missing => {
                return Err(AppError::NotFound("Share token not found".to_string()));
            }
            ConsumeOutcome::Expired => {
                tracing::info!(
                    target: "audit",
                    event = "share.rejected",
                    reason = "expired",
                    token = %fingerprint(token_id),
                    "Share token redemption rejected"
                );
                return Err(AppError::TokenInvalid);
            }
            ConsumeOutcome::Exhausted => {
                tracing::info!(
                    target: "audit",
                    event = "share.rejected",
                    reason = "exhausted",
                    token = %fingerprint(token_id),
                    "Share token redemption rejected"
                );
                return Err(AppError::TokenInvalid);
            }
        };

        let record = match self.metadata.get_by_file_id(token.file_id).await {
            Ok(record) => record,
            Err(AppError::NotFound(_)) => {
                tracing::warn!(
                    token = %fingerprint(token_id),
                    file_id = %token.file_id,
                    "Share token redeemed for a deleted file"
                );
                return Err(AppError::NotFound(
                    "Shared file no longer exists".to_string(),
                ));
            }
            Err(e) => return Err(e),
        };

        tracing::info!(
            target: "audit",
            event = "share.redeemed",
            token = %fingerprint(token_id),
            file_id = %token.file_id,
            uses_remaining = token.uses_remaining,
            "Share token redeemed"
        );

        Ok(Redemption { token, record })
    }

    /// Make a token permanently inert. Allowed for its issuer and for
    /// administrators. Revoking twice is a no-op.
    pub async fn revoke(
        &self,
        principal: &Principal,
        token_id: &str,
    ) -> Result<ShareToken, AppError> {
        let token = self.get(token_id).await?;
        if token.issuer_id != principal.principal_id && !principal.is_admin() {
            return Err(AppError::Forbidden(
                "Only the issuer can revoke this share".to_string(),
            ));
        }

        let revoked = self
            .tokens
            .revoke(token_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Share token not found".to_string()))?;

        tracing::info!(
            target: "audit",
            event = "share.revoked",
            principal = %principal.principal_id,
            token = %fingerprint(token_id),
            file_id = %revoked.file_id,
            "Share token revoked"
        );

        Ok(revoked)
    }

    pub async fn get(&self, token_id: &str) -> Result<ShareToken, AppError> {
        self.tokens
            .get(token_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Share token not found".to_string()))
    }

    /// All tokens ever issued for a file, for its owner or an administrator.
    pub async fn list_for_file(
        &self,
        principal: &Principal,
        file_id: Uuid,
    ) -> Result<Vec<ShareToken>, AppError> {
        let record = self.metadata.get_by_file_id(file_id).await?;
        can_access(principal, &record, Operation::Read)
            .require(|| "Access denied".to_string())?;
        self.tokens.list_for_file(file_id).await
    }

    /// Number of tokens for `file_id` that could still be redeemed.
    pub async fn outstanding_for_file(&self, file_id: Uuid) -> Result<usize, AppError> {
        let now = self.clock.now();
        let tokens = self.tokens.list_for_file(file_id).await?;
        Ok(tokens.iter().filter(|t| t.is_active(now)).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::InMemoryMetadataStore;
    use crate::share_token::InMemoryShareTokenStore;
    use chrono::Utc;
    use docshare_core::{ManualClock, SystemClock, TokenState};

    struct Fixture {
        metadata: Arc<InMemoryMetadataStore>,
        registry: ShareTokenRegistry,
        record: FileRecord,
        owner: Principal,
    }

    async fn fixture_with_clock(clock: Arc<dyn Clock>) -> Fixture {
        let metadata = Arc::new(InMemoryMetadataStore::new());
        let tokens = Arc::new(InMemoryShareTokenStore::new());
        let record = FileRecord {
            file_id: Uuid::new_v4(),
            owner_id: "owner".to_string(),
            storage_path: "files/owner/id_20240101T000000000.pdf".to_string(),
            original_name: "id.pdf".to_string(),
            size_bytes: 512,
            checksum: "ff".repeat(32),
            created_at: Utc::now(),
            verified: false,
            category: "general".to_string(),
        };
        metadata.put(record.clone()).await.unwrap();

        let registry =
            ShareTokenRegistry::new(metadata.clone(), tokens, clock, SharePolicy::default());
        Fixture {
            metadata,
            registry,
            record,
            owner: Principal::ordinary("owner"),
        }
    }

    async fn fixture() -> Fixture {
        fixture_with_clock(Arc::new(SystemClock)).await
    }

    #[tokio::test]
    async fn test_issue_uses_policy_defaults() {
        let f = fixture().await;
        let token = f
            .registry
            .issue(&f.owner, f.record.file_id, None, None)
            .await
            .unwrap();

        assert_eq!(token.max_uses, 3);
        assert_eq!(token.uses_remaining, 3);
        assert_eq!(token.expires_at - token.created_at, Duration::hours(24));
        assert_eq!(token.issuer_id, "owner");
        assert_eq!(token.token_id.len(), 43);
        assert!(token
            .token_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[tokio::test]
    async fn test_issue_requires_write_access() {
        let f = fixture().await;
        let stranger = Principal::ordinary("stranger");
        assert!(matches!(
            f.registry.issue(&stranger, f.record.file_id, None, None).await,
            Err(AppError::Forbidden(_))
        ));

        let admin = Principal::admin("root");
        assert!(f
            .registry
            .issue(&admin, f.record.file_id, None, None)
            .await
            .is_ok());

        assert!(matches!(
            f.registry.issue(&f.owner, Uuid::new_v4(), None, None).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_issue_rejects_out_of_bounds_parameters() {
        let f = fixture().await;
        let id = f.record.file_id;
        for (ttl, uses) in [
            (Some(0), None),
            (Some(-5), None),
            (Some(721), None),
            (None, Some(0)),
            (None, Some(-1)),
            (None, Some(101)),
        ] {
            assert!(
                matches!(
                    f.registry.issue(&f.owner, id, ttl, uses).await,
                    Err(AppError::InvalidInput(_))
                ),
                "ttl={:?} uses={:?}",
                ttl,
                uses
            );
        }
        assert!(f.registry.issue(&f.owner, id, Some(720), Some(100)).await.is_ok());
    }

    #[tokio::test]
    async fn test_redeem_decrements_by_exactly_one() {
        let f = fixture().await;
        let token = f
            .registry
            .issue(&f.owner, f.record.file_id, Some(1), Some(5))
            .await
            .unwrap();

        let redemption = f.registry.redeem(&token.token_id).await.unwrap();
        assert_eq!(redemption.token.uses_remaining, 4);
        assert_eq!(redemption.record.file_id, f.record.file_id);
        assert_eq!(
            f.registry.get(&token.token_id).await.unwrap().uses_remaining,
            4
        );
    }

    #[tokio::test]
    async fn test_redeem_unknown_token_is_not_found() {
        let f = fixture().await;
        assert!(matches!(
            f.registry.redeem("does-not-exist").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_single_use_token_scenario() {
        let f = fixture().await;
        let token = f
            .registry
            .issue(&f.owner, f.record.file_id, Some(1), Some(1))
            .await
            .unwrap();

        assert!(f.registry.redeem(&token.token_id).await.is_ok());
        assert!(matches!(
            f.registry.redeem(&token.token_id).await,
            Err(AppError::TokenInvalid)
        ));
    }

    #[tokio::test]
    async fn test_expired_token_is_invalid_even_with_uses_left() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let f = fixture_with_clock(clock.clone()).await;
        let token = f
            .registry
            .issue(&f.owner, f.record.file_id, Some(1), Some(5))
            .await
            .unwrap();

        clock.advance(Duration::hours(1));
        assert!(matches!(
            f.registry.redeem(&token.token_id).await,
            Err(AppError::TokenInvalid)
        ));
        let stored = f.registry.get(&token.token_id).await.unwrap();
        assert_eq!(stored.uses_remaining, 5);
        assert_eq!(stored.state(clock.now()), TokenState::Expired);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_redemptions_never_exceed_max_uses() {
        let f = fixture().await;
        let max_uses = 10;
        let attempts = 64;
        let token = f
            .registry
            .issue(&f.owner, f.record.file_id, None, Some(max_uses))
            .await
            .unwrap();

        let handles: Vec<_> = (0..attempts)
            .map(|_| {
                let registry = f.registry.clone();
                let token_id = token.token_id.clone();
                tokio::spawn(async move { registry.redeem(&token_id).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(AppError::TokenInvalid) => {}
                Err(e) => panic!("unexpected error {:?}", e),
            }
        }

        assert_eq!(successes, max_uses);
        assert_eq!(
            f.registry.get(&token.token_id).await.unwrap().uses_remaining,
            0
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_redemptions_below_limit_all_succeed() {
        let f = fixture().await;
        let token = f
            .registry
            .issue(&f.owner, f.record.file_id, None, Some(20))
            .await
            .unwrap();

        let results = futures::future::join_all((0..12).map(|_| {
            let registry = f.registry.clone();
            let token_id = token.token_id.clone();
            tokio::spawn(async move { registry.redeem(&token_id).await })
        }))
        .await;

        assert!(results.into_iter().all(|r| r.unwrap().is_ok()));
        assert_eq!(
            f.registry.get(&token.token_id).await.unwrap().uses_remaining,
            8
        );
    }

    #[tokio::test]
    async fn test_revoke_then_redeem_is_invalid() {
        let f = fixture().await;
        let token = f
            .registry
            .issue(&f.owner, f.record.file_id, None, None)
            .await
            .unwrap();

        let revoked = f.registry.revoke(&f.owner, &token.token_id).await.unwrap();
        assert_eq!(revoked.uses_remaining, 0);
        assert!(matches!(
            f.registry.redeem(&token.token_id).await,
            Err(AppError::TokenInvalid)
        ));

        // idempotent
        assert!(f.registry.revoke(&f.owner, &token.token_id).await.is_ok());
    }

    #[tokio::test]
    async fn test_revoke_permissions() {
        let f = fixture().await;
        let token = f
            .registry
            .issue(&f.owner, f.record.file_id, None, None)
            .await
            .unwrap();

        let stranger = Principal::ordinary("stranger");
        assert!(matches!(
            f.registry.revoke(&stranger, &token.token_id).await,
            Err(AppError::Forbidden(_))
        ));
        assert_eq!(
            f.registry.get(&token.token_id).await.unwrap().uses_remaining,
            3
        );

        assert!(matches!(
            f.registry.revoke(&f.owner, "unknown").await,
            Err(AppError::NotFound(_))
        ));

        let admin = Principal::admin("root");
        assert!(f.registry.revoke(&admin, &token.token_id).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_revoke_racing_redemptions() {
        let f = fixture().await;
        let token = f
            .registry
            .issue(&f.owner, f.record.file_id, None, Some(100))
            .await
            .unwrap();

        let redeemers: Vec<_> = (0..50)
            .map(|_| {
                let registry = f.registry.clone();
                let token_id = token.token_id.clone();
                tokio::spawn(async move { registry.redeem(&token_id).await })
            })
            .collect();
        let revoker = {
            let registry = f.registry.clone();
            let owner = f.owner.clone();
            let token_id = token.token_id.clone();
            tokio::spawn(async move { registry.revoke(&owner, &token_id).await })
        };

        for handle in redeemers {
            match handle.await.unwrap() {
                Ok(_) | Err(AppError::TokenInvalid) => {}
                Err(e) => panic!("unexpected error {:?}", e),
            }
        }
        revoker.await.unwrap().unwrap();

        assert_eq!(
            f.registry.get(&token.token_id).await.unwrap().uses_remaining,
            0
        );
        assert!(matches!(
            f.registry.redeem(&token.token_id).await,
            Err(AppError::TokenInvalid)
        ));
    }

    #[tokio::test]
    async fn test_redeem_after_file_deleted_consumes_use() {
        let f = fixture().await;
        let token = f
            .registry
            .issue(&f.owner, f.record.file_id, None, Some(3))
            .await
            .unwrap();

        f.metadata.delete(&f.record.storage_path).await.unwrap();

        assert!(matches!(
            f.registry.redeem(&token.token_id).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(
            f.registry.get(&token.token_id).await.unwrap().uses_remaining,
            2
        );
    }

    #[tokio::test]
    async fn test_token_id_collision_is_internal_conflict() {
        let f = fixture().await;
        let registry = f
            .registry
            .clone()
            .with_id_generator(Arc::new(|| "fixed-id".to_string()));

        let first = registry
            .issue(&f.owner, f.record.file_id, None, Some(2))
            .await
            .unwrap();
        assert!(matches!(
            registry.issue(&f.owner, f.record.file_id, None, Some(7)).await,
            Err(AppError::InternalConflict(_))
        ));

        let stored = registry.get("fixed-id").await.unwrap();
        assert_eq!(stored, first);
    }

    #[tokio::test]
    async fn test_list_for_file_is_owner_or_admin_only() {
        let f = fixture().await;
        for _ in 0..3 {
            f.registry
                .issue(&f.owner, f.record.file_id, None, None)
                .await
                .unwrap();
        }

        assert_eq!(
            f.registry
                .list_for_file(&f.owner, f.record.file_id)
                .await
                .unwrap()
                .len(),
            3
        );
        assert_eq!(
            f.registry
                .list_for_file(&Principal::admin("root"), f.record.file_id)
                .await
                .unwrap()
                .len(),
            3
        );
        assert!(matches!(
            f.registry
                .list_for_file(&Principal::ordinary("stranger"), f.record.file_id)
                .await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_outstanding_counts_only_redeemable_tokens() {
        let f = fixture().await;
        let spent = f
            .registry
            .issue(&f.owner, f.record.file_id, None, Some(1))
            .await
            .unwrap();
        f.registry.redeem(&spent.token_id).await.unwrap();
        f.registry
            .issue(&f.owner, f.record.file_id, None, None)
            .await
            .unwrap();

        assert_eq!(
            f.registry
                .outstanding_for_file(f.record.file_id)
                .await
                .unwrap(),
            1
        );
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        let a = generate_token_id();
        let b = generate_token_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
    }

    #[test]
    fn test_fingerprint_truncates() {
        assert_eq!(fingerprint("abcdefghijkl"), "abcdefgh");
        assert_eq!(fingerprint("abc"), "abc");
    }
}
