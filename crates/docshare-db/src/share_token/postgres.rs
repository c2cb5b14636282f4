use super::{ConsumeOutcome, ShareTokenStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docshare_core::{AppError, ShareToken, TokenState};
use sqlx::PgPool;
use uuid::Uuid;

const TOKEN_COLUMNS: &str =
    "token_id, file_id, issuer_id, created_at, expires_at, max_uses, uses_remaining";

#[derive(sqlx::FromRow)]
struct TokenRow {
    token_id: String,
    file_id: Uuid,
    issuer_id: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    max_uses: i32,
    uses_remaining: i32,
}

impl From<TokenRow> for ShareToken {
    fn from(row: TokenRow) -> Self {
        ShareToken {
            token_id: row.token_id,
            file_id: row.file_id,
            issuer_id: row.issuer_id,
            created_at: row.created_at,
            expires_at: row.expires_at,
            max_uses: row.max_uses.max(0) as u32,
            uses_remaining: row.uses_remaining.max(0) as u32,
        }
    }
}

/// PostgreSQL-backed token store
///
/// Redemption is one conditional `UPDATE ... RETURNING`, so the validity
/// check and the decrement happen atomically inside the database.
#[derive(Clone)]
pub struct PgShareTokenStore {
    pool: PgPool,
}

impl PgShareTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShareTokenStore for PgShareTokenStore {
    async fn insert(&self, token: ShareToken) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO share_tokens (
                token_id, file_id, issuer_id, created_at, expires_at, max_uses, uses_remaining
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&token.token_id)
        .bind(token.file_id)
        .bind(&token.issuer_id)
        .bind(token.created_at)
        .bind(token.expires_at)
        .bind(token.max_uses as i32)
        .bind(token.uses_remaining as i32)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
                AppError::InternalConflict("Share token id already issued".to_string()),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, token_id: &str) -> Result<Option<ShareToken>, AppError> {
        let row = sqlx::query_as::<_, TokenRow>(&format!(
            "SELECT {} FROM share_tokens WHERE token_id = $1",
            TOKEN_COLUMNS
        ))
        .bind(token_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ShareToken::from))
    }

    async fn consume(
        &self,
        token_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, AppError> {
        let consumed = sqlx::query_as::<_, TokenRow>(&format!(
            r#"
            UPDATE share_tokens
            SET uses_remaining = uses_remaining - 1
            WHERE token_id = $1 AND uses_remaining > 0 AND expires_at > $2
            RETURNING {}
            "#,
            TOKEN_COLUMNS
        ))
        .bind(token_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = consumed {
            return Ok(ConsumeOutcome::Consumed(row.into()));
        }

        // The update matched nothing. Tokens only ever move toward inert, so
        // reading the row afterwards classifies the failure correctly.
        let outcome = match self.get(token_id).await? {
            None => ConsumeOutcome::Missing,
            Some(token) => match token.state(now) {
                TokenState::Expired => ConsumeOutcome::Expired,
                _ => ConsumeOutcome::Exhausted,
            },
        };
        Ok(outcome)
    }

    async fn revoke(&self, token_id: &str) -> Result<Option<ShareToken>, AppError> {
        let row = sqlx::query_as::<_, TokenRow>(&format!(
            "UPDATE share_tokens SET uses_remaining = 0 WHERE token_id = $1 RETURNING {}",
            TOKEN_COLUMNS
        ))
        .bind(token_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ShareToken::from))
    }

    async fn list_for_file(&self, file_id: Uuid) -> Result<Vec<ShareToken>, AppError> {
        let rows = sqlx::query_as::<_, TokenRow>(&format!(
            "SELECT {} FROM share_tokens WHERE file_id = $1 ORDER BY created_at, token_id",
            TOKEN_COLUMNS
        ))
        .bind(file_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ShareToken::from).collect())
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
