use super::{ConsumeOutcome, ShareTokenStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docshare_core::{AppError, ShareToken, TokenState};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Process-local token store.
///
/// A single mutex serializes every state change. The guard is never held
/// across an await, so a cancelled caller either took no effect or finished
/// its transition.
#[derive(Default)]
pub struct InMemoryShareTokenStore {
    tokens: Mutex<HashMap<String, ShareToken>>,
}

impl InMemoryShareTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ShareTokenStore for InMemoryShareTokenStore {
    async fn insert(&self, token: ShareToken) -> Result<(), AppError> {
        let mut tokens = self.tokens.lock().await;
        if tokens.contains_key(&token.token_id) {
            return Err(AppError::InternalConflict(
                "Share token id already issued".to_string(),
            ));
        }
        tokens.insert(token.token_id.clone(), token);
        Ok(())
    }

    async fn get(&self, token_id: &str) -> Result<Option<ShareToken>, AppError> {
        Ok(self.tokens.lock().await.get(token_id).cloned())
    }

    async fn consume(
        &self,
        token_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, AppError> {
        let mut tokens = self.tokens.lock().await;
        let Some(token) = tokens.get_mut(token_id) else {
            return Ok(ConsumeOutcome::Missing);
        };

        match token.state(now) {
            TokenState::Expired => Ok(ConsumeOutcome::Expired),
            TokenState::Exhausted => Ok(ConsumeOutcome::Exhausted),
            TokenState::Active => match token.uses_remaining.checked_sub(1) {
                Some(remaining) => {
                    token.uses_remaining = remaining;
                    Ok(ConsumeOutcome::Consumed(token.clone()))
                }
                None => Ok(ConsumeOutcome::Exhausted),
            },
        }
    }

    async fn revoke(&self, token_id: &str) -> Result<Option<ShareToken>, AppError> {
        let mut tokens = self.tokens.lock().await;
        Ok(tokens.get_mut(token_id).map(|token| {
            token.uses_remaining = 0;
            token.clone()
        }))
    }

    async fn list_for_file(&self, file_id: Uuid) -> Result<Vec<ShareToken>, AppError> {
        let tokens = self.tokens.lock().await;
        let mut matching: Vec<ShareToken> = tokens
            .values()
            .filter(|t| t.file_id == file_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.token_id.cmp(&b.token_id))
        });
        Ok(matching)
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
