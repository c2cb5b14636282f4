use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle state of a share token, derived at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TokenState {
    Active,
    Expired,
    Exhausted,
}

/// Capability granting bounded access to exactly one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareToken {
    pub token_id: String,
    pub file_id: Uuid,
    pub issuer_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub max_uses: u32,
    pub uses_remaining: u32,
}

impl ShareToken {
    /// Expiry wins over exhaustion when both hold.
    pub fn state(&self, now: DateTime<Utc>) -> TokenState {
        if now >= self.expires_at {
            TokenState::Expired
        } else if self.uses_remaining == 0 {
            TokenState::Exhausted
        } else {
            TokenState::Active
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.state(now) == TokenState::Active
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShareTokenResponse {
    pub token_id: String,
    pub file_id: Uuid,
    pub issuer_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub max_uses: u32,
    pub uses_remaining: u32,
    pub state: TokenState,
}

impl ShareTokenResponse {
    pub fn from_token(token: ShareToken, now: DateTime<Utc>) -> Self {
        let state = token.state(now);
        ShareTokenResponse {
            token_id: token.token_id,
            file_id: token.file_id,
            issuer_id: token.issuer_id,
            created_at: token.created_at,
            expires_at: token.expires_at,
            max_uses: token.max_uses,
            uses_remaining: token.uses_remaining,
            state,
        }
    }
}
