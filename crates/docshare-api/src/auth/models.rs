use crate::error::HttpAppError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use docshare_core::{AppError, Principal, Role};
use serde::{Deserialize, Serialize};

/// Claims carried by identity provider tokens and introspection responses.
///
/// The provider names the role `type`; `role` is accepted as well.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub sub: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl IdentityClaims {
    /// A missing role means an ordinary principal. An unknown one is rejected.
    pub fn into_principal(self) -> Result<Principal, AppError> {
        if self.sub.trim().is_empty() {
            return Err(AppError::Unauthorized("Token has no subject".to_string()));
        }
        let role = match self.kind.as_deref().or(self.role.as_deref()) {
            Some(raw) => raw
                .parse::<Role>()
                .map_err(|_| AppError::Unauthorized("Invalid principal role".to_string()))?,
            None => Role::Ordinary,
        };
        Ok(Principal::new(self.sub, role))
    }
}

/// The authenticated caller, as placed in the request extensions by
/// [`crate::auth::auth_middleware`].
///
/// Extracted from request parts so it can sit next to `Multipart`.
#[derive(Debug, Clone)]
pub struct AuthPrincipal(pub Principal);

impl<S> FromRequestParts<S> for AuthPrincipal
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(AuthPrincipal)
            .ok_or_else(|| {
                HttpAppError(AppError::Unauthorized(
                    "Missing authentication context".to_string(),
                ))
            })
    }
}
