//! Bearer credential to principal resolution.

use crate::auth::models::IdentityClaims;
use anyhow::Context;
use async_trait::async_trait;
use docshare_core::{AppError, AuthConfig, AuthMode, Principal, Role};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const INTROSPECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Turns a bearer credential into the principal it identifies.
#[async_trait]
pub trait PrincipalResolver: Send + Sync {
    async fn resolve(&self, bearer: &str) -> Result<Principal, AppError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Verifies HS256 tokens signed with the identity provider's shared secret.
pub struct JwtPrincipalResolver {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtPrincipalResolver {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = 0;

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl PrincipalResolver for JwtPrincipalResolver {
    async fn resolve(&self, bearer: &str) -> Result<Principal, AppError> {
        let token_data = decode::<IdentityClaims>(bearer, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!("JWT validation failed: {}", e);
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        AppError::Unauthorized("Token has expired".to_string())
                    }
                    jsonwebtoken::errors::ErrorKind::ImmatureSignature => {
                        AppError::Unauthorized("Token is not yet valid (nbf)".to_string())
                    }
                    _ => AppError::Unauthorized("Invalid or expired token".to_string()),
                }
            })?;

        token_data.claims.into_principal()
    }

    fn name(&self) -> &'static str {
        "jwt"
    }
}

#[derive(Debug, Deserialize)]
struct IntrospectionResponse {
    #[serde(default)]
    active: Option<bool>,
    #[serde(flatten)]
    claims: IdentityClaims,
}

/// Asks the identity provider about every credential.
pub struct IntrospectionPrincipalResolver {
    client: reqwest::Client,
    endpoint: String,
}

impl IntrospectionPrincipalResolver {
    pub fn new(endpoint: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(INTROSPECTION_TIMEOUT)
            .build()
            .context("Failed to build introspection HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl PrincipalResolver for IntrospectionPrincipalResolver {
    async fn resolve(&self, bearer: &str) -> Result<Principal, AppError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(bearer)
            .json(&serde_json::json!({ "token": bearer }))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, endpoint = %self.endpoint, "Identity provider unreachable");
                AppError::Internal("Identity provider unavailable".to_string())
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(AppError::Unauthorized("Invalid or expired token".to_string()));
        }
        if !status.is_success() {
            tracing::error!(status = %status, "Identity provider returned an error");
            return Err(AppError::Internal(
                "Identity provider unavailable".to_string(),
            ));
        }

        let body: IntrospectionResponse = response.json().await.map_err(|e| {
            tracing::warn!(error = %e, "Unreadable introspection response");
            AppError::Unauthorized("Invalid or expired token".to_string())
        })?;

        if body.active == Some(false) {
            return Err(AppError::Unauthorized("Token is not active".to_string()));
        }
        body.claims.into_principal()
    }

    fn name(&self) -> &'static str {
        "introspection"
    }
}

/// Accepts any bearer credential as one configured principal. Local development only.
pub struct FixedPrincipalResolver {
    principal: Principal,
}

impl FixedPrincipalResolver {
    pub fn new(principal_id: impl Into<String>, role: Role) -> Self {
        Self {
            principal: Principal::new(principal_id, role),
        }
    }
}

#[async_trait]
impl PrincipalResolver for FixedPrincipalResolver {
    async fn resolve(&self, _bearer: &str) -> Result<Principal, AppError> {
        Ok(self.principal.clone())
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// Build the resolver selected by `AUTH_MODE`
pub fn create_resolver(config: &AuthConfig) -> anyhow::Result<Arc<dyn PrincipalResolver>> {
    let resolver: Arc<dyn PrincipalResolver> = match config.mode {
        AuthMode::Jwt => {
            let secret = config
                .jwt_secret
                .as_deref()
                .context("JWT_SECRET is required when AUTH_MODE=jwt")?;
            Arc::new(JwtPrincipalResolver::new(secret))
        }
        AuthMode::Introspection => {
            let url = config
                .auth_service_url
                .as_deref()
                .context("AUTH_SERVICE_URL is required when AUTH_MODE=introspection")?;
            Arc::new(IntrospectionPrincipalResolver::new(url)?)
        }
        AuthMode::Fixed => {
            let id = config
                .fixed_principal_id
                .as_deref()
                .context("FIXED_PRINCIPAL_ID is required when AUTH_MODE=fixed")?;
            tracing::warn!(
                principal = id,
                role = %config.fixed_principal_role,
                "Fixed principal authentication enabled; every bearer token is accepted"
            );
            Arc::new(FixedPrincipalResolver::new(id, config.fixed_principal_role))
        }
    };

    tracing::info!(resolver = resolver.name(), "Principal resolver configured");
    Ok(resolver)
}
