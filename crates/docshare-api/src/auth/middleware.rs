use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use docshare_core::AppError;
use std::sync::Arc;

fn log_authentication_attempt(
    principal_id: Option<&str>,
    method: &str,
    path: &str,
    success: bool,
    failure_reason: Option<&str>,
) {
    if success {
        tracing::info!(
            target: "audit",
            event = "auth.success",
            principal = principal_id.unwrap_or("unknown"),
            method,
            path,
            "Authentication succeeded"
        );
    } else {
        tracing::warn!(
            target: "audit",
            event = "auth.failure",
            method,
            path,
            reason = failure_reason.unwrap_or("unknown"),
            "Authentication failed"
        );
    }
}

fn unauthorized(method: &str, path: &str, reason: &str) -> Response {
    log_authentication_attempt(None, method, path, false, Some(reason));
    HttpAppError(AppError::Unauthorized(reason.to_string())).into_response()
}

/// Resolve the bearer credential and attach the principal to the request.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let auth_header = match request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        Some(h) => h,
        None => return unauthorized(&method, &path, "Missing authorization header"),
    };

    let token = match auth_header.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => token.trim(),
        _ => return unauthorized(&method, &path, "Invalid authorization header format"),
    };

    match state.resolver.resolve(token).await {
        Ok(principal) => {
            log_authentication_attempt(
                Some(&principal.principal_id),
                &method,
                &path,
                true,
                None,
            );
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(AppError::Unauthorized(reason)) => unauthorized(&method, &path, &reason),
        Err(other) => {
            log_authentication_attempt(None, &method, &path, false, Some("resolver error"));
            HttpAppError(other).into_response()
        }
    }
}
