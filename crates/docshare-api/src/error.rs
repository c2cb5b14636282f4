//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`. Anything that
//! converts into [`AppError`] converts into [`HttpAppError`] and renders as an
//! [`ErrorResponse`] with the status its [`ErrorMetadata`] prescribes.

use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use docshare_core::{AppError, ErrorMetadata, LogLevel, ValidationError};
use docshare_storage::StorageError;
use serde::{de::DeserializeOwned, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether this error is recoverable (can be retried)
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

impl ErrorResponse {
    fn from_app_error(app_error: &AppError, with_details: bool) -> Self {
        Self {
            error: app_error.client_message(),
            details: with_details.then(|| app_error.detailed_message()),
            error_type: with_details.then(|| app_error.error_type().to_string()),
            code: app_error.error_code().to_string(),
            recoverable: app_error.is_recoverable(),
            suggested_action: app_error.suggested_action().map(String::from),
        }
    }
}

/// Wrapper so `IntoResponse` can be implemented for the core error type
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::from(err))
    }
}

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        HttpAppError(AppError::from(err))
    }
}

impl From<ValidationError> for HttpAppError {
    fn from(err: ValidationError) -> Self {
        HttpAppError(AppError::from(err))
    }
}

/// Convert JSON body deserialization failures into a 400 with our ErrorResponse format.
impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        HttpAppError(AppError::InvalidInput(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

impl From<QueryRejection> for HttpAppError {
    fn from(rejection: QueryRejection) -> Self {
        HttpAppError(AppError::InvalidInput(format!(
            "Invalid query string: {}",
            rejection.body_text()
        )))
    }
}

impl From<PathRejection> for HttpAppError {
    fn from(rejection: PathRejection) -> Self {
        HttpAppError(AppError::InvalidInput(format!(
            "Invalid path parameter: {}",
            rejection.body_text()
        )))
    }
}

impl From<MultipartRejection> for HttpAppError {
    fn from(rejection: MultipartRejection) -> Self {
        HttpAppError(AppError::InvalidInput(format!(
            "Invalid multipart request: {}",
            rejection.body_text()
        )))
    }
}

/// A multipart stream cut off by the body limit surfaces as 413.
impl From<MultipartError> for HttpAppError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            HttpAppError(AppError::PayloadTooLarge(
                "Request body exceeds the upload limit".to_string(),
            ))
        } else {
            HttpAppError(AppError::InvalidInput(format!(
                "Failed to read multipart field: {}",
                err.body_text()
            )))
        }
    }
}

/// JSON body extractor that returns our ErrorResponse format (400 + JSON) on deserialization failure.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(HttpAppError::from)?;
        Ok(ValidatedJson(inner))
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(
                error = %error.detailed_message(),
                error_type = error_type,
                "Error occurred"
            );
        }
    }
}

fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .map(|env| env.eq_ignore_ascii_case("production") || env.eq_ignore_ascii_case("prod"))
        .unwrap_or(false)
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        // Details only leave the process outside production and for non-sensitive errors.
        let with_details = !is_production_env() && !app_error.is_sensitive();
        let body = ErrorResponse::from_app_error(app_error, with_details);

        (status, Json(body)).into_response()
    }
}
