//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>` and convert
//! domain errors with `?`; status, body and logging come from
//! [`ErrorMetadata`] on the wrapped [`AppError`].

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use filedrop_core::{AppError, ErrorMetadata, LogLevel};
use filedrop_services::{StorageError, UploadError};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
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

/// Body without details, attached to every error response so that
/// [`hide_error_details`] can swap it in.
#[derive(Debug, Clone)]
pub struct RedactedError(pub ErrorResponse);

/// Wrapper type for AppError to implement IntoResponse
/// This is necessary because of Rust's orphan rules - we can't implement
/// IntoResponse (external trait) for AppError (external type from filedrop-core)
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
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
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        let redacted = ErrorResponse {
            error: app_error.client_message(),
            details: None,
            error_type: None,
            code: app_error.error_code().to_string(),
            recoverable: app_error.is_recoverable(),
            suggested_action: app_error.suggested_action().map(String::from),
        };

        // Sensitive errors never carry details, whatever the environment.
        let body = if app_error.is_sensitive() {
            redacted.clone()
        } else {
            ErrorResponse {
                details: Some(app_error.detailed_message()),
                error_type: Some(app_error.error_type().to_string()),
                ..redacted.clone()
            }
        };

        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(RedactedError(redacted));
        response
    }
}

/// Replace error bodies with their redacted form. Installed in production.
pub async fn hide_error_details(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    match response.extensions().get::<RedactedError>().cloned() {
        Some(RedactedError(body)) => (response.status(), Json(body)).into_response(),
        None => response,
    }
}

// Convert domain errors to HttpAppError (avoids orphan rule: we impl for local HttpAppError)

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        let app = match err {
            StorageError::NotFound(msg) => AppError::NotFound(msg),
            // Names that cannot exist are reported like names that do not.
            StorageError::InvalidKey(msg) => AppError::NotFound(msg),
            StorageError::BadMetadata(msg) => AppError::BadMetadata(msg),
            StorageError::EmptyContent => AppError::EmptyContent,
            StorageError::UploadFailed(msg)
            | StorageError::DownloadFailed(msg)
            | StorageError::DeleteFailed(msg)
            | StorageError::BackendError(msg) => AppError::Storage(msg),
            StorageError::Inspect(err) => AppError::Storage(err.to_string()),
            StorageError::IoError(err) => AppError::Internal(format!("IO error: {}", err)),
            StorageError::ConfigError(msg) => AppError::Internal(msg),
        };
        HttpAppError(app)
    }
}

impl From<UploadError> for HttpAppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::EmptyContent => HttpAppError(AppError::EmptyContent),
            UploadError::FileTooLarge { size, max } => {
                HttpAppError(AppError::FileTooLarge { size, max })
            }
            UploadError::ProhibitedFilename(name) => {
                HttpAppError(AppError::ProhibitedFilename(name))
            }
            UploadError::Storage(err) => err.into(),
        }
    }
}
