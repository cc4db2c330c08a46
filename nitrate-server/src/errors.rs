//! `AppError`: the one place domain and input-validation failures turn into
//! an HTTP response. Every body is `{"detail": "..."}` (SPEC_FULL.md §4.10,
//! §7) — unlike ferrex's `{"error": {"message", "status"}}` shape, callers
//! of this API get a flat FastAPI-style error envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use nitrate_core::error::LibraryError;

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.message }))).into_response()
    }
}

impl From<LibraryError> for AppError {
    fn from(err: LibraryError) -> Self {
        match err {
            LibraryError::NotFound(id) => {
                AppError::not_found(format!("media file {id} not found"))
            }
            LibraryError::ConfigValidation(msg) => AppError::bad_request(msg),
            LibraryError::ConfigBlacklisted(key) => {
                AppError::bad_request(format!("config key {key} is not editable"))
            }
            LibraryError::Database(e) => {
                tracing::error!(error = %e, "database operation failed");
                AppError::internal("database operation failed")
            }
            other => {
                tracing::error!(error = %other, "unhandled library error");
                AppError::internal(other.to_string())
            }
        }
    }
}
