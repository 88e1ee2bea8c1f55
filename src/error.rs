//! Structured API error type implementing `axum::response::IntoResponse`.
//!
//! Every HTTP failure path funnels through [`ApiError`], so clients always
//! see the same JSON body shape: `{"error": {"code", "message", "details?"}}`.
//! Internal error messages are logged but never returned to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ValidationError;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional context, present only for some client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error mapped to an HTTP status and a stable error code.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request failed authoring or submission validation (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// A non-partial submission left required visible questions blank (422).
    /// Carries the offending question ids so the client can highlight them.
    #[error("required questions are unanswered")]
    MissingRequired(Vec<String>),

    /// Missing or invalid bearer token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but not the owner of the resource (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The resource existed but is past its expiry (410).
    #[error("gone: {0}")]
    Gone(String),

    /// Credential validation is still warming up (503).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error (500). Message is logged but not returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::MissingRequired(_) => (StatusCode::UNPROCESSABLE_ENTITY, "MISSING_REQUIRED"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Gone(_) => (StatusCode::GONE, "GONE"),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Never expose internal error messages to clients.
        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        let details = match &self {
            Self::MissingRequired(ids) => Some(serde_json::json!({ "questionIds": ids })),
            _ => None,
        };

        // Log server-side errors for operator visibility.
        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::ServiceUnavailable(_) => tracing::warn!(error = %self, "service unavailable"),
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail { code: code.to_string(), message, details },
        };

        (status, Json(body)).into_response()
    }
}

/// Authoring validation failures surface as 422s.
impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}
