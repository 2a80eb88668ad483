//! Error types for the dashboard service.
//!
//! Uses thiserror for ergonomic error definitions that integrate
//! with axum's response system. Every error renders as
//! `{ "error", "code", "details" }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // External service errors
    #[error("{provider} API error: {message}")]
    Upstream {
        provider: &'static str,
        message: String,
    },

    // Validation errors
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Resource errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn upstream(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Upstream {
            provider,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400
            Self::Validation(_) | Self::InvalidInput(_) => StatusCode::BAD_REQUEST,

            // 500, told apart by `code`
            Self::Upstream { .. }
            | Self::NotFound(_)
            | Self::Database(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Upstream { .. } => "UPSTREAM_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Short, human-readable summary used as the `error` field.
    fn summary(&self) -> &'static str {
        match self {
            Self::Upstream { .. } => "Upstream request failed",
            Self::Validation(_) | Self::InvalidInput(_) => "Invalid request",
            Self::NotFound(_) => "Resource not found",
            Self::Database(_) => "Database operation failed",
            Self::Internal(_) => "Internal server error",
        }
    }

    fn details(&self) -> Value {
        match self {
            Self::Validation(problems) => json!(problems),
            Self::Upstream { provider, message } => json!(format!("{}: {}", provider, message)),
            Self::InvalidInput(message) | Self::NotFound(message) | Self::Internal(message) => {
                json!(message)
            }
            other => json!(other.to_string()),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "Request failed");
        } else {
            tracing::debug!(code = self.error_code(), error = %self, "Request rejected");
        }

        let body = Json(json!({
            "error": self.summary(),
            "code": self.error_code(),
            "details": self.details(),
        }));

        (status, body).into_response()
    }
}

// Convenience conversions
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Internal(format!("HTTP request failed: {}", err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidInput(format!("JSON parsing error: {}", err))
    }
}
