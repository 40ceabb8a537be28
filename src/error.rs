use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::routes::Domain;

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database is not connected")]
    DatabaseUnavailable,

    #[error("CORS not allowed")]
    CorsNotAllowed { origin: String },

    #[error("Request body exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    #[error("Too many parameters: limit is {limit}")]
    TooManyParameters { limit: usize },

    #[error("Malformed request body: {0}")]
    MalformedBody(String),

    #[error("Cannot {method} {path}")]
    RouteNotFound { method: String, path: String },

    #[error("No handlers registered for {}", .0.prefix())]
    CollaboratorUnavailable(Domain),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to bind to address {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Server(std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, error_code) = match &self {
            AppError::CorsNotAllowed { .. } => {
                (StatusCode::FORBIDDEN, self.to_string(), "CORS_NOT_ALLOWED")
            }
            AppError::PayloadTooLarge { .. } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                self.to_string(),
                "PAYLOAD_TOO_LARGE",
            ),
            AppError::TooManyParameters { .. } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                self.to_string(),
                "TOO_MANY_PARAMETERS",
            ),
            AppError::MalformedBody(_) => {
                (StatusCode::BAD_REQUEST, self.to_string(), "MALFORMED_BODY")
            }
            AppError::RouteNotFound { .. } => {
                (StatusCode::NOT_FOUND, self.to_string(), "NOT_FOUND")
            }
            AppError::CollaboratorUnavailable(_) => (
                StatusCode::NOT_IMPLEMENTED,
                self.to_string(),
                "NOT_IMPLEMENTED",
            ),
            AppError::DatabaseUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                self.to_string(),
                "DATABASE_UNAVAILABLE",
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error occurred".to_string(),
                    "DATABASE_ERROR",
                )
            }
            _ => {
                tracing::error!("Internal error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                    "INTERNAL_ERROR",
                )
            }
        };

        let body = json!({
            "error": error_code,
            "message": error_message,
        });

        (status, Json(body)).into_response()
    }
}

/// Result type alias for AppResult
pub type AppResult<T> = Result<T, AppError>;
