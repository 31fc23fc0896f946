use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Why a local part or subdomain label was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("must be 1-63 lowercase letters, digits or hyphens and may not start or end with a hyphen")]
    BadPattern,

    #[error("contains a forbidden character")]
    ForbiddenCharacter,

    #[error("is not allowed")]
    Blocked,

    #[error("has been used before and can never be reused")]
    Tombstoned,

    #[error("is already taken")]
    Duplicate,

    #[error("{0}")]
    Malformed(String),
}

impl ValidationError {
    fn code(&self) -> &'static str {
        match self {
            ValidationError::BadPattern => "bad_pattern",
            ValidationError::ForbiddenCharacter => "forbidden_character",
            ValidationError::Blocked => "blocked",
            ValidationError::Tombstoned => "tombstoned",
            ValidationError::Duplicate => "duplicate",
            ValidationError::Malformed(_) => "malformed",
        }
    }
}

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Quota exceeded: at most {limit} {resource}")]
    QuotaExceeded { resource: &'static str, limit: i64 },

    #[error("Could not allocate a free alias")]
    AllocationExhausted,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("External dependency failed: {0}")]
    ExternalDependency(String),
}

/// Implement IntoResponse to convert AppError into HTTP responses
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error_message) = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "Internal server error".to_string(),
                )
            }
            AppError::Migration(e) => {
                tracing::error!("Migration error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "Internal server error".to_string(),
                )
            }
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, e.code(), self.to_string()),
            AppError::QuotaExceeded { .. } => {
                (StatusCode::FORBIDDEN, "quota_exceeded", self.to_string())
            }
            AppError::AllocationExhausted => {
                tracing::error!("Alias allocation exhausted all candidate attempts");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "allocation_exhausted",
                    self.to_string(),
                )
            }
            AppError::PermissionDenied(_) => {
                (StatusCode::FORBIDDEN, "permission_denied", self.to_string())
            }
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", self.to_string()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", self.to_string()),
            AppError::ExternalDependency(e) => {
                tracing::error!("External dependency error: {}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    "external_dependency",
                    "Upstream dependency failed".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

/// Result type alias for application results
pub type Result<T> = std::result::Result<T, AppError>;
