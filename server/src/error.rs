//! Error types for the attendance service
//!
//! All errors use thiserror for structured error handling.
//! Errors are mapped to JSON HTTP responses at the API boundary.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Message shown for every authentication failure, whatever the cause.
pub const GENERIC_AUTH_MESSAGE: &str = "Invalid credentials or unauthorized access";

/// Failures reported by the credential store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("User not found")]
    UserNotFound,

    #[error("Incorrect password")]
    WrongCredential,

    #[error("Invalid login identifier: {0}")]
    MalformedIdentifier(String),

    #[error("User does not have {0} privileges")]
    RoleMismatch(String),

    #[error("Session token is invalid or expired")]
    InvalidToken,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Permission denied")]
    Forbidden,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Precondition(String),

    #[error("Student not found: {0}")]
    StudentNotFound(String),

    #[error("Subject not found: {0}")]
    SubjectNotFound(String),

    #[error("{0}")]
    Generic(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Auth(_) | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Precondition(_) => StatusCode::CONFLICT,
            AppError::StudentNotFound(_) | AppError::SubjectNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_)
            | AppError::Io(_)
            | AppError::Serialization(_)
            | AppError::Generic(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Auth(_) | AppError::Unauthorized => GENERIC_AUTH_MESSAGE.to_string(),
            AppError::Database(_)
            | AppError::Io(_)
            | AppError::Serialization(_)
            | AppError::Generic(_) => {
                tracing::error!("Request failed: {}", self);
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
