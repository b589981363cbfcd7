//! Application-wide error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use grant_workflow::{ErrorKind, WorkflowError};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid upload: {0}")]
    Upload(#[from] base64::DecodeError),

    #[error("Invalid request body: {0}")]
    Body(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication required: {0}")]
    Unauthorized(String),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Upload(_) | Self::Body(_) => StatusCode::BAD_REQUEST,
            Self::Workflow(e) => match e.kind() {
                ErrorKind::Forbidden => StatusCode::FORBIDDEN,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Notice => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::Invalid => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Database(_) | Self::Migrate(_) | Self::Io(_) | Self::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The workflow error when it is one the user should see as a notice.
    pub fn as_notice(&self) -> Option<&WorkflowError> {
        match self {
            Self::Workflow(e) if e.is_notice() => Some(e),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
