use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    /// The listing was already sold or no longer exists. Callers should
    /// refresh their view of the listings instead of retrying.
    #[error("{0}")]
    NotAvailable(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("Upstream request failed: {0}")]
    Transport(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::NotAvailable(_) => "not_available",
            AppError::NotFound(_) => "not_found",
            AppError::Unauthorized => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::Transport(_) => "transport",
            AppError::Database(_) | AppError::Migrate(_) | AppError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotAvailable(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Transport(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Migrate(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        // Don't leak driver details to clients
        let message = match &self {
            AppError::Database(_) | AppError::Migrate(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message, "code": self.code() }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
