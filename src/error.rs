use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid schedule '{schedule}': {message}")]
    ScheduleSyntax { schedule: String, message: String },

    #[error("Invalid freezing window: {0}")]
    InvalidFreezingWindow(String),

    #[error("Hunter not found: {0}")]
    HunterNotFound(String),

    #[error("Permission denied on hunter {0}")]
    PermissionDenied(String),

    #[error("Malformed search condition: {0}")]
    SearchConditionMalformed(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Dispatch error: {0}")]
    Dispatch(String),

    #[error("Message corrupted")]
    MessageCorrupted,

    #[error("Message already consumed")]
    MessageConsumed,

    #[error("Cipher error: {0}")]
    Cipher(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::ScheduleSyntax { .. }
            | AppError::InvalidFreezingWindow(_)
            | AppError::SearchConditionMalformed(_)
            | AppError::MessageCorrupted => StatusCode::BAD_REQUEST,
            AppError::HunterNotFound(_) => StatusCode::NOT_FOUND,
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::MessageConsumed => StatusCode::GONE,
            AppError::Fetch(_) | AppError::Http(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
