use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

use crate::dto::session_dto::MissingScores;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Participant code already used: {0}")]
    AlreadyUsed(String),

    #[error("Identity mismatch: {0}")]
    IdentityMismatch(String),

    #[error("Device mismatch: {0}")]
    DeviceMismatch(String),

    #[error("Missing scores for {} participant(s)", .0.len())]
    IncompleteScores(Vec<MissingScores>),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            Error::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            Error::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            Error::AlreadyUsed(msg) => (
                StatusCode::FORBIDDEN,
                json!({ "error": "code_already_used", "message": msg }),
            ),
            Error::IdentityMismatch(msg) => (
                StatusCode::FORBIDDEN,
                json!({ "error": "identity_mismatch", "message": msg }),
            ),
            Error::DeviceMismatch(msg) => (
                StatusCode::FORBIDDEN,
                json!({ "error": "device_mismatch", "message": msg, "ip_match": false }),
            ),
            Error::IncompleteScores(incomplete) => {
                let names = incomplete
                    .iter()
                    .map(|m| m.full_name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                (
                    StatusCode::BAD_REQUEST,
                    json!({
                        "error": format!("Missing scores for: {}", names),
                        "incomplete": incomplete,
                    }),
                )
            }
            Error::Validation(err) => (StatusCode::BAD_REQUEST, json!({ "error": err.to_string() })),
            Error::Json(err) => (StatusCode::BAD_REQUEST, json!({ "error": err.to_string() })),
            other => {
                tracing::error!(error = %other, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "An unexpected error occurred" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            other => Error::Database(other),
        }
    }
}
