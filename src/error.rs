use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

pub const UNEXPECTED_ERROR: &str = "An unexpected error occurred";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("configuration error: {0} is not bound")]
    Configuration(&'static str),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("metadata error: {0}")]
    Metadata(String),
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => json_error(StatusCode::BAD_REQUEST, msg, None),
            ApiError::Conflict(msg) => json_error(StatusCode::CONFLICT, msg, None),
            ApiError::PayloadTooLarge => json_error(
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload too large".to_string(),
                None,
            ),
            ApiError::Configuration(binding) => {
                tracing::error!(binding, "store binding is not configured");
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Configuration error: {binding} is not bound"),
                    None,
                )
            }
            ApiError::Storage(msg) => {
                tracing::error!("object store error: {msg}");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, msg, None)
            }
            ApiError::Metadata(msg) => {
                tracing::error!("metadata store error: {msg}");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, msg, None)
            }
            ApiError::Internal(msg) => {
                tracing::error!("unexpected error: {msg}");
                internal_error(msg)
            }
        }
    }
}

/// Body used for faults nobody classified, panics included.
pub fn internal_error(details: String) -> Response {
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        UNEXPECTED_ERROR.to_string(),
        Some(details),
    )
}

fn json_error(status: StatusCode, error: String, details: Option<String>) -> Response {
    (status, Json(ErrorBody { error, details })).into_response()
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Metadata(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::BadRequest(err.body_text())
        }
    }
}
