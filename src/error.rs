//! Error handling for the camserver

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Camera or stream not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate camera name on add
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Validation error (bad URL scheme, missing field, malformed value)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation not valid for the camera's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration file read/write failure
    #[error("Config I/O error: {0}")]
    ConfigIo(String),

    /// Configuration parse/serialize failure
    #[error("Config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Docker command failure
    #[error("Docker error: {0}")]
    Docker(String),

    /// Relay query API failure (after retry exhaustion)
    #[error("Relay API error: {message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Relay API error carrying the upstream HTTP status
    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        Error::Upstream {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            Error::AlreadyExists(msg) => (StatusCode::CONFLICT, "ALREADY_EXISTS", msg.clone()),
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            Error::InvalidState(msg) => (StatusCode::CONFLICT, "INVALID_STATE", msg.clone()),
            Error::ConfigIo(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_IO_ERROR",
                msg.clone(),
            ),
            Error::Yaml(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_PARSE_ERROR",
                e.to_string(),
            ),
            Error::Docker(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DOCKER_ERROR",
                msg.clone(),
            ),
            // A 404 from the relay's query API means the stream itself is
            // unknown there, so it maps to a 404 here as well.
            Error::Upstream { status, message } => match status {
                Some(404) => (StatusCode::NOT_FOUND, "STREAM_NOT_FOUND", message.clone()),
                _ => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", message.clone()),
            },
            Error::Http(e) => (StatusCode::BAD_GATEWAY, "HTTP_ERROR", e.to_string()),
            Error::Io(e) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR", e.to_string()),
        };

        tracing::error!(
            status = %status,
            error_code = %error_code,
            message = %message,
            "Request error"
        );

        let body = Json(json!({
            "error_code": error_code,
            "message": message
        }));

        (status, body).into_response()
    }
}
