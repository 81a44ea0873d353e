//! Error types for the background server

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::fmt;

/// Startup failures
#[derive(Debug)]
pub enum ServerError {
    Cache(background_cache::CacheError),
    Io(Box<std::io::Error>),
    Config(String),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Cache(err) => write!(f, "Cache error: {}", err),
            ServerError::Io(err) => write!(f, "IO error: {}", err),
            ServerError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Cache(err) => Some(err),
            ServerError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<background_cache::CacheError> for ServerError {
    fn from(err: background_cache::CacheError) -> Self {
        ServerError::Cache(err)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for ServerError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        ServerError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

/// Request failures, converted to JSON error responses
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Cache(background_cache::CacheError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Cache(e) => {
                tracing::error!(error = %e, "Cache error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                )
            }
        };

        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}

impl From<background_cache::CacheError> for ApiError {
    fn from(err: background_cache::CacheError) -> Self {
        match err {
            background_cache::CacheError::InvalidSource(_) => ApiError::BadRequest(err.to_string()),
            other => ApiError::Cache(other),
        }
    }
}
