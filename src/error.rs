//! Error handling

use axum::response::IntoResponse;
use tracing::info;

use crate::catalog::CatalogError;

/// Errors surfaced by the web handlers.
#[derive(Debug)]
pub enum StudioError {
    /// When you didn't do the right thing
    BadRequest,
    /// Missing or invalid session / CSRF token
    Unauthorized,
    /// When a requested resource is not found
    NotFound(String),
    /// When an internal server error occurs
    InternalServerError(String),
}

impl std::fmt::Display for StudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StudioError::BadRequest => write!(f, "Bad request"),
            StudioError::Unauthorized => write!(f, "Unauthorized"),
            StudioError::NotFound(what) => write!(f, "Not found: {what}"),
            StudioError::InternalServerError(message) => {
                write!(f, "Internal server error: {message}")
            }
        }
    }
}

impl std::error::Error for StudioError {}

impl From<std::io::Error> for StudioError {
    fn from(err: std::io::Error) -> Self {
        StudioError::InternalServerError(err.to_string())
    }
}

impl From<axum::http::Error> for StudioError {
    fn from(err: axum::http::Error) -> Self {
        StudioError::InternalServerError(err.to_string())
    }
}

impl From<tower_sessions::session::Error> for StudioError {
    fn from(err: tower_sessions::session::Error) -> Self {
        StudioError::InternalServerError(err.to_string())
    }
}

impl From<CatalogError> for StudioError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound { .. } => StudioError::NotFound(err.to_string()),
            other => StudioError::InternalServerError(other.to_string()),
        }
    }
}

impl IntoResponse for StudioError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            StudioError::BadRequest => {
                info!("Bad request received");
                (axum::http::StatusCode::BAD_REQUEST, "Bad Request")
            }
            StudioError::Unauthorized => {
                info!("Unauthorized request received");
                (
                    axum::http::StatusCode::UNAUTHORIZED,
                    "Unauthorized: invalid or missing session.",
                )
            }
            StudioError::NotFound(what) => {
                tracing::warn!("404 {what}");
                (axum::http::StatusCode::NOT_FOUND, "Not Found")
            }
            StudioError::InternalServerError(message) => {
                tracing::error!("Internal server error: {}", message);
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                )
            }
        };
        let mut response = axum::response::Response::new(axum::body::Body::from(body));
        *response.status_mut() = status;
        response
    }
}
