//! Service error types.
//!
//! Every failure a request can hit ends up here and renders itself as an
//! HTTP response with a `{"detail": "..."}` body.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pool_core::PoolError;
use pool_store::StoreError;
use thiserror::Error;
use tracing::error;

/// Errors that can occur in the Pool Manager service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Pool does not exist
    #[error("Pool '{0}' not found")]
    PoolNotFound(String),

    /// Release target matches no live allocation
    #[error("{0}")]
    NotFound(String),

    /// Malformed or out-of-bounds request parameter
    #[error("{0}")]
    InvalidInput(String),

    /// No free block or value
    #[error("{0}")]
    Exhausted(String),

    /// Pool name collision
    #[error("Pool with name '{0}' already exists")]
    AlreadyExists(String),

    /// Commit conflict that outlived the retry bound
    #[error("{0}")]
    Conflict(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ServiceError {
    /// HTTP status this error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::PoolNotFound(_) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Exhausted(_) | Self::AlreadyExists(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InvalidConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PoolError> for ServiceError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::NotFound(msg) => Self::NotFound(msg),
            PoolError::Exhausted(msg) => Self::Exhausted(msg),
            PoolError::InvalidInput(msg) => Self::InvalidInput(msg),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PoolNotFound(name) => Self::PoolNotFound(name),
            StoreError::AlreadyExists(name) => Self::AlreadyExists(name),
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::Pool(err) => err.into(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(serde_json::json!({ "detail": self.to_string() }))).into_response()
    }
}
