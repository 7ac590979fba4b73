//! Error types for the cache
//!
//! Provides unified error handling using thiserror.
//!
//! Storage adapters and primitives return these errors. `CacheEngine`
//! catches them at its boundary and downgrades them to misses or skipped
//! writes, so callers of the engine never see them.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the cache and its host.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found in cache (only surfaced by the admin API)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Underlying storage I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An entry or container could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The storage slot refused a write because it is full
    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The state version oracle could not answer
    #[error("State version unavailable: {0}")]
    Oracle(String),

    /// The host denied access to storage altogether
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::QuotaExceeded(_) | CacheError::StorageUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            CacheError::Io(_) | CacheError::Serialization(_) | CacheError::Oracle(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
