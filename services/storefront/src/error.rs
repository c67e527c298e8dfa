//! Custom error types for the storefront API

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::domain::StoreError;

/// Custom error type for the storefront API
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or invalid bearer token
    #[error("Unauthorized")]
    Unauthorized,

    /// Authenticated, but acting on someone else's user id
    #[error("Forbidden")]
    Forbidden,

    /// Bad request with message
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Request body could not be accepted
    #[error("Not acceptable: {0}")]
    NotAcceptable(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    /// Internal server error
    #[error("Internal server error")]
    InternalServerError,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] common::error::DatabaseError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::InternalServerError | ApiError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidInput(msg) => ApiError::NotAcceptable(msg),
            StoreError::AddressLimitExceeded => ApiError::BadRequest(err.to_string()),
            StoreError::UserNotFound(_)
            | StoreError::ProductNotFound(_)
            | StoreError::SlotNotFound(_) => ApiError::NotFound(err.to_string()),
            StoreError::ConcurrentModification { .. } | StoreError::IdempotencyConflict { .. } => {
                ApiError::Conflict(err.to_string())
            }
            StoreError::Timeout { .. } => ApiError::Timeout(err.to_string()),
            StoreError::AggregationFailed { .. } | StoreError::Persistence { .. } => {
                error!("Storefront operation failed: {}", err);
                ApiError::InternalServerError
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match self {
            ApiError::Unauthorized => "Unauthorized".to_string(),
            ApiError::Forbidden => "Forbidden".to_string(),
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::NotAcceptable(msg)
            | ApiError::Conflict(msg)
            | ApiError::Timeout(msg) => msg,
            ApiError::InternalServerError => "Internal server error".to_string(),
            ApiError::Database(_) => "Database error".to_string(),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
