//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::models::ApiResponse;
use crate::service::ServiceError;

/// Errors surfaced by the package API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad query parameters.
    #[error("{0}")]
    BadRequest(String),

    #[error("Package not found")]
    NotFound,

    /// Snapshot without resolution results.
    #[error("Package was empty")]
    EmptyPackage,

    /// The download manager rejected or missed a submission.
    #[error("{0}")]
    Downstream(String),

    #[error("{0}")]
    Internal(String),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(_) => ApiError::NotFound,
            ServiceError::EmptyPackage(_) => ApiError::EmptyPackage,
            ServiceError::Validation(message) => ApiError::BadRequest(message),
            ServiceError::Downstream(e) => ApiError::Downstream(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::EmptyPackage => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Downstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(ApiResponse::failure(self.to_string()))).into_response()
    }
}

/// Result type for API handlers.
pub type Result<T> = std::result::Result<T, ApiError>;
