//! Error Types for the Goods API
//!
//! This module defines error handling for the HTTP layer, including:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//! - Conversion from the domain error type
//!
//! All errors are serialized as JSON with appropriate HTTP status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use goods_core::{GoodsError, StorageError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each error code maps to a specific HTTP status code and represents
/// a category of error that can occur during API operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request validation failed
    ValidationFailed,

    /// Field value is out of valid range
    InvalidRange,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// Requested good does not exist, is removed, or belongs to another project
    GoodNotFound,

    // ========================================================================
    // Server Errors (500, 503, 504)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Database operation failed
    DatabaseError,

    /// Service is temporarily unavailable
    ServiceUnavailable,

    /// Operation timed out
    Timeout,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationFailed | ErrorCode::InvalidRange => StatusCode::BAD_REQUEST,

            ErrorCode::GoodNotFound => StatusCode::NOT_FOUND,

            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,

            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,

            ErrorCode::InternalError | ErrorCode::DatabaseError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::ValidationFailed => "Request validation failed",
            ErrorCode::InvalidRange => "Value is out of valid range",
            ErrorCode::GoodNotFound => "Good not found",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database operation failed",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
            ErrorCode::Timeout => "Operation timed out",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
///
/// This type is returned by all API endpoints when an error occurs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details (offending field, ids, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    pub fn invalid_range(field: &str, min: impl fmt::Display, max: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::InvalidRange,
            format!("Field '{}' must be between {} and {}", field, min, max),
        )
    }

    pub fn good_not_found(good_id: i64, project_id: i64) -> Self {
        Self::new(
            ErrorCode::GoodNotFound,
            format!("Good {} not found in project {}", good_id, project_id),
        )
        .with_details(serde_json::json!({ "id": good_id, "projectId": project_id }))
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    pub fn timeout(operation: &str) -> Self {
        Self::new(
            ErrorCode::Timeout,
            format!("Operation '{}' timed out", operation),
        )
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

/// Implement IntoResponse for ApiError to enable automatic error handling in Axum.
///
/// ```ignore
/// async fn handler() -> Result<Json<Good>, ApiError> {
///     Err(ApiError::validation_failed("name must not be empty"))
/// }
/// ```
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM DOMAIN ERRORS
// ============================================================================

/// NotFound and validation are client faults; everything else is logged
/// and reported without internal detail.
impl From<GoodsError> for ApiError {
    fn from(err: GoodsError) -> Self {
        match err {
            GoodsError::NotFound {
                good_id,
                project_id,
            } => ApiError::good_not_found(good_id, project_id),
            GoodsError::Validation { field, reason } => {
                ApiError::validation_failed(format!("{}: {}", field, reason))
                    .with_details(serde_json::json!({ "field": field }))
            }
            GoodsError::CacheMiss => {
                // Never escapes the read path; seeing it here is a bug.
                tracing::error!("Cache miss leaked out of the service layer");
                ApiError::from_code(ErrorCode::InternalError)
            }
            GoodsError::Storage(storage) => {
                tracing::error!(error = %storage, "Storage failure");
                match storage {
                    StorageError::Connection { .. } => {
                        ApiError::service_unavailable("Storage backend unavailable")
                    }
                    StorageError::Query { .. } | StorageError::Transaction { .. } => {
                        ApiError::database_error("Database operation failed")
                    }
                    _ => ApiError::from_code(ErrorCode::InternalError),
                }
            }
        }
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::ValidationFailed.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::InvalidRange.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::GoodNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::InternalError.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ErrorCode::DatabaseError.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ErrorCode::ServiceUnavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ErrorCode::Timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_not_found_maps_to_404_with_ids() {
        let api: ApiError = GoodsError::not_found(5, 9).into();
        assert_eq!(api.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            api.details,
            Some(serde_json::json!({ "id": 5, "projectId": 9 }))
        );
    }

    #[test]
    fn test_validation_maps_to_400() {
        let api: ApiError = GoodsError::validation("name", "must not be empty").into();
        assert_eq!(api.status_code(), StatusCode::BAD_REQUEST);
        assert!(api.message.contains("name"));
    }

    #[test]
    fn test_storage_failure_hides_reason() {
        let api: ApiError = GoodsError::Storage(StorageError::Query {
            reason: "relation \"goods\" does not exist".to_string(),
        })
        .into();
        assert_eq!(api.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!api.message.contains("relation"));
    }

    #[test]
    fn test_error_serialization() -> Result<(), serde_json::Error> {
        let error = ApiError::invalid_range("limit", 1, 1000);
        let json = serde_json::to_string(&error)?;
        assert!(json.contains("INVALID_RANGE"));
        assert!(!json.contains("details"));
        Ok(())
    }
}
