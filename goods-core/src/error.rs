//! Error types for goods operations.

use thiserror::Error;

use crate::{GoodId, ProjectId};

/// Failures raised by store adapters (relational, cache, bus, analytics).
///
/// Every variant is a server fault from the caller's point of view.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Query failed: {reason}")]
    Query { reason: String },

    #[error("Transaction failed: {reason}")]
    Transaction { reason: String },

    #[error("Connection failed: {reason}")]
    Connection { reason: String },

    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Cache error: {reason}")]
    Cache { reason: String },

    #[error("Publish failed: {reason}")]
    Publish { reason: String },
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization {
            reason: err.to_string(),
        }
    }
}

/// Master error type for goods operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GoodsError {
    /// Target row is absent, already removed, or owned by another project.
    #[error("Good {good_id} not found in project {project_id}")]
    NotFound { good_id: GoodId, project_id: ProjectId },

    /// The cache holds no usable snapshot. Only meaningful on the read path.
    #[error("Cache miss")]
    CacheMiss,

    #[error("Validation failed for '{field}': {reason}")]
    Validation { field: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl GoodsError {
    pub fn not_found(good_id: GoodId, project_id: ProjectId) -> Self {
        GoodsError::NotFound {
            good_id,
            project_id,
        }
    }

    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        GoodsError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GoodsError::NotFound { .. })
    }

    pub fn is_cache_miss(&self) -> bool {
        matches!(self, GoodsError::CacheMiss)
    }
}

impl From<serde_json::Error> for GoodsError {
    fn from(err: serde_json::Error) -> Self {
        GoodsError::Storage(err.into())
    }
}

/// Result type alias for goods operations.
pub type GoodsResult<T> = Result<T, GoodsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = GoodsError::not_found(42, 7);
        let msg = err.to_string();
        assert!(msg.contains("42"));
        assert!(msg.contains("project 7"));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_storage_errors_are_server_faults() {
        let err: GoodsError = StorageError::Query {
            reason: "boom".to_string(),
        }
        .into();
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_cache_miss_is_distinct() {
        assert!(GoodsError::CacheMiss.is_cache_miss());
        let other: GoodsError = StorageError::Cache {
            reason: "io".to_string(),
        }
        .into();
        assert!(!other.is_cache_miss());
    }

    #[test]
    fn test_json_error_maps_to_serialization() {
        let err = serde_json::from_str::<u32>("nope").map_err(GoodsError::from);
        assert!(matches!(
            err,
            Err(GoodsError::Storage(StorageError::Serialization { .. }))
        ));
    }
}
