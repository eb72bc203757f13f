//! Request and response types for the Goods REST API.
//!
//! Query and body field names are camelCase on the wire.

use goods_core::{
    GoodId, GoodPatch, GoodsResult, Pagination, PriorityChange, ProjectId, DEFAULT_PAGE_LIMIT,
    MAX_PAGE_LIMIT,
};
use serde::{Deserialize, Serialize};

use crate::validation::{ValidateNonEmpty, ValidateRange};

// ============================================================================
// QUERY PARAMETERS
// ============================================================================

/// `GET /goods/list` query.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct ListQuery {
    /// Page size, 1..=1000 (default 10)
    pub limit: Option<i64>,
    /// Items to skip (default 0)
    pub offset: Option<i64>,
}

impl ListQuery {
    pub fn to_pagination(&self) -> GoodsResult<Pagination> {
        let limit = self.limit.unwrap_or(i64::from(DEFAULT_PAGE_LIMIT));
        limit.validate_range("limit", 1, i64::from(MAX_PAGE_LIMIT))?;

        let offset = self.offset.unwrap_or(0);
        offset.validate_range("offset", 0, i64::from(u32::MAX))?;

        // Both bounds were checked above.
        Ok(Pagination::new(limit as u32, offset as u32))
    }
}

/// Query naming one good inside a project.
#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
#[serde(rename_all = "camelCase")]
pub struct GoodQuery {
    pub id: GoodId,
    pub project_id: ProjectId,
}

impl GoodQuery {
    pub fn validate(&self) -> GoodsResult<()> {
        self.id.validate_positive("id")?;
        self.project_id.validate_positive("projectId")
    }
}

/// Query naming a project.
#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
#[serde(rename_all = "camelCase")]
pub struct ProjectQuery {
    pub project_id: ProjectId,
}

impl ProjectQuery {
    pub fn validate(&self) -> GoodsResult<()> {
        self.project_id.validate_positive("projectId")
    }
}

// ============================================================================
// REQUEST BODIES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateGoodRequest {
    pub name: String,
}

impl CreateGoodRequest {
    pub fn validate(&self) -> GoodsResult<()> {
        self.name.validate_non_empty("name")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateGoodRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl UpdateGoodRequest {
    pub fn validate(&self) -> GoodsResult<()> {
        self.name.validate_non_empty("name")
    }

    pub fn to_patch(&self) -> GoodPatch {
        GoodPatch {
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }
}

/// The new priority is applied as a delta to the anchor and every later good.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ReprioritizeRequest {
    pub new_priority: i64,
}

// ============================================================================
// RESPONSES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct DeleteGoodResponse {
    pub id: GoodId,
    pub project_id: ProjectId,
    pub removed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ReprioritizeResponse {
    pub priorities: Vec<PriorityChange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}
