//! Core entity structures

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::{GoodId, ProjectId, Timestamp};

/// A catalog item owned by a project.
///
/// The relational store is the system of record; every other copy (cache
/// snapshot, change events, audit rows) is derived from it. On the wire the
/// owner is `project` and the creation time `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Good {
    pub id: GoodId,
    #[serde(rename = "project")]
    pub project_id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub priority: i64,
    pub removed: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
}

/// Mutable fields accepted by the update path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GoodPatch {
    /// New name, must be non-empty.
    pub name: String,
    /// New description; `None` keeps the stored value.
    #[serde(default)]
    pub description: Option<String>,
}

impl GoodPatch {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Apply the patch to a good in place.
    pub fn apply(&self, good: &mut Good) {
        good.name = self.name.clone();
        if let Some(description) = &self.description {
            good.description = Some(description.clone());
        }
    }
}

/// One row of a reprioritization result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PriorityChange {
    pub id: GoodId,
    pub priority: i64,
}

/// Limit/offset window over the ordered goods collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
}

impl Pagination {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }

    /// Index range of this window inside a collection of `len` items.
    ///
    /// Both ends are clamped to `len`, so an offset past the end yields an
    /// empty range instead of a bounds fault.
    pub fn bounds(&self, len: usize) -> Range<usize> {
        let start = (self.offset as usize).min(len);
        let end = start.saturating_add(self.limit as usize).min(len);
        start..end
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: crate::DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

/// Collection-wide counters returned with every page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GoodsMeta {
    pub limit: u32,
    pub offset: u32,
    /// Number of goods in the whole collection, removed ones included.
    pub total: u64,
    /// Number of soft-deleted goods in the whole collection.
    pub removed: u64,
}

/// A page of goods plus collection-wide metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GoodsPage {
    pub meta: GoodsMeta,
    pub goods: Vec<Good>,
}

impl GoodsPage {
    /// Build a page by slicing a full, ordered snapshot of the collection.
    pub fn from_snapshot(snapshot: &[Good], pagination: Pagination) -> Self {
        let removed = snapshot.iter().filter(|g| g.removed).count() as u64;
        let goods = snapshot[pagination.bounds(snapshot.len())].to_vec();

        Self {
            meta: GoodsMeta {
                limit: pagination.limit,
                offset: pagination.offset,
                total: snapshot.len() as u64,
                removed,
            },
            goods,
        }
    }
}
