//! OpenAPI Specification for the Goods API
//!
//! Generated with utoipa from the route annotations and the schema derives
//! on the request, response and domain types.

use utoipa::OpenApi;

use crate::error::{ApiError, ErrorCode};
use crate::routes::{goods, health};
use crate::telemetry::metrics;
use crate::types::{
    CreateGoodRequest, DeleteGoodResponse, HealthResponse, ReprioritizeRequest,
    ReprioritizeResponse, UpdateGoodRequest,
};

use goods_core::{Good, GoodsMeta, GoodsPage, PriorityChange};

/// OpenAPI document for the Goods API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Goods API",
        version = "0.1.0",
        description = "Goods catalog with cached listing, ordered priorities and an audit trail"
    ),
    servers(
        (url = "http://localhost:8080", description = "Local Development")
    ),
    tags(
        (name = "Goods", description = "Catalog listing and mutations"),
        (name = "Health", description = "Liveness probe"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        // === Goods Routes ===
        goods::list_goods,
        goods::create_good,
        goods::update_good,
        goods::delete_good,
        goods::reprioritize_good,

        // === Health ===
        health::health,

        // === Observability ===
        metrics::metrics_handler,
    ),
    components(
        schemas(
            // === Error Types ===
            ApiError, ErrorCode,

            // === Request/Response Types ===
            CreateGoodRequest, UpdateGoodRequest, ReprioritizeRequest,
            DeleteGoodResponse, ReprioritizeResponse, HealthResponse,

            // === Domain Types (from goods-core) ===
            Good, GoodsMeta, GoodsPage, PriorityChange,
        )
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate OpenAPI spec as JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() -> Result<(), String> {
        let openapi = ApiDoc::openapi();
        assert_eq!(openapi.info.title, "Goods API");

        let tags = openapi
            .tags
            .as_ref()
            .ok_or_else(|| "OpenAPI tags missing".to_string())?;
        assert_eq!(tags.len(), 3);
        Ok(())
    }

    #[test]
    fn test_openapi_paths_exist() {
        let openapi = ApiDoc::openapi();
        for path in [
            "/goods/list",
            "/goods/create",
            "/goods/update",
            "/goods/delete",
            "/goods/reprioritize",
            "/health",
            "/metrics",
        ] {
            assert!(openapi.paths.paths.contains_key(path), "missing {}", path);
        }
    }

    #[test]
    fn test_openapi_json_serialization() -> Result<(), String> {
        let json = ApiDoc::to_json().map_err(|e| format!("Failed to serialize OpenAPI: {}", e))?;
        let _: serde_json::Value =
            serde_json::from_str(&json).map_err(|e| format!("Generated JSON invalid: {}", e))?;
        assert!(json.contains("Goods API"));
        Ok(())
    }
}
