//! Goods REST API Routes
//!
//! Thin handlers: parse and validate the request, call [`GoodsService`],
//! shape the response. Every success answers `200 OK`.

use axum::{
    extract::{Query, State},
    routing::{delete, get, patch, post},
    Json, Router,
};

use goods_core::{Good, GoodsPage};

use crate::{
    error::ApiResult,
    services::GoodsService,
    state::AppState,
    types::{
        CreateGoodRequest, DeleteGoodResponse, GoodQuery, ListQuery, ProjectQuery,
        ReprioritizeRequest, ReprioritizeResponse, UpdateGoodRequest,
    },
};

#[cfg(feature = "openapi")]
use crate::error::ApiError;

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /goods/list - One page of goods with collection counters
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/goods/list",
    tag = "Goods",
    params(ListQuery),
    responses(
        (status = 200, description = "Page of goods", body = GoodsPage),
        (status = 400, description = "Invalid limit or offset", body = ApiError),
        (status = 500, description = "Storage failure", body = ApiError),
    ),
))]
pub async fn list_goods(
    State(service): State<GoodsService>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<GoodsPage>> {
    let pagination = query.to_pagination()?;
    let page = service.goods(pagination).await?;
    Ok(Json(page))
}

/// POST /goods/create - Create a good at the end of the priority order
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/goods/create",
    tag = "Goods",
    params(ProjectQuery),
    request_body = CreateGoodRequest,
    responses(
        (status = 200, description = "Good created", body = Good),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 500, description = "Storage failure", body = ApiError),
    ),
))]
pub async fn create_good(
    State(service): State<GoodsService>,
    Query(query): Query<ProjectQuery>,
    Json(req): Json<CreateGoodRequest>,
) -> ApiResult<Json<Good>> {
    query.validate()?;
    req.validate()?;

    let good = service.create_good(query.project_id, &req.name).await?;
    Ok(Json(good))
}

/// PATCH /goods/update - Rename a good and optionally replace its description
#[cfg_attr(feature = "openapi", utoipa::path(
    patch,
    path = "/goods/update",
    tag = "Goods",
    params(GoodQuery),
    request_body = UpdateGoodRequest,
    responses(
        (status = 200, description = "Good updated", body = Good),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Good not found", body = ApiError),
    ),
))]
pub async fn update_good(
    State(service): State<GoodsService>,
    Query(query): Query<GoodQuery>,
    Json(req): Json<UpdateGoodRequest>,
) -> ApiResult<Json<Good>> {
    query.validate()?;
    req.validate()?;

    let good = service
        .update_good(&req.to_patch(), query.id, query.project_id)
        .await?;
    Ok(Json(good))
}

/// DELETE /goods/delete - Soft-delete a good
#[cfg_attr(feature = "openapi", utoipa::path(
    delete,
    path = "/goods/delete",
    tag = "Goods",
    params(GoodQuery),
    responses(
        (status = 200, description = "Good removed", body = DeleteGoodResponse),
        (status = 404, description = "Good not found", body = ApiError),
    ),
))]
pub async fn delete_good(
    State(service): State<GoodsService>,
    Query(query): Query<GoodQuery>,
) -> ApiResult<Json<DeleteGoodResponse>> {
    query.validate()?;

    let good = service.delete_good(query.id, query.project_id).await?;
    Ok(Json(DeleteGoodResponse {
        id: good.id,
        project_id: good.project_id,
        removed: good.removed,
    }))
}

/// PATCH /goods/reprioritize - Shift the anchor and every later good
#[cfg_attr(feature = "openapi", utoipa::path(
    patch,
    path = "/goods/reprioritize",
    tag = "Goods",
    params(GoodQuery),
    request_body = ReprioritizeRequest,
    responses(
        (status = 200, description = "New priorities of the shifted goods", body = ReprioritizeResponse),
        (status = 404, description = "Good not found", body = ApiError),
    ),
))]
pub async fn reprioritize_good(
    State(service): State<GoodsService>,
    Query(query): Query<GoodQuery>,
    Json(req): Json<ReprioritizeRequest>,
) -> ApiResult<Json<ReprioritizeResponse>> {
    query.validate()?;

    let priorities = service
        .reprioritize_good(query.id, query.project_id, req.new_priority)
        .await?;
    Ok(Json(ReprioritizeResponse { priorities }))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/list", get(list_goods))
        .route("/create", post(create_good))
        .route("/update", patch(update_good))
        .route("/delete", delete(delete_good))
        .route("/reprioritize", patch(reprioritize_good))
}
