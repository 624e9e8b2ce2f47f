//! Public discovery catalog plus seals and testimonials

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use confrarias_common::models::{DiscoveryType, Testimonial};
use confrarias_common::pagination::Page;
use confrarias_common::workflow::catalog::{DiscoveryDetail, DiscoveryFilter, DiscoverySummary};
use confrarias_common::workflow::community::{SealState, TestimonialView};
use serde::{Deserialize, Serialize};

use super::{ApiJson, ApiQuery, MaybeActor, SignedIn};
use crate::error::ApiResult;
use crate::AppState;

/// Discovery page with the caller's seal state
#[derive(Debug, Serialize)]
pub struct DiscoveryPage {
    #[serde(flatten)]
    pub detail: DiscoveryDetail,
    pub sealed_by_me: bool,
}

#[derive(Debug, Deserialize)]
pub struct TestimonialRequest {
    pub discovery_id: i64,
    pub content: String,
}

/// GET /api/discoveries?region=&type_id=&confraria_id=&q=&page=
pub async fn list_discoveries(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<DiscoveryFilter>,
) -> ApiResult<Json<Page<DiscoverySummary>>> {
    Ok(Json(state.catalog.list_discoveries(&filter).await?))
}

/// GET /api/discoveries/:slug
pub async fn get_discovery(
    State(state): State<AppState>,
    caller: MaybeActor,
    Path(slug): Path<String>,
) -> ApiResult<Json<DiscoveryPage>> {
    let detail = state.catalog.get_discovery_by_slug(&slug).await?;
    let sealed_by_me = state.community.has_sealed(caller.actor(), detail.discovery.id).await?;
    Ok(Json(DiscoveryPage { detail, sealed_by_me }))
}

/// GET /api/discovery-types
pub async fn list_types(State(state): State<AppState>) -> ApiResult<Json<Vec<DiscoveryType>>> {
    Ok(Json(state.catalog.list_types().await?))
}

// ============================================================================
// Seals
// ============================================================================

/// POST /api/seals/:discovery_id
pub async fn grant_seal(
    State(state): State<AppState>,
    caller: SignedIn,
    Path(discovery_id): Path<i64>,
) -> ApiResult<Json<SealState>> {
    Ok(Json(state.community.grant_seal(caller.actor(), discovery_id).await?))
}

/// DELETE /api/seals/:discovery_id
pub async fn revoke_seal(
    State(state): State<AppState>,
    caller: SignedIn,
    Path(discovery_id): Path<i64>,
) -> ApiResult<Json<SealState>> {
    Ok(Json(state.community.revoke_seal(caller.actor(), discovery_id).await?))
}

/// POST /api/seals/:discovery_id/toggle
pub async fn toggle_seal(
    State(state): State<AppState>,
    caller: SignedIn,
    Path(discovery_id): Path<i64>,
) -> ApiResult<Json<SealState>> {
    Ok(Json(state.community.toggle_seal(caller.actor(), discovery_id).await?))
}

// ============================================================================
// Testimonials
// ============================================================================

/// GET /api/discoveries/:slug/testimonials
pub async fn list_testimonials(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Vec<TestimonialView>>> {
    let detail = state.catalog.get_discovery_by_slug(&slug).await?;
    Ok(Json(detail.testimonials))
}

/// POST /api/testimonials
pub async fn create_testimonial(
    State(state): State<AppState>,
    caller: SignedIn,
    ApiJson(req): ApiJson<TestimonialRequest>,
) -> ApiResult<(StatusCode, Json<Testimonial>)> {
    let testimonial = state
        .community
        .create_testimonial(caller.actor(), req.discovery_id, &req.content)
        .await?;
    Ok((StatusCode::CREATED, Json(testimonial)))
}

/// DELETE /api/testimonials/:id
pub async fn delete_testimonial(
    State(state): State<AppState>,
    caller: SignedIn,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.community.delete_testimonial(caller.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn discovery_routes() -> Router<AppState> {
    Router::new()
        .route("/api/discoveries", get(list_discoveries))
        .route("/api/discoveries/:slug", get(get_discovery))
        .route("/api/discoveries/:slug/testimonials", get(list_testimonials))
        .route("/api/discovery-types", get(list_types))
        .route("/api/seals/:discovery_id", post(grant_seal).delete(revoke_seal))
        .route("/api/seals/:discovery_id/toggle", post(toggle_seal))
        .route("/api/testimonials", post(create_testimonial))
        .route("/api/testimonials/:id", delete(delete_testimonial))
}
