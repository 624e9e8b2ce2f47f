//! Admin endpoints
//!
//! Routes live under `/api/admin`; the workflows reject non-admin callers,
//! so nothing here checks privileges itself.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use confrarias_common::identity::UserMetadataUpdate;
use confrarias_common::models::{Confraria, Discovery, DiscoveryType, Submission, SubmissionStatus};
use confrarias_common::workflow::catalog::{ConfrariaPayload, DiscoveryPayload};
use confrarias_common::workflow::users::UserOverview;
use serde::Deserialize;
use tracing::info;

use super::users::MapboxKeyResponse;
use super::{ApiJson, ApiQuery, SignedIn};
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmissionQuery {
    #[serde(default)]
    pub status: Option<SubmissionStatus>,
}

#[derive(Debug, Deserialize)]
pub struct TypeRequest {
    pub name: String,
}

/// `email: null` clears the responsible
#[derive(Debug, Deserialize)]
pub struct ResponsibleRequest {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserUpdateRequest {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub rank_override: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MapboxKeyRequest {
    pub mapbox_api_key: String,
}

// ============================================================================
// Submissions
// ============================================================================

/// GET /api/admin/submissions?status=Pendente
pub async fn list_submissions(
    State(state): State<AppState>,
    caller: SignedIn,
    ApiQuery(query): ApiQuery<SubmissionQuery>,
) -> ApiResult<Json<Vec<Submission>>> {
    Ok(Json(state.submissions.list(caller.actor(), query.status).await?))
}

/// POST /api/admin/submissions/:id/approve
///
/// Returns the discovery the submission became
pub async fn approve_submission(
    State(state): State<AppState>,
    caller: SignedIn,
    Path(id): Path<i64>,
) -> ApiResult<Json<Discovery>> {
    Ok(Json(state.submissions.approve(caller.actor(), id).await?))
}

/// POST /api/admin/submissions/:id/reject
pub async fn reject_submission(
    State(state): State<AppState>,
    caller: SignedIn,
    Path(id): Path<i64>,
) -> ApiResult<Json<Submission>> {
    Ok(Json(state.submissions.reject(caller.actor(), id).await?))
}

// ============================================================================
// Discovery types
// ============================================================================

pub async fn create_type(
    State(state): State<AppState>,
    caller: SignedIn,
    ApiJson(req): ApiJson<TypeRequest>,
) -> ApiResult<(StatusCode, Json<DiscoveryType>)> {
    let created = state.catalog.create_type(caller.actor(), &req.name).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn rename_type(
    State(state): State<AppState>,
    caller: SignedIn,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<TypeRequest>,
) -> ApiResult<Json<DiscoveryType>> {
    Ok(Json(state.catalog.rename_type(caller.actor(), id, &req.name).await?))
}

/// DELETE /api/admin/discovery-types/:id
///
/// 409 while any discovery or submission still uses the type
pub async fn delete_type(State(state): State<AppState>, caller: SignedIn, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    state.catalog.delete_type(caller.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Discoveries
// ============================================================================

pub async fn create_discovery(
    State(state): State<AppState>,
    caller: SignedIn,
    ApiJson(payload): ApiJson<DiscoveryPayload>,
) -> ApiResult<(StatusCode, Json<Discovery>)> {
    let discovery = state.catalog.create_discovery(caller.actor(), payload).await?;
    Ok((StatusCode::CREATED, Json(discovery)))
}

pub async fn update_discovery(
    State(state): State<AppState>,
    caller: SignedIn,
    Path(id): Path<i64>,
    ApiJson(payload): ApiJson<DiscoveryPayload>,
) -> ApiResult<Json<Discovery>> {
    Ok(Json(state.catalog.update_discovery(caller.actor(), id, payload).await?))
}

pub async fn delete_discovery(
    State(state): State<AppState>,
    caller: SignedIn,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.catalog.delete_discovery(caller.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Confrarias
// ============================================================================

pub async fn create_confraria(
    State(state): State<AppState>,
    caller: SignedIn,
    ApiJson(payload): ApiJson<ConfrariaPayload>,
) -> ApiResult<(StatusCode, Json<Confraria>)> {
    let confraria = state.catalog.create_confraria(caller.actor(), payload).await?;
    Ok((StatusCode::CREATED, Json(confraria)))
}

pub async fn delete_confraria(
    State(state): State<AppState>,
    caller: SignedIn,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.catalog.delete_confraria(caller.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/admin/confrarias/:id/responsible
pub async fn assign_responsible(
    State(state): State<AppState>,
    caller: SignedIn,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<ResponsibleRequest>,
) -> ApiResult<Json<Confraria>> {
    let confraria = state
        .catalog
        .assign_responsible(caller.actor(), id, req.email.as_deref())
        .await?;
    Ok(Json(confraria))
}

// ============================================================================
// Users
// ============================================================================

pub async fn list_users(State(state): State<AppState>, caller: SignedIn) -> ApiResult<Json<Vec<UserOverview>>> {
    Ok(Json(state.users.list_users(caller.actor()).await?))
}

/// PUT /api/admin/users/:id
///
/// Absent fields stay as they are; an empty `rank_override` clears it
pub async fn update_user(
    State(state): State<AppState>,
    caller: SignedIn,
    Path(user_id): Path<String>,
    ApiJson(req): ApiJson<UserUpdateRequest>,
) -> ApiResult<Json<UserOverview>> {
    let update = UserMetadataUpdate {
        full_name: req.full_name,
        rank_override: req.rank_override,
    };
    Ok(Json(state.users.update_user(caller.actor(), &user_id, update).await?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    caller: SignedIn,
    Path(user_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.users.delete_user(caller.actor(), &user_id).await?;
    info!(user_id = %user_id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Settings
// ============================================================================

/// PUT /api/admin/settings/mapbox
pub async fn set_mapbox_api_key(
    State(state): State<AppState>,
    caller: SignedIn,
    ApiJson(req): ApiJson<MapboxKeyRequest>,
) -> ApiResult<Json<MapboxKeyResponse>> {
    state.users.set_mapbox_api_key(caller.actor(), &req.mapbox_api_key).await?;
    let mapbox_api_key = state.users.mapbox_api_key(caller.actor()).await?;
    Ok(Json(MapboxKeyResponse { mapbox_api_key }))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/submissions", get(list_submissions))
        .route("/api/admin/submissions/:id/approve", post(approve_submission))
        .route("/api/admin/submissions/:id/reject", post(reject_submission))
        .route("/api/admin/discovery-types", post(create_type))
        .route("/api/admin/discovery-types/:id", put(rename_type).delete(delete_type))
        .route("/api/admin/discoveries", post(create_discovery))
        .route("/api/admin/discoveries/:id", put(update_discovery).delete(delete_discovery))
        .route("/api/admin/confrarias", post(create_confraria))
        .route("/api/admin/confrarias/:id", delete(delete_confraria))
        .route("/api/admin/confrarias/:id/responsible", put(assign_responsible))
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/:id", put(update_user).delete(delete_user))
        .route("/api/admin/settings/mapbox", put(set_mapbox_api_key))
}
