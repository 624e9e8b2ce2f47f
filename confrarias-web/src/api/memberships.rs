//! Membership requests and their moderation

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use confrarias_common::models::ConfrariaMember;
use confrarias_common::workflow::memberships::{MemberEntry, MyMembership};

use super::SignedIn;
use crate::error::ApiResult;
use crate::AppState;

/// POST /api/confrarias/:id/membership
pub async fn request_join(
    State(state): State<AppState>,
    caller: SignedIn,
    Path(confraria_id): Path<i64>,
) -> ApiResult<(StatusCode, Json<ConfrariaMember>)> {
    let member = state.memberships.request_join(caller.actor(), confraria_id).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

/// DELETE /api/confrarias/:id/membership
pub async fn cancel_request(
    State(state): State<AppState>,
    caller: SignedIn,
    Path(confraria_id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.memberships.cancel_request(caller.actor(), confraria_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/confrarias/:id/members
pub async fn list_members(
    State(state): State<AppState>,
    caller: SignedIn,
    Path(confraria_id): Path<i64>,
) -> ApiResult<Json<Vec<MemberEntry>>> {
    Ok(Json(state.memberships.list_for_manager(caller.actor(), confraria_id).await?))
}

/// GET /api/memberships/mine
pub async fn list_mine(State(state): State<AppState>, caller: SignedIn) -> ApiResult<Json<Vec<MyMembership>>> {
    Ok(Json(state.memberships.list_mine(caller.actor()).await?))
}

/// POST /api/memberships/:id/approve
pub async fn approve(
    State(state): State<AppState>,
    caller: SignedIn,
    Path(id): Path<i64>,
) -> ApiResult<Json<ConfrariaMember>> {
    Ok(Json(state.memberships.approve(caller.actor(), id).await?))
}

/// POST /api/memberships/:id/reject
pub async fn reject(State(state): State<AppState>, caller: SignedIn, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    state.memberships.reject(caller.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/memberships/:id
pub async fn remove(State(state): State<AppState>, caller: SignedIn, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    state.memberships.remove(caller.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn membership_routes() -> Router<AppState> {
    Router::new()
        .route("/api/confrarias/:id/membership", post(request_join).delete(cancel_request))
        .route("/api/confrarias/:id/members", get(list_members))
        .route("/api/memberships/mine", get(list_mine))
        .route("/api/memberships/:id", delete(remove))
        .route("/api/memberships/:id/approve", post(approve))
        .route("/api/memberships/:id/reject", post(reject))
}
