//! Rank lookup and settings readable by any signed-in user

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use confrarias_common::rank::RankStatus;
use serde::Serialize;

use super::SignedIn;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct MapboxKeyResponse {
    pub mapbox_api_key: Option<String>,
}

/// GET /api/users/:id/rank
pub async fn user_rank(State(state): State<AppState>, Path(user_id): Path<String>) -> ApiResult<Json<RankStatus>> {
    Ok(Json(state.users.user_rank(&user_id).await?))
}

/// GET /api/settings/mapbox
pub async fn mapbox_api_key(State(state): State<AppState>, caller: SignedIn) -> ApiResult<Json<MapboxKeyResponse>> {
    let mapbox_api_key = state.users.mapbox_api_key(caller.actor()).await?;
    Ok(Json(MapboxKeyResponse { mapbox_api_key }))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users/:id/rank", get(user_rank))
        .route("/api/settings/mapbox", get(mapbox_api_key))
}
