//! Public confraria pages

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use confrarias_common::models::Confraria;
use confrarias_common::workflow::catalog::ConfrariaDetail;

use crate::error::ApiResult;
use crate::AppState;

/// GET /api/confrarias
pub async fn list_confrarias(State(state): State<AppState>) -> ApiResult<Json<Vec<Confraria>>> {
    Ok(Json(state.catalog.list_confrarias().await?))
}

/// GET /api/confrarias/:id
///
/// Profile, discoveries and published content only
pub async fn get_confraria(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<ConfrariaDetail>> {
    Ok(Json(state.catalog.get_confraria(id).await?))
}

pub fn confraria_routes() -> Router<AppState> {
    Router::new()
        .route("/api/confrarias", get(list_confrarias))
        .route("/api/confrarias/:id", get(get_confraria))
}
