//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tracing::warn;

use crate::AppState;

/// Status, module, build identification and uptime
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub git_hash: String,
    pub build_timestamp: String,
    pub build_profile: String,
    pub database: String,
    pub uptime_seconds: u64,
}

/// GET /health
///
/// Does not require a session. `status` is "degraded" when the database does
/// not answer.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (status, database) = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => ("ok", "ok"),
        Err(e) => {
            warn!(error = %e, "Health check database probe failed");
            ("degraded", "unavailable")
        }
    };

    Json(HealthResponse {
        status: status.to_string(),
        module: "confrarias-web".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
        build_profile: env!("BUILD_PROFILE").to_string(),
        database: database.to_string(),
        uptime_seconds: state.startup_time.elapsed().as_secs(),
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
