//! Account endpoints: sign-up, sign-in, sign-out and the caller's profile

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use confrarias_common::identity::{Session, UserIdentity};
use confrarias_common::workflow::users::UserOverview;
use serde::Deserialize;
use tracing::info;

use super::session::{bearer_token, SignedIn};
use super::ApiJson;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// POST /auth/sign-up
pub async fn sign_up(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SignUpRequest>,
) -> ApiResult<(StatusCode, Json<UserIdentity>)> {
    let user = state.identity.sign_up(&req.email, &req.password, req.full_name).await?;
    info!(user_id = %user.id, "Account created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /auth/sign-in
pub async fn sign_in(State(state): State<AppState>, ApiJson(req): ApiJson<SignInRequest>) -> ApiResult<Json<Session>> {
    let session = state.identity.sign_in_with_password(&req.email, &req.password).await?;
    Ok(Json(session))
}

/// POST /auth/sign-out
///
/// Always 204; signing out without a session does nothing.
pub async fn sign_out(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<StatusCode> {
    if let Some(token) = bearer_token(&headers) {
        state.identity.sign_out(token).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /auth/me
pub async fn me(State(state): State<AppState>, caller: SignedIn) -> ApiResult<Json<UserOverview>> {
    Ok(Json(state.users.me(caller.actor()).await?))
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/sign-up", post(sign_up))
        .route("/auth/sign-in", post(sign_in))
        .route("/auth/sign-out", post(sign_out))
        .route("/auth/me", get(me))
}
