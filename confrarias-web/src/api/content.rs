//! Manager endpoints for a confraria's own content
//!
//! Every route is scoped by the confraria id in the path; the workflow
//! checks that the caller is its responsible (or the admin).

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};
use confrarias_common::models::{Article, Confraria, Event, GalleryImage, ImagePurpose, PublicationStatus, Recipe};
use confrarias_common::workflow::content::{
    ArticlePayload, EventPayload, ImageUpload, ManagedContent, ProfileUpdate, RecipePayload,
};
use serde::Deserialize;

use super::{ApiJson, ApiQuery, SignedIn};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: PublicationStatus,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub purpose: ImagePurpose,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GalleryRequest {
    pub image_url: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// GET /api/confrarias/:id/manage
///
/// Everything the manager can edit, drafts included
pub async fn managed_content(
    State(state): State<AppState>,
    caller: SignedIn,
    Path(id): Path<i64>,
) -> ApiResult<Json<ManagedContent>> {
    Ok(Json(state.content.managed_content(caller.actor(), id).await?))
}

/// PUT /api/confrarias/:id/profile
pub async fn update_profile(
    State(state): State<AppState>,
    caller: SignedIn,
    Path(id): Path<i64>,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> ApiResult<Json<Confraria>> {
    Ok(Json(state.content.update_profile(caller.actor(), id, update).await?))
}

// ============================================================================
// Articles
// ============================================================================

pub async fn create_article(
    State(state): State<AppState>,
    caller: SignedIn,
    Path(id): Path<i64>,
    ApiJson(payload): ApiJson<ArticlePayload>,
) -> ApiResult<(StatusCode, Json<Article>)> {
    let article = state.content.create_article(caller.actor(), id, payload).await?;
    Ok((StatusCode::CREATED, Json(article)))
}

pub async fn update_article(
    State(state): State<AppState>,
    caller: SignedIn,
    Path((id, article_id)): Path<(i64, i64)>,
    ApiJson(payload): ApiJson<ArticlePayload>,
) -> ApiResult<Json<Article>> {
    Ok(Json(state.content.update_article(caller.actor(), id, article_id, payload).await?))
}

pub async fn set_article_status(
    State(state): State<AppState>,
    caller: SignedIn,
    Path((id, article_id)): Path<(i64, i64)>,
    ApiJson(req): ApiJson<StatusRequest>,
) -> ApiResult<Json<Article>> {
    Ok(Json(state.content.set_article_status(caller.actor(), id, article_id, req.status).await?))
}

pub async fn delete_article(
    State(state): State<AppState>,
    caller: SignedIn,
    Path((id, article_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    state.content.delete_article(caller.actor(), id, article_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Recipes
// ============================================================================

pub async fn create_recipe(
    State(state): State<AppState>,
    caller: SignedIn,
    Path(id): Path<i64>,
    ApiJson(payload): ApiJson<RecipePayload>,
) -> ApiResult<(StatusCode, Json<Recipe>)> {
    let recipe = state.content.create_recipe(caller.actor(), id, payload).await?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

pub async fn update_recipe(
    State(state): State<AppState>,
    caller: SignedIn,
    Path((id, recipe_id)): Path<(i64, i64)>,
    ApiJson(payload): ApiJson<RecipePayload>,
) -> ApiResult<Json<Recipe>> {
    Ok(Json(state.content.update_recipe(caller.actor(), id, recipe_id, payload).await?))
}

pub async fn set_recipe_status(
    State(state): State<AppState>,
    caller: SignedIn,
    Path((id, recipe_id)): Path<(i64, i64)>,
    ApiJson(req): ApiJson<StatusRequest>,
) -> ApiResult<Json<Recipe>> {
    Ok(Json(state.content.set_recipe_status(caller.actor(), id, recipe_id, req.status).await?))
}

pub async fn delete_recipe(
    State(state): State<AppState>,
    caller: SignedIn,
    Path((id, recipe_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    state.content.delete_recipe(caller.actor(), id, recipe_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Events
// ============================================================================

pub async fn create_event(
    State(state): State<AppState>,
    caller: SignedIn,
    Path(id): Path<i64>,
    ApiJson(payload): ApiJson<EventPayload>,
) -> ApiResult<(StatusCode, Json<Event>)> {
    let event = state.content.create_event(caller.actor(), id, payload).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn update_event(
    State(state): State<AppState>,
    caller: SignedIn,
    Path((id, event_id)): Path<(i64, i64)>,
    ApiJson(payload): ApiJson<EventPayload>,
) -> ApiResult<Json<Event>> {
    Ok(Json(state.content.update_event(caller.actor(), id, event_id, payload).await?))
}

pub async fn delete_event(
    State(state): State<AppState>,
    caller: SignedIn,
    Path((id, event_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    state.content.delete_event(caller.actor(), id, event_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Images
// ============================================================================

/// POST /api/confrarias/:id/images?purpose=seal|cover|gallery|content&description=
///
/// The body is the raw image; its type comes from `Content-Type`.
pub async fn upload_image(
    State(state): State<AppState>,
    caller: SignedIn,
    Path(id): Path<i64>,
    ApiQuery(query): ApiQuery<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<ImageUpload>)> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase())
        .ok_or_else(|| ApiError::BadRequest("Falta o cabeçalho Content-Type".to_string()))?;

    let upload = state
        .content
        .upload_image(caller.actor(), id, query.purpose, &content_type, &body, query.description)
        .await?;
    Ok((StatusCode::CREATED, Json(upload)))
}

/// POST /api/confrarias/:id/gallery
///
/// Registers an image that is already hosted elsewhere
pub async fn add_gallery_image(
    State(state): State<AppState>,
    caller: SignedIn,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<GalleryRequest>,
) -> ApiResult<(StatusCode, Json<GalleryImage>)> {
    let image = state
        .content
        .add_gallery_image(caller.actor(), id, &req.image_url, req.description)
        .await?;
    Ok((StatusCode::CREATED, Json(image)))
}

pub async fn delete_gallery_image(
    State(state): State<AppState>,
    caller: SignedIn,
    Path((id, image_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    state.content.delete_gallery_image(caller.actor(), id, image_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn content_routes() -> Router<AppState> {
    Router::new()
        .route("/api/confrarias/:id/manage", get(managed_content))
        .route("/api/confrarias/:id/profile", put(update_profile))
        .route("/api/confrarias/:id/articles", post(create_article))
        .route("/api/confrarias/:id/articles/:article_id", put(update_article).delete(delete_article))
        .route("/api/confrarias/:id/articles/:article_id/status", put(set_article_status))
        .route("/api/confrarias/:id/recipes", post(create_recipe))
        .route("/api/confrarias/:id/recipes/:recipe_id", put(update_recipe).delete(delete_recipe))
        .route("/api/confrarias/:id/recipes/:recipe_id/status", put(set_recipe_status))
        .route("/api/confrarias/:id/events", post(create_event))
        .route("/api/confrarias/:id/events/:event_id", put(update_event).delete(delete_event))
        .route("/api/confrarias/:id/images", post(upload_image))
        .route("/api/confrarias/:id/gallery", post(add_gallery_image))
        .route("/api/confrarias/:id/gallery/:image_id", delete(delete_gallery_image))
}
