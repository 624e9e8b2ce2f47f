//! Community submissions from the submitter's side

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use confrarias_common::models::Submission;
use confrarias_common::workflow::submissions::{EditOutcome, SubmissionPayload};

use super::{ApiJson, SignedIn};
use crate::error::ApiResult;
use crate::AppState;

/// POST /api/submissions
pub async fn create_submission(
    State(state): State<AppState>,
    caller: SignedIn,
    ApiJson(payload): ApiJson<SubmissionPayload>,
) -> ApiResult<(StatusCode, Json<Submission>)> {
    let submission = state.submissions.create(caller.actor(), payload).await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

/// GET /api/submissions/mine
pub async fn list_mine(State(state): State<AppState>, caller: SignedIn) -> ApiResult<Json<Vec<Submission>>> {
    Ok(Json(state.submissions.list_mine(caller.actor()).await?))
}

/// GET /api/submissions/:id
pub async fn get_submission(
    State(state): State<AppState>,
    caller: SignedIn,
    Path(id): Path<i64>,
) -> ApiResult<Json<Submission>> {
    Ok(Json(state.submissions.get(caller.actor(), id).await?))
}

/// PUT /api/submissions/:id
///
/// Once approved the edit lands on the published discovery instead.
pub async fn edit_submission(
    State(state): State<AppState>,
    caller: SignedIn,
    Path(id): Path<i64>,
    ApiJson(payload): ApiJson<SubmissionPayload>,
) -> ApiResult<Json<EditOutcome>> {
    Ok(Json(state.submissions.edit(caller.actor(), id, payload).await?))
}

pub fn submission_routes() -> Router<AppState> {
    Router::new()
        .route("/api/submissions", post(create_submission))
        .route("/api/submissions/mine", get(list_mine))
        .route("/api/submissions/:id", get(get_submission).put(edit_submission))
}
