//! confrarias-web library - HTTP surface of the confrarias directory
//!
//! Every handler resolves the caller from the session token and calls one
//! workflow operation; authorization and validation live in the workflows.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use confrarias_common::blob::BlobStore;
use confrarias_common::identity::IdentityProvider;
use confrarias_common::validation::MAX_IMAGE_BYTES;
use confrarias_common::workflow::{
    CatalogWorkflow, CommunityWorkflow, ContentWorkflow, MembershipWorkflow, SubmissionWorkflow, UserWorkflow,
};
use confrarias_common::AuthorizationGuard;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;

/// Request bodies above this are refused before reaching a handler
pub const MAX_BODY_BYTES: usize = MAX_IMAGE_BYTES + 1024 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub identity: Arc<dyn IdentityProvider>,
    pub submissions: SubmissionWorkflow,
    pub memberships: MembershipWorkflow,
    pub content: ContentWorkflow,
    pub catalog: CatalogWorkflow,
    pub community: CommunityWorkflow,
    pub users: UserWorkflow,
    /// Directory served under `/storage`
    pub storage_root: PathBuf,
    pub startup_time: Instant,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        admin_email: &str,
        identity: Arc<dyn IdentityProvider>,
        blobs: Arc<dyn BlobStore>,
        storage_root: PathBuf,
    ) -> Self {
        let guard = AuthorizationGuard::new(admin_email);
        Self {
            submissions: SubmissionWorkflow::new(db.clone(), guard.clone()),
            memberships: MembershipWorkflow::new(db.clone(), guard.clone(), identity.clone()),
            content: ContentWorkflow::new(db.clone(), guard.clone(), blobs),
            catalog: CatalogWorkflow::new(db.clone(), guard.clone(), identity.clone()),
            community: CommunityWorkflow::new(db.clone(), guard.clone(), identity.clone()),
            users: UserWorkflow::new(db.clone(), guard.clone(), identity.clone()),
            db,
            identity,
            storage_root,
            startup_time: Instant::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let storage = ServeDir::new(&state.storage_root);

    Router::new()
        .merge(api::health_routes())
        .merge(api::ui_routes())
        .merge(api::auth_routes())
        .merge(api::discovery_routes())
        .merge(api::confraria_routes())
        .merge(api::membership_routes())
        .merge(api::content_routes())
        .merge(api::submission_routes())
        .merge(api::user_routes())
        .merge(api::admin_routes())
        .nest_service("/storage", storage)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
