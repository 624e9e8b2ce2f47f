//! Login page

use axum::{response::Html, routing::get, Router};

use crate::AppState;

const LOGIN_HTML: &str = include_str!("../ui/login.html");

/// GET /login
///
/// Target of the redirect sent to anonymous callers
pub async fn serve_login() -> Html<&'static str> {
    Html(LOGIN_HTML)
}

pub fn ui_routes() -> Router<AppState> {
    Router::new().route("/login", get(serve_login))
}
