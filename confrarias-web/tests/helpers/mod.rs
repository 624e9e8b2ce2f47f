//! Test Helper Utilities
//!
//! Builds the full router over an in-memory database and a temporary
//! storage folder, and drives it with `oneshot` requests.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use confrarias_common::blob::LocalBlobStore;
use confrarias_common::db::init_memory_database;
use confrarias_common::identity::SqliteIdentity;
use confrarias_web::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method

pub const ADMIN_EMAIL: &str = "admin@confrarias.pt";
pub const PASSWORD: &str = "segredo123";
pub const BASE_URL: &str = "http://test.local";

pub struct TestApp {
    pub router: Router,
    pub storage: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("Should parse JSON")
    }
}

impl TestApp {
    pub async fn new() -> Self {
        let pool = init_memory_database().await.expect("Should create test database");
        let storage = TempDir::new().expect("Should create storage folder");
        let identity = Arc::new(SqliteIdentity::new(pool.clone()));
        let blobs = Arc::new(LocalBlobStore::new(storage.path(), BASE_URL));
        let state = AppState::new(pool, ADMIN_EMAIL, identity, blobs, storage.path().to_path_buf());
        Self {
            router: build_router(state),
            storage,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Should read body")
            .to_vec();
        TestResponse { status, location, body }
    }

    /// JSON request; `token` becomes a bearer header
    pub async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.call("GET", uri, token, None).await
    }

    /// Create an account and return a session token for it
    pub async fn sign_up_and_in(&self, email: &str) -> String {
        let created = self
            .call(
                "POST",
                "/auth/sign-up",
                None,
                Some(json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(created.status, StatusCode::CREATED, "sign-up failed for {}", email);

        let session = self
            .call(
                "POST",
                "/auth/sign-in",
                None,
                Some(json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(session.status, StatusCode::OK);
        session.json()["token"].as_str().unwrap().to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.sign_up_and_in(ADMIN_EMAIL).await
    }

    /// Discovery type created through the admin API; returns its id
    pub async fn create_type(&self, admin: &str, name: &str) -> i64 {
        let response = self
            .call("POST", "/api/admin/discovery-types", Some(admin), Some(json!({ "name": name })))
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
        response.json()["id"].as_i64().unwrap()
    }

    /// Confraria created through the admin API; returns its id
    pub async fn create_confraria(&self, admin: &str, name: &str) -> i64 {
        let response = self
            .call(
                "POST",
                "/api/admin/confrarias",
                Some(admin),
                Some(json!({ "name": name, "region": "Norte" })),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
        response.json()["id"].as_i64().unwrap()
    }
}

pub fn submission_body(type_id: i64) -> Value {
    json!({
        "discovery_title": "Pastel de Tentugal",
        "editorial": "Massa finíssima recheada de doce de ovos, feita à mão há gerações.",
        "region": "Centro",
        "type_id": type_id,
    })
}

/// Smallest byte string recognised as a PNG
pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
