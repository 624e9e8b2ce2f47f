//! Integration tests for the confrarias-web HTTP API
//!
//! Each test builds the full router over a fresh in-memory database and
//! exercises it through `oneshot` requests.

mod helpers;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use helpers::*;
use serde_json::json;

// =============================================================================
// Health and login page
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new().await;

    let response = app.get("/health", None).await;
    assert_eq!(response.status, StatusCode::OK);

    let body = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "confrarias-web");
    assert_eq!(body["database"], "ok");
    assert!(body["version"].is_string());
    assert!(body["git_hash"].is_string());
}

#[tokio::test]
async fn test_login_page_served() {
    let app = TestApp::new().await;

    let response = app.get("/login", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(String::from_utf8_lossy(&response.body).contains("Iniciar sessão"));
}

// =============================================================================
// Sessions
// =============================================================================

#[tokio::test]
async fn test_anonymous_mutation_redirects_to_login() {
    let app = TestApp::new().await;

    let response = app
        .call("POST", "/api/submissions", None, Some(submission_body(1)))
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location.as_deref(), Some("/login"));
}

#[tokio::test]
async fn test_unknown_token_is_treated_as_anonymous() {
    let app = TestApp::new().await;

    let response = app.get("/auth/me", Some("not-a-real-token")).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_sign_in_me_and_sign_out() {
    let app = TestApp::new().await;
    let token = app.sign_up_and_in("confrade@example.pt").await;

    let me = app.get("/auth/me", Some(&token)).await;
    assert_eq!(me.status, StatusCode::OK);
    let body = me.json();
    assert_eq!(body["email"], "confrade@example.pt");
    assert_eq!(body["is_admin"], false);
    assert_eq!(body["rank"]["rank_name"], "Noviço");

    let out = app.call("POST", "/auth/sign-out", Some(&token), None).await;
    assert_eq!(out.status, StatusCode::NO_CONTENT);

    let after = app.get("/auth/me", Some(&token)).await;
    assert_eq!(after.status, StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_wrong_password_is_field_error() {
    let app = TestApp::new().await;
    app.sign_up_and_in("confrade@example.pt").await;

    let response = app
        .call(
            "POST",
            "/auth/sign-in",
            None,
            Some(json!({ "email": "confrade@example.pt", "password": "errada" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    let fields = response.json()["error"]["fields"].clone();
    assert!(fields.as_array().unwrap().iter().any(|f| f["field"] == "password"));
}

#[tokio::test]
async fn test_duplicate_sign_up_conflicts() {
    let app = TestApp::new().await;
    app.sign_up_and_in("confrade@example.pt").await;

    let response = app
        .call(
            "POST",
            "/auth/sign-up",
            None,
            Some(json!({ "email": "Confrade@Example.pt", "password": PASSWORD })),
        )
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

// =============================================================================
// Submissions and moderation
// =============================================================================

#[tokio::test]
async fn test_submission_validation_lists_fields() {
    let app = TestApp::new().await;
    let token = app.sign_up_and_in("confrade@example.pt").await;

    let response = app
        .call(
            "POST",
            "/api/submissions",
            Some(&token),
            Some(json!({
                "discovery_title": "Ab",
                "editorial": "curto",
                "region": "Norte",
                "type_id": 999,
            })),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);

    let body = response.json();
    let fields: Vec<String> = body["error"]["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap().to_string())
        .collect();
    assert!(fields.contains(&"discovery_title".to_string()));
    assert!(fields.contains(&"editorial".to_string()));
    assert!(fields.contains(&"type_id".to_string()));
}

/// Field names reported in a 422 envelope
fn field_names(response: &TestResponse) -> Vec<String> {
    response.json()["error"]["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_unknown_region_is_field_error() {
    let app = TestApp::new().await;
    let user = app.sign_up_and_in("confrade@example.pt").await;

    let mut body = submission_body(1);
    body["region"] = json!("Marte");
    let response = app.call("POST", "/api/submissions", Some(&user), Some(body)).await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json()["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(field_names(&response), vec!["region".to_string()]);
}

#[tokio::test]
async fn test_missing_field_is_field_error() {
    let app = TestApp::new().await;
    let user = app.sign_up_and_in("confrade@example.pt").await;

    let mut body = submission_body(1);
    body.as_object_mut().unwrap().remove("editorial");
    let response = app.call("POST", "/api/submissions", Some(&user), Some(body)).await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(field_names(&response), vec!["editorial".to_string()]);
}

#[tokio::test]
async fn test_anonymous_malformed_body_still_redirects() {
    let app = TestApp::new().await;

    let response = app.call("POST", "/api/submissions", None, Some(json!({}))).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location.as_deref(), Some("/login"));
}

#[tokio::test]
async fn test_bad_listing_query_is_field_error() {
    let app = TestApp::new().await;

    let response = app.get("/api/discoveries?region=Marte", None).await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json()["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_submission_approval_publishes_discovery() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let user = app.sign_up_and_in("confrade@example.pt").await;
    let type_id = app.create_type(&admin, "Doçaria").await;

    let created = app
        .call("POST", "/api/submissions", Some(&user), Some(submission_body(type_id)))
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let submission = created.json();
    assert_eq!(submission["status"], "Pendente");
    let id = submission["id"].as_i64().unwrap();

    let mine = app.get("/api/submissions/mine", Some(&user)).await;
    assert_eq!(mine.json().as_array().unwrap().len(), 1);

    let denied = app
        .call("POST", &format!("/api/admin/submissions/{}/approve", id), Some(&user), None)
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let approved = app
        .call("POST", &format!("/api/admin/submissions/{}/approve", id), Some(&admin), None)
        .await;
    assert_eq!(approved.status, StatusCode::OK);
    assert_eq!(approved.json()["slug"], "pastel-de-tentugal");

    let again = app
        .call("POST", &format!("/api/admin/submissions/{}/approve", id), Some(&admin), None)
        .await;
    assert_eq!(again.status, StatusCode::CONFLICT);

    let page = app.get("/api/discoveries/pastel-de-tentugal", None).await;
    assert_eq!(page.status, StatusCode::OK);
    let body = page.json();
    assert_eq!(body["discovery"]["title"], "Pastel de Tentugal");
    assert_eq!(body["type_name"], "Doçaria");
    assert_eq!(body["sealed_by_me"], false);
    assert_eq!(body["images"].as_array().unwrap().len(), 1);

    let listing = app.get("/api/discoveries?region=Centro", None).await;
    assert_eq!(listing.json()["total"], 1);
    let elsewhere = app.get("/api/discoveries?region=Algarve", None).await;
    assert_eq!(elsewhere.json()["total"], 0);
}

#[tokio::test]
async fn test_admin_lists_pending_submissions() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let user = app.sign_up_and_in("confrade@example.pt").await;
    let type_id = app.create_type(&admin, "Queijo").await;
    app.call("POST", "/api/submissions", Some(&user), Some(submission_body(type_id)))
        .await;

    let pending = app.get("/api/admin/submissions?status=Pendente", Some(&admin)).await;
    assert_eq!(pending.status, StatusCode::OK);
    assert_eq!(pending.json().as_array().unwrap().len(), 1);

    let rejected = app.get("/api/admin/submissions?status=Rejeitado", Some(&admin)).await;
    assert!(rejected.json().as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_type_in_use_cannot_be_deleted() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let user = app.sign_up_and_in("confrade@example.pt").await;
    let type_id = app.create_type(&admin, "Enchidos").await;
    app.call("POST", "/api/submissions", Some(&user), Some(submission_body(type_id)))
        .await;

    let response = app
        .call("DELETE", &format!("/api/admin/discovery-types/{}", type_id), Some(&admin), None)
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    let unused = app.create_type(&admin, "Pão").await;
    let response = app
        .call("DELETE", &format!("/api/admin/discovery-types/{}", unused), Some(&admin), None)
        .await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
}

// =============================================================================
// Seals and testimonials
// =============================================================================

#[tokio::test]
async fn test_seal_grant_and_revoke() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let user = app.sign_up_and_in("confrade@example.pt").await;
    let type_id = app.create_type(&admin, "Vinho").await;
    let created = app
        .call("POST", "/api/submissions", Some(&user), Some(submission_body(type_id)))
        .await;
    let submission_id = created.json()["id"].as_i64().unwrap();
    let discovery = app
        .call(
            "POST",
            &format!("/api/admin/submissions/{}/approve", submission_id),
            Some(&admin),
            None,
        )
        .await
        .json();
    let discovery_id = discovery["id"].as_i64().unwrap();

    let granted = app
        .call("POST", &format!("/api/seals/{}", discovery_id), Some(&user), None)
        .await;
    assert_eq!(granted.status, StatusCode::OK);
    assert_eq!(granted.json(), json!({ "sealed": true, "seal_count": 1 }));

    let page = app.get("/api/discoveries/pastel-de-tentugal", Some(&user)).await;
    assert_eq!(page.json()["sealed_by_me"], true);
    assert_eq!(page.json()["seal_count"], 1);

    let revoked = app
        .call("DELETE", &format!("/api/seals/{}", discovery_id), Some(&user), None)
        .await;
    assert_eq!(revoked.json(), json!({ "sealed": false, "seal_count": 0 }));

    let missing = app.call("POST", "/api/seals/9999", Some(&user), None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_testimonial_once_per_user() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let user = app.sign_up_and_in("confrade@example.pt").await;
    let type_id = app.create_type(&admin, "Doce").await;
    let created = app
        .call("POST", "/api/submissions", Some(&user), Some(submission_body(type_id)))
        .await;
    let submission_id = created.json()["id"].as_i64().unwrap();
    let discovery_id = app
        .call(
            "POST",
            &format!("/api/admin/submissions/{}/approve", submission_id),
            Some(&admin),
            None,
        )
        .await
        .json()["id"]
        .as_i64()
        .unwrap();

    let body = json!({ "discovery_id": discovery_id, "content": "Vale bem a viagem até Tentúgal." });
    let first = app.call("POST", "/api/testimonials", Some(&user), Some(body.clone())).await;
    assert_eq!(first.status, StatusCode::CREATED);
    let second = app.call("POST", "/api/testimonials", Some(&user), Some(body)).await;
    assert_eq!(second.status, StatusCode::CONFLICT);

    let listing = app.get("/api/discoveries/pastel-de-tentugal/testimonials", None).await;
    let testimonials = listing.json();
    assert_eq!(testimonials.as_array().unwrap().len(), 1);
    assert_eq!(testimonials[0]["author_name"], "confrade");
}

// =============================================================================
// Confrarias: membership and manager content
// =============================================================================

#[tokio::test]
async fn test_membership_request_and_approval() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let manager = app.sign_up_and_in("gestor@example.pt").await;
    let member = app.sign_up_and_in("membro@example.pt").await;
    let confraria_id = app.create_confraria(&admin, "Confraria do Queijo").await;

    let assigned = app
        .call(
            "PUT",
            &format!("/api/admin/confrarias/{}/responsible", confraria_id),
            Some(&admin),
            Some(json!({ "email": "gestor@example.pt" })),
        )
        .await;
    assert_eq!(assigned.status, StatusCode::OK);

    let requested = app
        .call("POST", &format!("/api/confrarias/{}/membership", confraria_id), Some(&member), None)
        .await;
    assert_eq!(requested.status, StatusCode::CREATED);
    let membership_id = requested.json()["id"].as_i64().unwrap();

    let duplicate = app
        .call("POST", &format!("/api/confrarias/{}/membership", confraria_id), Some(&member), None)
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let stranger = app
        .get(&format!("/api/confrarias/{}/members", confraria_id), Some(&member))
        .await;
    assert_eq!(stranger.status, StatusCode::FORBIDDEN);

    let members = app
        .get(&format!("/api/confrarias/{}/members", confraria_id), Some(&manager))
        .await;
    assert_eq!(members.status, StatusCode::OK);
    assert_eq!(members.json()[0]["email"], "membro@example.pt");

    let approved = app
        .call("POST", &format!("/api/memberships/{}/approve", membership_id), Some(&manager), None)
        .await;
    assert_eq!(approved.status, StatusCode::OK);
    assert_eq!(approved.json()["status"], "approved");

    let public = app.get(&format!("/api/confrarias/{}", confraria_id), None).await;
    assert_eq!(public.json()["member_count"], 1);

    let mine = app.get("/api/memberships/mine", Some(&member)).await;
    assert_eq!(mine.json()[0]["confraria_name"], "Confraria do Queijo");
}

#[tokio::test]
async fn test_drafts_hidden_from_public_page() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let confraria_id = app.create_confraria(&admin, "Confraria do Vinho").await;

    let draft = app
        .call(
            "POST",
            &format!("/api/confrarias/{}/articles", confraria_id),
            Some(&admin),
            Some(json!({ "title": "Vindimas de outono", "content": "Crónica das vindimas deste ano." })),
        )
        .await;
    assert_eq!(draft.status, StatusCode::CREATED);
    assert_eq!(draft.json()["status"], "draft");
    let article_id = draft.json()["id"].as_i64().unwrap();

    let public = app.get(&format!("/api/confrarias/{}", confraria_id), None).await;
    assert!(public.json()["articles"].as_array().unwrap().is_empty());

    let managed = app
        .get(&format!("/api/confrarias/{}/manage", confraria_id), Some(&admin))
        .await;
    assert_eq!(managed.json()["articles"].as_array().unwrap().len(), 1);

    let published = app
        .call(
            "PUT",
            &format!("/api/confrarias/{}/articles/{}/status", confraria_id, article_id),
            Some(&admin),
            Some(json!({ "status": "published" })),
        )
        .await;
    assert_eq!(published.status, StatusCode::OK);

    let public = app.get(&format!("/api/confrarias/{}", confraria_id), None).await;
    assert_eq!(public.json()["articles"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_seal_image_upload_is_served() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let confraria_id = app.create_confraria(&admin, "Confraria do Pão").await;

    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/confrarias/{}/images?purpose=seal", confraria_id))
        .header(header::AUTHORIZATION, format!("Bearer {}", admin))
        .header(header::CONTENT_TYPE, "image/png")
        .body(Body::from(PNG_BYTES))
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status, StatusCode::CREATED);

    let url = response.json()["url"].as_str().unwrap().to_string();
    let prefix = format!("{}/storage/confrarias/{}/seal/", BASE_URL, confraria_id);
    assert!(url.starts_with(&prefix), "unexpected url {}", url);
    assert!(url.ends_with(".png"));

    let served = app.get(url.trim_start_matches(BASE_URL), None).await;
    assert_eq!(served.status, StatusCode::OK);
    assert_eq!(served.body, PNG_BYTES);

    let public = app.get(&format!("/api/confrarias/{}", confraria_id), None).await;
    assert_eq!(public.json()["confraria"]["seal_url"], url);
    assert!(app.storage.path().join("confrarias").exists());
}

#[tokio::test]
async fn test_upload_rejects_mismatched_type() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let confraria_id = app.create_confraria(&admin, "Confraria do Mel").await;

    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/confrarias/{}/images?purpose=gallery", confraria_id))
        .header(header::AUTHORIZATION, format!("Bearer {}", admin))
        .header(header::CONTENT_TYPE, "image/jpeg")
        .body(Body::from(PNG_BYTES))
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json()["error"]["fields"][0]["field"], "image");

    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/confrarias/{}/images?purpose=gallery", confraria_id))
        .header(header::AUTHORIZATION, format!("Bearer {}", admin))
        .body(Body::from(PNG_BYTES))
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Users and settings
// =============================================================================

#[tokio::test]
async fn test_user_admin_requires_admin() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let user = app.sign_up_and_in("confrade@example.pt").await;

    let denied = app.get("/api/admin/users", Some(&user)).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let users = app.get("/api/admin/users", Some(&admin)).await;
    assert_eq!(users.status, StatusCode::OK);
    let list = users.json();
    assert_eq!(list.as_array().unwrap().len(), 2);
    let user_id = list
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["email"] == "confrade@example.pt")
        .unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let updated = app
        .call(
            "PUT",
            &format!("/api/admin/users/{}", user_id),
            Some(&admin),
            Some(json!({ "rank_override": "Mestre de Prova" })),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);

    let rank = app.get(&format!("/api/users/{}/rank", user_id), None).await;
    assert_eq!(rank.json()["rank_name"], "Mestre de Prova");
}

#[tokio::test]
async fn test_mapbox_key_read_by_users_written_by_admin() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let user = app.sign_up_and_in("confrade@example.pt").await;

    let denied = app
        .call(
            "PUT",
            "/api/admin/settings/mapbox",
            Some(&user),
            Some(json!({ "mapbox_api_key": "pk.x" })),
        )
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let saved = app
        .call(
            "PUT",
            "/api/admin/settings/mapbox",
            Some(&admin),
            Some(json!({ "mapbox_api_key": "pk.live" })),
        )
        .await;
    assert_eq!(saved.status, StatusCode::OK);

    let read = app.get("/api/settings/mapbox", Some(&user)).await;
    assert_eq!(read.json()["mapbox_api_key"], "pk.live");

    let anonymous = app.get("/api/settings/mapbox", None).await;
    assert_eq!(anonymous.status, StatusCode::SEE_OTHER);
}
