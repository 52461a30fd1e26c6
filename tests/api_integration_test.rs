mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use common::setup_test_db;
use http_body_util::BodyExt;
use hublib::config::AppConfig;
use hublib::infrastructure::seed::seed_defaults;
use hublib::{AppState, create_app};
use serde_json::{Value, json};
use tower::ServiceExt;

async fn setup_app() -> Router {
    let _ = tracing_subscriber::fmt::try_init();
    let db = setup_test_db().await;
    seed_defaults(&db).await.unwrap();
    create_app(AppState::new(db, AppConfig::development()))
}

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// Registers and logs in, returning the bearer token.
async fn sign_up(app: &Router, username: &str) -> String {
    let credentials = json!({ "username": username, "password": "password123" });
    let (status, _) = send(app, "POST", "/register", None, Some(credentials.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(app, "POST", "/login", None, Some(credentials)).await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let app = setup_app().await;
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_register_login_profile() {
    let app = setup_app().await;
    let token = sign_up(&app, "alice").await;

    let (status, body) = send(&app, "GET", "/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");
    assert_eq!(body["role"], "user");

    let again = json!({ "username": "alice", "password": "password123" });
    let (status, _) = send(&app, "POST", "/register", None, Some(again)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let wrong = json!({ "username": "alice", "password": "not-the-password" });
    let (status, _) = send(&app, "POST", "/login", None, Some(wrong)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let short = json!({ "username": "bob", "password": "short" });
    let (status, _) = send(&app, "POST", "/register", None, Some(short)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_auth_failures() {
    let app = setup_app().await;

    let (status, _) = send(&app, "GET", "/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A bad token is rejected even on routes that allow anonymous access
    let (status, _) = send(&app, "GET", "/resources", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_resource_lifecycle() {
    let app = setup_app().await;
    let alice = sign_up(&app, "alice").await;
    let bob = sign_up(&app, "bob").await;

    let payload = json!({
        "title": "Rust async book",
        "description": "Futures and executors",
        "category": "books",
        "tags": ["Rust", "async"],
        "resource_type": "external_link",
        "url": "https://rust-lang.github.io/async-book/",
        "visibility": "private"
    });
    let (status, created) = send(&app, "POST", "/resources", Some(&alice), Some(payload)).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["tags"], json!(["async", "rust"]));
    let uri = format!("/resources/{}", id);

    let (status, _) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, "GET", &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, list) = send(&app, "GET", "/resources", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total"], 0);

    let publish = json!({ "visibility": "public", "description": null });
    let (status, updated) = send(&app, "PUT", &uri, Some(&alice), Some(publish)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["visibility"], "public");
    assert_eq!(updated["description"], Value::Null);

    let (status, list) = send(&app, "GET", "/resources?tags=rust&sort=title", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total"], 1);

    let (status, rated) = send(
        &app,
        "PUT",
        &format!("/resources/{}/ratings", id),
        Some(&bob),
        Some(json!({ "rating": 4 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rated["ratings_count"], 1);
    assert_eq!(rated["my_rating"], 4);

    let (status, _) = send(&app, "DELETE", &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, "DELETE", &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "GET", &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_suggestion_voting_over_http() {
    let app = setup_app().await;
    let admin = sign_up(&app, "admin").await;
    let alice = sign_up(&app, "alice").await;

    // Non-admins cannot touch moderation settings
    let lower = json!({ "auto_approval_vote_threshold_tag": "1" });
    let (status, _) = send(&app, "PUT", "/admin/config", Some(&alice), Some(lower.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, config) = send(&app, "PUT", "/admin/config", Some(&admin), Some(lower)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(config["auto_approval_vote_threshold_tag"], "1");

    let bad = json!({ "auto_approval_vote_threshold_colour": "1" });
    let (status, _) = send(&app, "PUT", "/admin/config", Some(&admin), Some(bad)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, suggestion) = send(
        &app,
        "POST",
        "/suggestions",
        Some(&alice),
        Some(json!({ "name": "webassembly", "suggestion_type": "tag" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(suggestion["status"], "pending");
    let vote_uri = format!("/suggestions/{}/vote", suggestion["id"].as_str().unwrap());

    let (status, _) = send(&app, "POST", &vote_uri, None, Some(json!({ "vote_type": "upvote" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, vote) = send(&app, "POST", &vote_uri, Some(&alice), Some(json!({ "vote_type": "upvote" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(vote["total_upvotes"], 1);
    assert_eq!(vote["user_vote"], "upvote");
    assert_eq!(vote["status"], "approved");

    let (status, list) = send(&app, "GET", "/suggestions?status=approved", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    // Toggling off keeps the terminal status
    let (status, vote) = send(&app, "POST", &vote_uri, Some(&alice), Some(json!({ "vote_type": "upvote" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(vote["user_vote"], Value::Null);
    assert_eq!(vote["votes_count"], 0);
    assert_eq!(vote["status"], "approved");
}
