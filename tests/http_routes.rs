mod common;

use axum::body::Body;
use axum::Router;
use base64::{engine::general_purpose, Engine as _};
use http::{header, Method, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use common::*;
use eighth::web::{router, AppState};

fn cookie(user_id: i64) -> String {
    let payload = general_purpose::URL_SAFE_NO_PAD.encode(format!("{{\"sub\":\"{user_id}\"}}"));
    format!("access_token=eyJhbGciOiJub25lIn0.{payload}.sig")
}

async fn send(app: &Router, method: Method, uri: &str, user_id: Option<i64>, form: &str) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(id) = user_id {
        builder = builder.header(header::COOKIE, cookie(id));
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::from(form.to_string())).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn requests_without_identity_are_unauthorized() {
    let engine = engine(config(false)).await;
    let app = router(AppState::new(engine));

    let (status, _) = send(&app, Method::POST, "/eighth/signup", None, "bid=1&aid=1").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A well-formed token for someone who does not exist.
    let (status, _) = send(&app, Method::POST, "/eighth/signup", Some(777), "bid=1&aid=1").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signup_routes_map_outcomes_to_statuses() {
    let engine = engine(config(true)).await;
    let pool = engine.pool().clone();
    let a = user(&pool, "alice", "student").await;
    let b = user(&pool, "bob", "student").await;
    let blk = block(&pool, today(), "A").await;
    let chess = activity(&pool, "Chess").await;
    schedule(&pool, blk, chess, Some(1)).await;
    let app = router(AppState::new(engine));
    let form = format!("bid={blk}&aid={chess}");

    let (status, body) = send(&app, Method::POST, "/eighth/signup", Some(a), &form).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success_message"], "Successfully signed up for Chess.");

    let (status, body) = send(&app, Method::POST, "/eighth/signup", Some(b), &form).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["waitlisted"], true);
    assert_eq!(body["position"], 1);

    let (status, body) = send(&app, Method::POST, "/eighth/unsignup", Some(b), &format!("bid={blk}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "signup did not exist");

    let (status, body) = send(&app, Method::POST, "/eighth/favorite", Some(a), &format!("aid={chess}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["favorited"], true);
}

#[tokio::test]
async fn violations_come_back_as_forbidden_json() {
    let engine = engine(config(false)).await;
    let pool = engine.pool().clone();
    let a = user(&pool, "alice", "student").await;
    let b = user(&pool, "bob", "student").await;
    let blk = block(&pool, today(), "A").await;
    let chess = activity(&pool, "Chess").await;
    schedule(&pool, blk, chess, Some(1)).await;
    lock(&pool, blk).await;
    let app = router(AppState::new(engine));

    let form = format!("uid={b}&bid={blk}&aid={chess}&force=on");
    let (status, body) = send(&app, Method::POST, "/eighth/signup", Some(a), &form).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["violations"], serde_json::json!(["signup_forbidden", "block_locked"]));
    assert_eq!(body["messages"].as_array().map(Vec::len), Some(2));
    assert!(body["message_html"].as_str().unwrap().starts_with("<ol"));
    assert!(body.get("admin_detail").is_none());
}

#[tokio::test]
async fn admin_routes_check_role_and_existence() {
    let engine = engine(config(false)).await;
    let pool = engine.pool().clone();
    let admin = user(&pool, "root", "admin").await;
    let student = user(&pool, "sam", "student").await;
    let blk = block(&pool, today(), "A").await;
    let app = router(AppState::new(engine));

    let uri = format!("/eighth/blocks/{blk}/lock");
    let (status, body) = send(&app, Method::POST, &uri, Some(student), "").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].is_string());

    let (status, body) = send(&app, Method::POST, &uri, Some(admin), "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["locked"], true);

    let (status, body) = send(&app, Method::POST, "/eighth/blocks/999/unlock", Some(admin), "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "block not found");

    let (status, body) = send(&app, Method::DELETE, &format!("/eighth/users/{student}"), Some(admin), "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["released_signups"], 0);
}
