//! HTTP API tests driving the router in-process.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{sqlite_cosine, StaticEmbedder};
use cosine::auth::TokenAuthenticator;
use cosine::server::{router, AppState};
use cosine_core::page::PageLimits;

const SECRET: &str = "test-secret";

async fn app() -> (tempfile::TempDir, Router) {
    let (tmp, cosine) = sqlite_cosine(StaticEmbedder::default(), PageLimits::default()).await;
    let state = AppState::new(cosine, Arc::new(TokenAuthenticator::new(SECRET)));
    (tmp, router(state))
}

fn token(user_id: &str) -> String {
    TokenAuthenticator::new(SECRET).mint(user_id).unwrap()
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(user)));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn health_reports_ok() {
    let (_tmp, app) = app().await;
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn submit_dedups_and_detail_lists_annotations() {
    let (_tmp, app) = app().await;

    let (status, first) = send(
        &app,
        Method::POST,
        "/texts",
        Some("u-alice"),
        Some(json!({ "text": "Hello World", "notes": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let hash = first["hash"].as_str().unwrap().to_string();

    let (status, second) = send(
        &app,
        Method::POST,
        "/texts",
        None,
        Some(json!({ "text": "hello world " })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["hash"], hash.as_str());
    assert_eq!(second["annotation"]["owner_id"], "anon");

    let (status, detail) = send(&app, Method::GET, &format!("/texts/{}", hash), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["text"], "Hello World");
    assert_eq!(detail["annotations"].as_array().unwrap().len(), 2);

    let (status, feed) = send(&app, Method::GET, "/texts/recent?limit=5", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(feed["items"].as_array().unwrap().len(), 1);
    assert!(feed["next_cursor"].is_null());
}

#[tokio::test]
async fn errors_use_the_json_contract() {
    let (_tmp, app) = app().await;

    let (status, body) = send(&app, Method::GET, "/texts/deadbeef", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, body) = send(&app, Method::GET, "/texts/random", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "empty_corpus");

    let (status, body) = send(&app, Method::GET, "/texts/recent?limit=0", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, body) = send(
        &app,
        Method::POST,
        "/texts",
        None,
        Some(json!({ "text": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn mutations_require_a_valid_token() {
    let (_tmp, app) = app().await;
    let (_, created) = send(
        &app,
        Method::POST,
        "/texts",
        Some("u-bob"),
        Some(json!({ "text": "pin me" })),
    )
    .await;
    let hash = created["hash"].as_str().unwrap().to_string();
    let pin_uri = format!("/texts/{}/pin", hash);

    let (status, body) = send(&app, Method::POST, &pin_uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");

    let forged = Request::builder()
        .method(Method::POST)
        .uri(&pin_uri)
        .header(header::AUTHORIZATION, "Bearer u-bob.00ff")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(forged).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, Method::POST, &pin_uri, Some("u-bob"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_pinned"], true);

    let (status, body) = send(&app, Method::POST, &pin_uri, Some("u-bob"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_pinned"], false);
    assert!(body["pinned_at"].is_null());
}

#[tokio::test]
async fn user_feeds_are_addressed_by_username() {
    let (_tmp, app) = app().await;

    let (status, body) = send(
        &app,
        Method::GET,
        "/usernames/carol/availability",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], true);

    let (status, user) = send(
        &app,
        Method::PUT,
        "/me/username",
        Some("u-carol"),
        Some(json!({ "username": "carol" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["username"], "carol");

    let (_, body) = send(&app, Method::GET, "/usernames/carol/availability", None, None).await;
    assert_eq!(body["available"], false);

    let (_, created) = send(
        &app,
        Method::POST,
        "/texts",
        Some("u-carol"),
        Some(json!({ "text": "a thought" })),
    )
    .await;
    let hash = created["hash"].as_str().unwrap().to_string();
    send(
        &app,
        Method::POST,
        &format!("/texts/{}/pin", hash),
        Some("u-carol"),
        None,
    )
    .await;

    let (status, texts) = send(&app, Method::GET, "/users/carol/texts", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(texts["items"][0]["hash"], hash.as_str());

    let (_, pinned) = send(&app, Method::GET, "/users/carol/pinned", None, None).await;
    assert_eq!(pinned["items"].as_array().unwrap().len(), 1);

    let (status, _) = send(&app, Method::GET, "/users/nobody/texts", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, random) = send(&app, Method::GET, "/texts/random", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(random["hash"], hash.as_str());

    let (status, receipt) = send(
        &app,
        Method::POST,
        &format!("/texts/{}/delete", hash),
        Some("u-carol"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(receipt["deleted_at"].is_string());

    let (_, texts) = send(&app, Method::GET, "/users/carol/texts", None, None).await;
    assert!(texts["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn neighbors_endpoint_pages_by_offset() {
    let (_tmp, app) = app().await;
    let mut hashes = Vec::new();
    for text in ["alpha", "beta", "gamma"] {
        let (_, created) = send(
            &app,
            Method::POST,
            "/texts",
            Some("u-n"),
            Some(json!({ "text": text })),
        )
        .await;
        hashes.push(created["hash"].as_str().unwrap().to_string());
    }

    let (status, page) = send(
        &app,
        Method::GET,
        &format!("/texts/{}/neighbors?limit=1", hashes[0]),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["items"].as_array().unwrap().len(), 1);
    assert_eq!(page["next_offset"], 1);

    let (_, page) = send(
        &app,
        Method::GET,
        &format!("/texts/{}/neighbors?offset=1&limit=5", hashes[0]),
        None,
        None,
    )
    .await;
    assert_eq!(page["items"].as_array().unwrap().len(), 1);
    assert!(page["next_offset"].is_null());
}
