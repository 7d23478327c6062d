use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use registry::AppState;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

async fn test_app() -> (Router, Arc<AppState>, TempDir) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("grove-uris.json");
    let state = Arc::new(AppState::load(&path).await.unwrap());
    (registry::router(state.clone()), state, dir)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_uri(key: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/grove/uri")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"key": key, "uri": uri}).to_string()))
        .unwrap()
}

#[tokio::test]
async fn empty_registry_returns_empty_map() {
    let (app, _state, _dir) = test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/grove/uri")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({}));
}

#[tokio::test]
async fn post_then_get_round_trips() {
    let (app, _state, dir) = test_app().await;

    let response = app
        .clone()
        .oneshot(post_uri("nfts", "lens://u1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"nfts": "lens://u1"}));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/grove/uri/nfts")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"key": "nfts", "uri": "lens://u1"})
    );

    // The map is persisted to the config file
    let raw = std::fs::read_to_string(dir.path().join("grove-uris.json")).unwrap();
    let persisted: HashMap<String, String> = serde_json::from_str(&raw).unwrap();
    assert_eq!(persisted.get("nfts").map(String::as_str), Some("lens://u1"));
}

#[tokio::test]
async fn updating_an_entry_replaces_the_pointer() {
    let (app, _state, _dir) = test_app().await;

    app.clone()
        .oneshot(post_uri("users", "lens://u0"))
        .await
        .unwrap();
    let response = app
        .clone()
        .oneshot(post_uri("users", "lens://u1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"users": "lens://u1"}));
}

#[tokio::test]
async fn reposting_the_current_uri_is_a_no_op() {
    let (app, _state, dir) = test_app().await;

    app.clone()
        .oneshot(post_uri("users", "lens://u0"))
        .await
        .unwrap();
    let mtime_before = std::fs::metadata(dir.path().join("grove-uris.json"))
        .unwrap()
        .modified()
        .unwrap();

    let response = app
        .clone()
        .oneshot(post_uri("users", "lens://u0"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mtime_after = std::fs::metadata(dir.path().join("grove-uris.json"))
        .unwrap()
        .modified()
        .unwrap();
    assert_eq!(mtime_before, mtime_after, "no rewrite for a current URI");
}

#[tokio::test]
async fn unknown_collection_keys_are_rejected() {
    let (app, _state, _dir) = test_app().await;

    let response = app
        .clone()
        .oneshot(post_uri("passwords", "lens://u1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/grove/uri")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_json(response).await, json!({}));
}

#[tokio::test]
async fn missing_key_is_not_found() {
    let (app, _state, _dir) = test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/grove/uri/nfts")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reload_picks_up_persisted_entries() {
    let (app, _state, dir) = test_app().await;

    app.clone()
        .oneshot(post_uri("activities", "lens://a1"))
        .await
        .unwrap();

    // A fresh state loaded from the same file sees the entry
    let state = Arc::new(
        AppState::load(dir.path().join("grove-uris.json"))
            .await
            .unwrap(),
    );
    let app = registry::router(state);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/grove/uri/activities")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
