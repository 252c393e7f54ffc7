//! HTTP contract tests over the router, without binding a socket.
//!
//! The engine behind the router points at dead endpoints, which exercises
//! the status-code policy: input errors are 400, total backend loss is
//! 503, liveness is always 200.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::util::ServiceExt;

use mishkat_engine::SearchEngine;
use mishkat_server::router;

async fn dead_backend_router() -> (axum::Router, tempfile::TempDir) {
    let cache_dir = tempfile::tempdir().unwrap();

    let mut config = mishkat_config::MishkatConfig::default();
    config.cache.dir = cache_dir.path().to_path_buf();
    config.relational.database_url = "sqlite::memory:".to_string();
    config.vector.url = "http://127.0.0.1:1".to_string();
    config.text_engine.url = "http://127.0.0.1:1".to_string();
    config.text_engine.timeout_secs = 1;
    config.graph.url = "http://127.0.0.1:1".to_string();
    config.graph.timeout_secs = 1;
    config.embedding.gemini.base_url = "http://127.0.0.1:1".to_string();
    config.embedding.gemini.timeout_secs = 1;
    config.embedding.gemini.max_retries = 0;

    let engine = Arc::new(SearchEngine::connect(config).await.unwrap());
    (router(engine), cache_dir)
}

#[tokio::test]
async fn health_is_always_200() {
    let (app, _guard) = dead_backend_router().await;
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn short_query_is_400() {
    let (app, _guard) = dead_backend_router().await;
    let response = app
        .oneshot(Request::get("/search?q=a").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_parameter_is_400() {
    let (app, _guard) = dead_backend_router().await;
    let response = app
        .oneshot(
            Request::get("/search?q=test&bogus=1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_mode_is_400() {
    let (app, _guard) = dead_backend_router().await;
    let response = app
        .oneshot(
            Request::get("/search?q=test&mode=keyword")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn total_backend_loss_is_503() {
    let (app, _guard) = dead_backend_router().await;
    // Every corpus and the graph are dead: the one surfaced 5xx
    let response = app
        .oneshot(
            Request::get("/search?q=%D8%A7%D9%84%D8%B5%D8%A8%D8%B1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
