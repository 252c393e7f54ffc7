//! Mishkat Server - the HTTP search endpoint
//!
//! A thin axum layer over the engine:
//!
//! - `GET /search` — the search contract; 200 for any served result
//!   (including empty or degraded), 400 for input errors, 503 only when
//!   every retrieval backend and the graph failed together
//! - `GET /health` — liveness
//! - `GET /doctor` — per-collaborator readiness probes
//!
//! Status-code policy: the UI must always be able to render a result page;
//! a degraded response is a successful response with a hint flag.

pub mod params;

pub use params::SearchParams;

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use mishkat_engine::{EngineError, SearchEngine};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SearchEngine>,
}

/// Build the router; separated from serving for tests.
pub fn router(engine: Arc<SearchEngine>) -> Router {
    Router::new()
        .route("/search", get(search_handler))
        .route("/health", get(health_handler))
        .route("/doctor", get(doctor_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { engine })
}

/// Bind and serve until shutdown.
pub async fn serve(engine: Arc<SearchEngine>, bind_address: &str) -> std::io::Result<()> {
    let app = router(engine);
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("Server listening on {bind_address}");
    axum::serve(listener, app).await
}

async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Response {
    let request = match params.into_request(&state.engine) {
        Ok(request) => request,
        Err(reason) => return bad_request(reason),
    };

    match state.engine.search(request).await {
        Ok(response) => Json(response).into_response(),
        Err(EngineError::InvalidQuery(reason)) => bad_request(reason),
        Err(EngineError::AllBackendsFailed) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "all retrieval backends are unavailable" })),
        )
            .into_response(),
        Err(EngineError::Init(detail)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": detail })),
        )
            .into_response(),
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn doctor_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let probes = state.engine.doctor().await;
    let checks: Vec<serde_json::Value> = probes
        .iter()
        .map(|p| {
            json!({
                "name": p.name,
                "ok": p.ok,
                "detail": p.detail,
            })
        })
        .collect();
    let all_ok = probes.iter().all(|p| p.ok);
    Json(json!({ "ok": all_ok, "checks": checks }))
}

fn bad_request(reason: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": reason }))).into_response()
}
