use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::StatusCode;
use serde::Serialize;
use serde_json::json;

use crate::control::ControlResponse;
use crate::server::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/tokens", get(current_tokens))
        .route("/api/tokens/generate", post(generate))
        .route("/api/tokens/refresh", post(force_refresh))
        .route("/api/tokens/published", get(published_tokens))
        .route("/api/scheduler/status", get(scheduler_status))
        .route("/api/test/identities", get(test_identities))
}

/// Unsuccessful control calls are served as 500 with the same body shape.
fn respond<T: Serialize>(response: ControlResponse<T>) -> Response {
    let status = if response.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(response)).into_response()
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn current_tokens(State(state): State<AppState>) -> Response {
    respond(state.control.current_tokens().await)
}

async fn generate(State(state): State<AppState>) -> Response {
    respond(state.control.generate().await)
}

async fn force_refresh(State(state): State<AppState>) -> Response {
    respond(state.control.force_refresh().await)
}

async fn published_tokens(State(state): State<AppState>) -> Response {
    respond(state.control.current_published_tokens().await)
}

async fn scheduler_status(State(state): State<AppState>) -> Response {
    respond(state.control.scheduler_status())
}

async fn test_identities(State(state): State<AppState>) -> Response {
    respond(state.control.test_identities().await)
}
