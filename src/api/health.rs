//! Health check endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use super::ApiState;
use crate::assistant::SessionScope;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Relay status response
#[derive(Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
    pub assistant_id: String,
    pub session_scope: &'static str,
    pub open_sessions: usize,
}

/// Liveness probe - is the service running?
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Relay status including how many assistant threads are open
async fn status(State(state): State<Arc<ApiState>>) -> Json<StatusResponse> {
    let session_scope = match state.relay.sessions().scope() {
        SessionScope::PerSender => "per-sender",
        SessionScope::Shared => "shared",
    };

    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        assistant_id: state.relay.assistant_id().to_string(),
        session_scope,
        open_sessions: state.relay.sessions().len().await,
    })
}

/// Build health router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .with_state(state)
}
