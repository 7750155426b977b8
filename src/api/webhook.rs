//! `WhatsApp` webhook endpoints
//!
//! `GET /webhook` answers the subscription handshake, `POST /webhook` accepts
//! message events.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use secrecy::ExposeSecret;
use serde::Deserialize;

use super::ApiState;
use crate::channels::WhatsAppWebhook;

/// Build webhook router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/webhook", get(verify).post(receive))
        .with_state(state)
}

/// Subscription handshake query
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Result of checking a subscription handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Mode and token match; echo the challenge
    Verified(String),
    /// Mode or token do not match
    Rejected,
    /// Mode or token missing
    Incomplete,
}

/// Check a subscription handshake against the configured token
///
/// A missing challenge on an otherwise valid request echoes an empty body.
#[must_use]
pub fn verify_subscription(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&str>,
    expected_token: &str,
) -> Verification {
    let (Some(mode), Some(token)) = (mode, token) else {
        return Verification::Incomplete;
    };

    if mode == "subscribe" && constant_time_eq(token, expected_token) {
        Verification::Verified(challenge.unwrap_or_default().to_string())
    } else {
        Verification::Rejected
    }
}

/// Constant-time string comparison
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Handle the subscription handshake
async fn verify(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<VerifyParams>,
) -> Response {
    match verify_subscription(
        params.mode.as_deref(),
        params.token.as_deref(),
        params.challenge.as_deref(),
        state.verify_token.expose_secret(),
    ) {
        Verification::Verified(challenge) => {
            tracing::info!("webhook verified");
            (StatusCode::OK, challenge).into_response()
        }
        Verification::Rejected => {
            tracing::warn!(mode = ?params.mode, "webhook verification rejected");
            StatusCode::FORBIDDEN.into_response()
        }
        Verification::Incomplete => {
            tracing::debug!("webhook verification missing mode or token");
            StatusCode::BAD_REQUEST.into_response()
        }
    }
}

/// Whether a JSON value counts as set: not null, false, zero, or ""
fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|n| n.is_normal() || n.is_subnormal()),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => true,
    }
}

/// Handle an incoming event
///
/// Returns 200 immediately and relays the event in a background task.
/// Payloads whose `object` marker is missing or falsy are answered with 404.
async fn receive(State(state): State<Arc<ApiState>>, body: Bytes) -> StatusCode {
    let value: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, "webhook body is not JSON");
            return StatusCode::NOT_FOUND;
        }
    };

    if !value.get("object").is_some_and(is_truthy) {
        tracing::debug!("webhook payload without object marker");
        return StatusCode::NOT_FOUND;
    }

    let event = WhatsAppWebhook::from_value(value);
    tracing::debug!(
        object = event.object.as_deref().unwrap_or_default(),
        entries = event.entry.len(),
        "received webhook event"
    );

    let relay = Arc::clone(&state.relay);
    tokio::spawn(async move {
        let outcome = relay.handle_event(&event).await;
        tracing::debug!(?outcome, "webhook event processed");
    });

    StatusCode::OK
}
