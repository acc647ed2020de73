//! HTTP routes for the relay service.
//!
//! Two surfaces: the LINE webhook callback and a trivial health check.
//! Signature verification happens against the raw body bytes before
//! anything touches the dispatcher, so unverified traffic has no session
//! or completion side effects.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

use crate::dispatch::Dispatcher;
use crate::line::{self, LineClient, WebhookPayload};

// ============================================================================
// State
// ============================================================================

/// Shared state for the HTTP server.
pub struct AppState {
    /// Core routing logic
    pub dispatcher: Dispatcher,
    /// Reply API client
    pub line: LineClient,
    /// Channel secret for webhook signature verification
    pub channel_secret: String,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

// ============================================================================
// Health Route
// ============================================================================

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "running",
        service: "relay-bot",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================================
// LINE Webhook
// ============================================================================

async fn callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = headers
        .get("x-line-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !line::verify_signature(&state.channel_secret, &body, signature) {
        tracing::warn!("Webhook rejected: invalid signature");
        return (StatusCode::BAD_REQUEST, "invalid signature");
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "Webhook rejected: unparseable body");
            return (StatusCode::BAD_REQUEST, "invalid body");
        }
    };

    for event in &payload.events {
        let Some((user_id, text, reply_token)) = event.as_text_message() else {
            tracing::debug!(event_type = %event.event_type, "Ignoring non-text event");
            continue;
        };

        let reply_text = state.dispatcher.dispatch(user_id, text.trim()).await;

        if let Err(e) = state.line.reply(reply_token, &reply_text).await {
            tracing::error!(user = %user_id, error = %e, "Failed to deliver reply");
        }
    }

    (StatusCode::OK, "OK")
}

// ============================================================================
// Router
// ============================================================================

/// Build the service router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/callback", post(callback))
        // LINE webhook bodies are small; cap them well before the
        // signature check buffers anything large
        .layer(RequestBodyLimitLayer::new(1024 * 1024))
        .with_state(state)
}
