// ABOUTME: Liveness and readiness probe handlers
// ABOUTME: /health is unconditional; /ready exercises the database
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Process liveness
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness: the store must answer before we accept traffic
pub async fn ready_handler(State(state): State<AppState>) -> Response {
    match state.store.get_audit_chain_tail_hash().await {
        Ok(_) => (StatusCode::OK, Json(json!({"status": "ready"}))).into_response(),
        Err(e) => {
            tracing::warn!("readiness probe failed: {e:#}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"status": "unavailable"})),
            )
                .into_response()
        }
    }
}
