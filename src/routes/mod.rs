// ABOUTME: HTTP route wiring for the authorization server
// ABOUTME: Axum router, shared state, and request tracing
//
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Authorize endpoint handlers (GET and POST legs)
pub mod authorize;
/// RFC 8414 authorization server metadata
pub mod discovery;
/// Liveness and readiness probes
pub mod health;

use crate::database::AuthStore;
use crate::oauth2_server::AuthorizationServer;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared state for all route handlers
#[derive(Clone)]
pub struct AppState {
    /// Authorize orchestrator
    pub server: Arc<AuthorizationServer>,
    /// Store handle for readiness probes
    pub store: Arc<dyn AuthStore>,
    /// Issuer URL advertised in discovery metadata
    pub issuer_url: String,
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/oauth2/authorize",
            get(authorize::authorize_handler).post(authorize::decide_handler),
        )
        .route(
            "/.well-known/oauth-authorization-server",
            get(discovery::metadata_handler),
        )
        .route("/health", get(health::health_handler))
        .route("/ready", get(health::ready_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
