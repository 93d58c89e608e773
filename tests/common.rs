// ABOUTME: Shared fixtures for integration tests
// ABOUTME: Seeded in-memory store, wired router, and session token helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(dead_code)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use strive_auth_server::auth::JwtUserTokenVerifier;
use strive_auth_server::config::{AuthConfig, OAuth2ServerConfig, RateLimitConfig, ServerConfig};
use strive_auth_server::database::memory::InMemoryStore;
use strive_auth_server::models::{ClientApplication, ClientType, RegisteredRedirectUri};
use strive_auth_server::oauth2_server::AuthorizationServer;
use strive_auth_server::routes::{self, AppState};
use uuid::Uuid;

pub const JWT_SECRET: &str = "integration-test-secret";
pub const PUBLIC_CLIENT: &str = "habit-tracker-mobile";
pub const CONFIDENTIAL_CLIENT: &str = "strive-web";
pub const REDIRECT: &str = "https://app.example.com/callback";
pub const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";

pub fn test_config() -> ServerConfig {
    ServerConfig {
        http_port: 0,
        database_url: "sqlite::memory:".into(),
        auth: AuthConfig {
            jwt_secret: JWT_SECRET.into(),
        },
        rate_limit: RateLimitConfig {
            enabled: true,
            requests_per_window: 5,
            window_seconds: 60,
        },
        oauth2_server: OAuth2ServerConfig::default(),
    }
}

/// Store seeded with one public and one confidential client
pub fn seeded_store() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    store.register_client(
        ClientApplication {
            client_id: PUBLIC_CLIENT.into(),
            client_type: ClientType::Public,
            is_active: true,
        },
        vec![RegisteredRedirectUri {
            uri: REDIRECT.into(),
            is_active: true,
        }],
    );
    store.register_client(
        ClientApplication {
            client_id: CONFIDENTIAL_CLIENT.into(),
            client_type: ClientType::Confidential,
            is_active: true,
        },
        vec![RegisteredRedirectUri {
            uri: REDIRECT.into(),
            is_active: true,
        }],
    );
    store
}

pub fn build_server(
    store: Arc<InMemoryStore>,
    config: &ServerConfig,
) -> Arc<AuthorizationServer> {
    let verifier = Arc::new(JwtUserTokenVerifier::new(config.auth.jwt_secret.as_bytes()));
    Arc::new(AuthorizationServer::new(store, verifier, config))
}

pub fn build_app(store: Arc<InMemoryStore>, config: &ServerConfig) -> axum::Router {
    let server = build_server(store.clone(), config);
    routes::router(AppState {
        server,
        store,
        issuer_url: config.oauth2_server.issuer_url.clone(),
    })
}

/// Valid resource-owner session token
pub fn user_token(user_id: Uuid) -> String {
    JwtUserTokenVerifier::new(JWT_SECRET.as_bytes())
        .generate_user_token(user_id, chrono::Duration::hours(1))
        .unwrap()
}

/// Build an authorize query string with url-encoded values
pub fn authorize_query(pairs: &[(&str, &str)]) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    for (name, value) in pairs {
        query.append_pair(name, value);
    }
    query.finish()
}
