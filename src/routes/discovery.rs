// ABOUTME: RFC 8414 authorization server metadata endpoint
// ABOUTME: Advertises the code-only, S256-only capabilities of this server
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::AppState;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

/// Authorization server metadata (RFC 8414)
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorizationServerMetadata {
    /// Issuer identifier
    pub issuer: String,
    /// Authorization endpoint URL
    pub authorization_endpoint: String,
    /// Token endpoint URL
    pub token_endpoint: String,
    /// Supported response types
    pub response_types_supported: Vec<String>,
    /// Supported grant types
    pub grant_types_supported: Vec<String>,
    /// Supported PKCE challenge methods
    pub code_challenge_methods_supported: Vec<String>,
}

/// Serve the server's metadata document
pub async fn metadata_handler(State(state): State<AppState>) -> Json<AuthorizationServerMetadata> {
    let issuer = state.issuer_url.trim_end_matches('/').to_owned();
    Json(AuthorizationServerMetadata {
        authorization_endpoint: format!("{issuer}/oauth2/authorize"),
        token_endpoint: format!("{issuer}/oauth2/token"),
        issuer,
        response_types_supported: vec!["code".to_owned()],
        grant_types_supported: vec!["authorization_code".to_owned()],
        code_challenge_methods_supported: vec!["S256".to_owned()],
    })
}
