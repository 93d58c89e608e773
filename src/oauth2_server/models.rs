// ABOUTME: OAuth 2.0 request, response, and error types for the authorize endpoint
// ABOUTME: Strict serde structures validated at the boundary before any component logic
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};

/// Raw authorization request query parameters (GET leg)
///
/// Deserialized inside the orchestrator, after rate limiting, from the raw
/// query string. Every field is optional: required-parameter validation is
/// a state-machine step, not a deserializer side effect.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizeParams {
    /// Client identifier
    pub client_id: Option<String>,
    /// Redirect URI for the response
    pub redirect_uri: Option<String>,
    /// Response type; only "code" is supported
    pub response_type: Option<String>,
    /// Requested scopes
    pub scope: Option<String>,
    /// Client CSRF state, echoed unchanged
    pub state: Option<String>,
    /// PKCE code challenge (RFC 7636)
    pub code_challenge: Option<String>,
    /// PKCE code challenge method; must be "S256" when present
    pub code_challenge_method: Option<String>,
}

/// Consent decision body (POST leg)
#[derive(Debug, Clone, Deserialize)]
pub struct ConsentDecision {
    /// Client identifier
    pub client_id: Option<String>,
    /// Redirect URI for the response
    pub redirect_uri: Option<String>,
    /// Requested scopes
    pub scope: Option<String>,
    /// Client CSRF state, echoed unchanged
    pub state: Option<String>,
    /// PKCE code challenge (RFC 7636)
    pub code_challenge: Option<String>,
    /// PKCE code challenge method; must be "S256" when present
    pub code_challenge_method: Option<String>,
    /// Whether the resource owner approved the request
    pub approved: Option<bool>,
}

/// Consent decision response: the destination the user agent should follow
#[derive(Debug, Serialize, Deserialize)]
pub struct DecisionResponse {
    /// Client redirect URI with either `code`+`state` or error parameters
    pub redirect_url: String,
}

/// OAuth 2.0 Error Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuth2Error {
    /// Error code
    pub error: String,
    /// Human-readable error description
    pub error_description: Option<String>,
    /// URI for error information
    pub error_uri: Option<String>,
}

impl OAuth2Error {
    /// Create an `invalid_request` error
    #[must_use]
    pub fn invalid_request(description: &str) -> Self {
        Self {
            error: "invalid_request".to_owned(),
            error_description: Some(description.to_owned()),
            error_uri: Some(
                "https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1".to_owned(),
            ),
        }
    }

    /// Create an `invalid_client` error
    #[must_use]
    pub fn invalid_client() -> Self {
        Self {
            error: "invalid_client".to_owned(),
            error_description: Some("Client authentication failed".to_owned()),
            error_uri: Some("https://datatracker.ietf.org/doc/html/rfc6749#section-5.2".to_owned()),
        }
    }

    /// Create an `unsupported_response_type` error
    #[must_use]
    pub fn unsupported_response_type() -> Self {
        Self {
            error: "unsupported_response_type".to_owned(),
            error_description: Some("Only the 'code' response_type is supported".to_owned()),
            error_uri: Some(
                "https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1".to_owned(),
            ),
        }
    }

    /// Create an `access_denied` error
    #[must_use]
    pub fn access_denied(description: &str) -> Self {
        Self {
            error: "access_denied".to_owned(),
            error_description: Some(description.to_owned()),
            error_uri: Some(
                "https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1".to_owned(),
            ),
        }
    }

    /// Create a `too_many_requests` error
    #[must_use]
    pub fn too_many_requests() -> Self {
        Self {
            error: "too_many_requests".to_owned(),
            error_description: Some("Rate limit exceeded, slow down".to_owned()),
            error_uri: Some("https://datatracker.ietf.org/doc/html/rfc6585#section-4".to_owned()),
        }
    }

    /// Create an `invalid_grant` error
    ///
    /// Every code-exchange failure reports this identical shape so callers
    /// cannot learn which check failed.
    #[must_use]
    pub fn invalid_grant(description: &str) -> Self {
        Self {
            error: "invalid_grant".to_owned(),
            error_description: Some(description.to_owned()),
            error_uri: Some("https://datatracker.ietf.org/doc/html/rfc6749#section-5.2".to_owned()),
        }
    }

    /// Create a `server_error` error
    #[must_use]
    pub fn server_error() -> Self {
        Self {
            error: "server_error".to_owned(),
            error_description: Some("The authorization server encountered an unexpected condition".to_owned()),
            error_uri: Some(
                "https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1".to_owned(),
            ),
        }
    }

    /// Short `code: description` form for audit entries
    #[must_use]
    pub fn audit_message(&self) -> String {
        self.error_description.as_ref().map_or_else(
            || self.error.clone(),
            |description| format!("{}: {description}", self.error),
        )
    }
}
