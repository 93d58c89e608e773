// ABOUTME: OAuth 2.0 authorization endpoint implementation
// ABOUTME: Code issuance with PKCE enforcement, exact redirect matching, and audited decisions
//
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Authorization code issuance and atomic consumption
pub mod codes;
/// Authorize orchestrator for the GET and POST legs
pub mod endpoints;
/// OAuth 2.0 request/response/error types
pub mod models;
/// PKCE (RFC 7636) validation, S256 only
pub mod pkce;
/// Rate limiting for authorize endpoints
pub mod rate_limiting;
/// Exact-match redirect URI validation
pub mod redirect_uri;
/// Registered client lookups
pub mod registry;

/// Authorize orchestrator
pub use endpoints::{AuthorizationServer, AuthorizeOutcome, DecisionOutcome, RequestContext};

/// Authorization request query parameters
pub use models::AuthorizeParams;
/// Consent decision body (POST leg)
pub use models::ConsentDecision;
/// Consent decision response
pub use models::DecisionResponse;
/// OAuth 2.0 error response
pub use models::OAuth2Error;

/// Authorization code manager
pub use codes::{AuthorizationCodeManager, CodeIssuance, Grant};

/// Rate limit manager and status
pub use rate_limiting::{RateLimitManager, RateLimitStatus};

/// Client registry snapshot
pub use registry::{ClientRegistry, ClientSnapshot};
