// ABOUTME: Core domain types for the authorization endpoint subsystem
// ABOUTME: Client applications, authorization codes, rate-limit counters, and audit entries
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// OAuth 2.0 client type per RFC 6749 Section 2.1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    /// Cannot keep a secret (native apps, SPAs); PKCE is mandatory
    Public,
    /// Can authenticate with the authorization server; PKCE is optional
    Confidential,
}

/// A registered client application
///
/// Owned by the external registration process; this subsystem reads it and
/// never mutates it.
#[derive(Debug, Clone)]
pub struct ClientApplication {
    /// Unique OAuth 2.0 client identifier
    pub client_id: String,
    /// Public or confidential
    pub client_type: ClientType,
    /// Deactivated clients are indistinguishable from unknown ones
    pub is_active: bool,
}

/// A redirect URI registered for a client application
#[derive(Debug, Clone)]
pub struct RegisteredRedirectUri {
    /// Exact URI string; matched byte-for-byte, never normalized
    pub uri: String,
    /// Only active URIs are matchable
    pub is_active: bool,
}

/// Single-use authorization code
///
/// Transitions `unconsumed -> consumed` exactly once; `consumed_at` is never
/// reset. Consumption is an atomic conditional update at the store.
#[derive(Debug, Clone)]
pub struct AuthorizationCode {
    /// Opaque code value (256 bits of entropy, base64url encoded)
    pub code: String,
    /// Client the code was issued to
    pub client_id: String,
    /// Resource owner who approved the request
    pub user_id: Uuid,
    /// Redirect URI the code was bound to at issuance
    pub redirect_uri: String,
    /// Space-separated granted scopes
    pub scope: Option<String>,
    /// PKCE code challenge (RFC 7636)
    pub code_challenge: Option<String>,
    /// PKCE challenge method; always "S256" when present
    pub code_challenge_method: Option<String>,
    /// When this code was issued
    pub created_at: DateTime<Utc>,
    /// When this code expires
    pub expires_at: DateTime<Utc>,
    /// Set exactly once at exchange; None until then
    pub consumed_at: Option<DateTime<Utc>>,
}

/// Fixed-window rate limit counter for one `(caller_ip, action)` key
#[derive(Debug, Clone)]
pub struct RateLimitCounter {
    /// Requests observed in the current window (post-increment)
    pub count: u32,
    /// When the current window ends and the counter resets
    pub window_reset_at: DateTime<Utc>,
}

/// Append-only audit log entry, immutable once written
///
/// `log_hash` covers every other stored field plus `previous_log_hash`, so
/// any edit or omission is detectable by recomputation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Unique entry identifier
    pub id: Uuid,
    /// Client involved in the decision, when known
    pub client_id: Option<String>,
    /// Resource owner involved, when known
    pub user_id: Option<Uuid>,
    /// Logical action, e.g. `oauth2.authorize`
    pub action: String,
    /// Caller IP address
    pub ip_address: String,
    /// One-way hash of the user agent; the raw value is never stored
    pub user_agent_hash: String,
    /// Whether the decision succeeded
    pub success: bool,
    /// Error code/description for failed decisions
    pub error_message: Option<String>,
    /// Hash of this entry (canonical fields + previous hash)
    pub log_hash: String,
    /// Hash of the predecessor entry; genesis sentinel for the first entry
    pub previous_log_hash: String,
    /// When this entry was written
    pub created_at: DateTime<Utc>,
}
