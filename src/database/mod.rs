// ABOUTME: Storage abstraction for the authorization endpoint collaborators
// ABOUTME: Atomic conditional operations for codes, counters, and the audit chain
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence trait consumed by every component in this subsystem.
//!
//! The three contended resources (rate-limit counters, code consumption,
//! audit chain tail) are exposed as atomic conditional operations so
//! correctness does not depend on in-process read-modify-write sequences.

/// In-memory backend for tests and local development
pub mod memory;
/// SQLite backend
pub mod sqlite;

use crate::models::{
    AuditLogEntry, AuthorizationCode, ClientApplication, RateLimitCounter, RegisteredRedirectUri,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

/// Storage operations consumed by the authorization endpoint
#[async_trait]
pub trait AuthStore: Send + Sync {
    /// Look up a registered client application by its OAuth client identifier
    async fn get_client_by_client_id(&self, client_id: &str)
        -> Result<Option<ClientApplication>>;

    /// List all redirect URIs registered for a client, active or not
    async fn list_redirect_uris(&self, client_id: &str) -> Result<Vec<RegisteredRedirectUri>>;

    /// Persist a newly issued authorization code
    async fn insert_authorization_code(&self, code: &AuthorizationCode) -> Result<()>;

    /// Atomically consume an authorization code
    ///
    /// Marks `consumed_at` only if it is currently null, the code has not
    /// expired at `now`, and both `client_id` and `redirect_uri` match the
    /// stored record - all in one conditional update. Returns the consumed
    /// record, or `None` when any condition fails (callers must not learn
    /// which one).
    async fn consume_authorization_code(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthorizationCode>>;

    /// Atomic get-or-create-and-increment for a fixed-window counter
    ///
    /// Creates the counter (count 1) when missing or when the stored window
    /// ended at or before `now`; otherwise increments in place. Returns the
    /// post-increment state. Reads and writes to one key are linearizable.
    async fn get_or_increment_rate_limit_counter(
        &self,
        key: &str,
        action: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<RateLimitCounter>;

    /// Hash of the most recently inserted audit entry, if any
    async fn get_audit_chain_tail_hash(&self) -> Result<Option<String>>;

    /// Conditional append to the audit chain
    ///
    /// Inserts `entry` only if the current tail hash still equals
    /// `expected_tail` (`None` for an empty chain). Returns `false` when the
    /// tail moved; the caller recomputes and retries. Two entries can never
    /// claim the same predecessor.
    async fn insert_audit_log_entry(
        &self,
        entry: &AuditLogEntry,
        expected_tail: Option<&str>,
    ) -> Result<bool>;

    /// All audit entries in insertion order, for chain verification tooling
    async fn list_audit_log_entries(&self) -> Result<Vec<AuditLogEntry>>;
}
