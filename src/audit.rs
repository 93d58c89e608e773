// ABOUTME: Hash-chained audit logging for authorization decisions
// ABOUTME: Canonical entry hashing, tail-conditional appends, and chain verification
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Audit Log
//!
//! Every terminal authorization decision produces exactly one entry. Each
//! entry's hash covers its own fields plus the predecessor's hash, so the
//! log is a singly linked chain: edits, omissions, and forks are detectable
//! by recomputation. Appends are best-effort - a failed write is logged and
//! swallowed, never blocking or rolling back the authorization decision.

use crate::database::AuthStore;
use crate::models::AuditLogEntry;
use anyhow::{anyhow, Result};
use chrono::{SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Previous-hash sentinel for the first entry in the chain
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Logical actions recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    /// GET leg of the authorize flow
    Authorize,
    /// POST leg (consent decision) of the authorize flow
    AuthorizeDecision,
    /// Authorization code exchange (consumed by the token endpoint)
    CodeExchange,
}

impl AuditAction {
    /// Stable string stored in audit entries
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authorize => "oauth2.authorize",
            Self::AuthorizeDecision => "oauth2.authorize_decision",
            Self::CodeExchange => "oauth2.code_exchange",
        }
    }
}

/// One decision to be recorded
#[derive(Debug, Clone)]
pub struct AuditEvent {
    /// Client involved, when known
    pub client_id: Option<String>,
    /// Resource owner involved, when known
    pub user_id: Option<Uuid>,
    /// Logical action
    pub action: AuditAction,
    /// Caller IP
    pub ip_address: String,
    /// One-way hash of the caller's user agent
    pub user_agent_hash: String,
    /// Whether the decision succeeded
    pub success: bool,
    /// Error code/description for failures
    pub error_message: Option<String>,
}

/// One-way hash of a user agent string; the raw value is never persisted
#[must_use]
pub fn hash_user_agent(user_agent: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_agent.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compute an entry's hash over the canonical field ordering
///
/// Covers every stored field except `log_hash` itself, in a fixed order with
/// an unambiguous separator, so independent processes agree on the result
/// and corrupting any single field changes the recomputation.
#[must_use]
pub fn generate_log_hash(entry: &AuditLogEntry) -> String {
    const SEP: &[u8] = &[0x1f];

    let mut hasher = Sha256::new();
    let mut field = |value: &str| {
        hasher.update(value.as_bytes());
        hasher.update(SEP);
    };

    field(&entry.previous_log_hash);
    field(&entry.id.to_string());
    field(entry.client_id.as_deref().unwrap_or("-"));
    field(&entry.user_id.map_or_else(|| "-".to_owned(), |u| u.to_string()));
    field(&entry.action);
    field(&entry.ip_address);
    field(&entry.user_agent_hash);
    field(if entry.success { "1" } else { "0" });
    field(entry.error_message.as_deref().unwrap_or("-"));
    field(&entry.created_at.to_rfc3339_opts(SecondsFormat::Micros, true));

    hex::encode(hasher.finalize())
}

/// Defect found while walking the chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainDefect {
    /// Stored `log_hash` does not match recomputation: the entry was edited
    HashMismatch {
        /// Position in insertion order
        index: usize,
        /// Entry id
        id: Uuid,
    },
    /// `previous_log_hash` does not equal the predecessor's `log_hash`:
    /// an entry was dropped or the chain was forked
    BrokenLink {
        /// Position in insertion order
        index: usize,
        /// Entry id
        id: Uuid,
    },
}

/// Result of a chain verification walk
#[derive(Debug, Clone)]
pub struct ChainVerification {
    /// Entries examined
    pub entries_checked: usize,
    /// First defect encountered, if any
    pub first_defect: Option<ChainDefect>,
}

impl ChainVerification {
    /// True when no defect was found
    #[must_use]
    pub const fn is_intact(&self) -> bool {
        self.first_defect.is_none()
    }
}

/// Walk a sequence of entries in insertion order, recomputing every hash
#[must_use]
pub fn verify_entries(entries: &[AuditLogEntry]) -> ChainVerification {
    let mut expected_previous = GENESIS_HASH.to_owned();

    for (index, entry) in entries.iter().enumerate() {
        if entry.previous_log_hash != expected_previous {
            return ChainVerification {
                entries_checked: index + 1,
                first_defect: Some(ChainDefect::BrokenLink {
                    index,
                    id: entry.id,
                }),
            };
        }
        if generate_log_hash(entry) != entry.log_hash {
            return ChainVerification {
                entries_checked: index + 1,
                first_defect: Some(ChainDefect::HashMismatch {
                    index,
                    id: entry.id,
                }),
            };
        }
        expected_previous.clone_from(&entry.log_hash);
    }

    ChainVerification {
        entries_checked: entries.len(),
        first_defect: None,
    }
}

/// Audit logger for authorization decisions
pub struct AuditLog {
    store: Arc<dyn AuthStore>,
    append_retries: u32,
    timeout: Duration,
}

impl AuditLog {
    /// Create an audit logger over the injected store
    #[must_use]
    pub fn new(store: Arc<dyn AuthStore>, append_retries: u32, timeout: Duration) -> Self {
        Self {
            store,
            append_retries,
            timeout,
        }
    }

    /// Append one event to the chain
    ///
    /// Reads the current tail, links and hashes the entry, then performs a
    /// conditional insert that fails when another writer advanced the tail
    /// first; lost races are retried a bounded number of times.
    ///
    /// # Errors
    /// Returns an error when the store fails or every retry loses the race.
    pub async fn append(&self, event: AuditEvent) -> Result<AuditLogEntry> {
        for _ in 0..=self.append_retries {
            let tail = self.store.get_audit_chain_tail_hash().await?;
            let previous_log_hash = tail.clone().unwrap_or_else(|| GENESIS_HASH.to_owned());

            let mut entry = AuditLogEntry {
                id: Uuid::new_v4(),
                client_id: event.client_id.clone(),
                user_id: event.user_id,
                action: event.action.as_str().to_owned(),
                ip_address: event.ip_address.clone(),
                user_agent_hash: event.user_agent_hash.clone(),
                success: event.success,
                error_message: event.error_message.clone(),
                log_hash: String::new(),
                previous_log_hash,
                created_at: Utc::now(),
            };
            entry.log_hash = generate_log_hash(&entry);

            if self
                .store
                .insert_audit_log_entry(&entry, tail.as_deref())
                .await?
            {
                return Ok(entry);
            }

            tracing::debug!(
                action = entry.action,
                "audit chain tail moved during append, retrying"
            );
        }

        Err(anyhow!(
            "audit append lost the tail race {} times",
            self.append_retries + 1
        ))
    }

    /// Record an event, swallowing failures
    ///
    /// Audit logging is best-effort by policy: a write failure or timeout is
    /// logged locally and never escalates to the caller or alters the
    /// authorization outcome.
    pub async fn record(&self, event: AuditEvent) {
        let action = event.action;
        match tokio::time::timeout(self.timeout, self.append(event)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                tracing::error!(action = action.as_str(), "failed to write audit entry: {e:#}");
            }
            Err(_) => {
                tracing::error!(action = action.as_str(), "audit entry write timed out");
            }
        }
    }

    /// Walk the whole chain and recompute every hash (operational tooling)
    ///
    /// # Errors
    /// Returns an error when entries cannot be read from the store.
    pub async fn verify_chain(&self) -> Result<ChainVerification> {
        let entries = self.store.list_audit_log_entries().await?;
        Ok(verify_entries(&entries))
    }
}
