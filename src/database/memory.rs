// ABOUTME: In-memory AuthStore used by tests and local development
// ABOUTME: Reproduces the atomic conditional semantics of the SQL backend
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory store. A substitute for tests and single-process development
//! runs; multi-instance deployments need the SQL backend, since these
//! structures do not survive past one process.

use super::AuthStore;
use crate::models::{
    AuditLogEntry, AuthorizationCode, ClientApplication, RateLimitCounter, RegisteredRedirectUri,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;

/// In-memory implementation of [`AuthStore`]
#[derive(Default)]
pub struct InMemoryStore {
    clients: DashMap<String, ClientApplication>,
    redirect_uris: DashMap<String, Vec<RegisteredRedirectUri>>,
    codes: DashMap<String, AuthorizationCode>,
    /// Keyed by `(caller key, action)`
    counters: DashMap<(String, String), RateLimitCounter>,
    /// Single writer lock: the chain tail is one logical resource
    audit_log: Mutex<Vec<AuditLogEntry>>,
}

impl InMemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a registered client and its redirect URIs
    ///
    /// Registration is owned by an external process in production; this
    /// exists so tests and dev runs can populate the read-only registry.
    pub fn register_client(&self, client: ClientApplication, uris: Vec<RegisteredRedirectUri>) {
        self.redirect_uris.insert(client.client_id.clone(), uris);
        self.clients.insert(client.client_id.clone(), client);
    }

    /// Fetch a stored authorization code without consuming it (test support)
    #[must_use]
    pub fn peek_authorization_code(&self, code: &str) -> Option<AuthorizationCode> {
        self.codes.get(code).map(|c| c.clone())
    }
}

#[async_trait]
impl AuthStore for InMemoryStore {
    async fn get_client_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Option<ClientApplication>> {
        Ok(self.clients.get(client_id).map(|c| c.clone()))
    }

    async fn list_redirect_uris(&self, client_id: &str) -> Result<Vec<RegisteredRedirectUri>> {
        Ok(self
            .redirect_uris
            .get(client_id)
            .map(|uris| uris.clone())
            .unwrap_or_default())
    }

    async fn insert_authorization_code(&self, code: &AuthorizationCode) -> Result<()> {
        self.codes.insert(code.code.clone(), code.clone());
        Ok(())
    }

    async fn consume_authorization_code(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthorizationCode>> {
        // The DashMap shard lock held by get_mut makes the check-and-set
        // atomic per code, matching the SQL backend's conditional UPDATE.
        let Some(mut entry) = self.codes.get_mut(code) else {
            return Ok(None);
        };

        if entry.consumed_at.is_some()
            || entry.expires_at <= now
            || entry.client_id != client_id
            || entry.redirect_uri != redirect_uri
        {
            return Ok(None);
        }

        entry.consumed_at = Some(now);
        Ok(Some(entry.clone()))
    }

    async fn get_or_increment_rate_limit_counter(
        &self,
        key: &str,
        action: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<RateLimitCounter> {
        let mut entry = self
            .counters
            .entry((key.to_owned(), action.to_owned()))
            .or_insert(RateLimitCounter {
                count: 0,
                window_reset_at: now + window,
            });

        let counter = entry.value_mut();
        if counter.window_reset_at <= now {
            counter.count = 1;
            counter.window_reset_at = now + window;
        } else {
            counter.count += 1;
        }

        Ok(counter.clone())
    }

    async fn get_audit_chain_tail_hash(&self) -> Result<Option<String>> {
        let log = self.audit_log.lock().await;
        Ok(log.last().map(|e| e.log_hash.clone()))
    }

    async fn insert_audit_log_entry(
        &self,
        entry: &AuditLogEntry,
        expected_tail: Option<&str>,
    ) -> Result<bool> {
        let mut log = self.audit_log.lock().await;
        let current_tail = log.last().map(|e| e.log_hash.as_str());
        if current_tail != expected_tail {
            return Ok(false);
        }
        log.push(entry.clone());
        Ok(true)
    }

    async fn list_audit_log_entries(&self) -> Result<Vec<AuditLogEntry>> {
        Ok(self.audit_log.lock().await.clone())
    }
}
