// ABOUTME: SQLite AuthStore backend with atomic conditional SQL for contended resources
// ABOUTME: Single-statement consume, windowed counter upsert, and unique-predecessor audit inserts
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::AuthStore;
use crate::models::{
    AuditLogEntry, AuthorizationCode, ClientApplication, ClientType, RateLimitCounter,
    RegisteredRedirectUri,
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

/// SQLite-backed implementation of [`AuthStore`]
///
/// All timestamps are stored as unix epoch milliseconds so window and expiry
/// comparisons happen as integer arithmetic inside the database, never as
/// read-then-write sequences in process memory.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS clients (
        client_id TEXT PRIMARY KEY,
        client_type TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1
    )",
    "CREATE TABLE IF NOT EXISTS redirect_uris (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        client_id TEXT NOT NULL REFERENCES clients(client_id),
        uri TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1
    )",
    "CREATE TABLE IF NOT EXISTS authorization_codes (
        code TEXT PRIMARY KEY,
        client_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        redirect_uri TEXT NOT NULL,
        scope TEXT,
        code_challenge TEXT,
        code_challenge_method TEXT,
        created_at INTEGER NOT NULL,
        expires_at INTEGER NOT NULL,
        consumed_at INTEGER
    )",
    "CREATE TABLE IF NOT EXISTS rate_limit_counters (
        counter_key TEXT NOT NULL,
        action TEXT NOT NULL,
        count INTEGER NOT NULL,
        window_reset_at INTEGER NOT NULL,
        PRIMARY KEY (counter_key, action)
    )",
    // previous_log_hash is UNIQUE: two entries can never claim the same
    // predecessor, so the chain cannot fork even under concurrent writers.
    "CREATE TABLE IF NOT EXISTS audit_log_entries (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        client_id TEXT,
        user_id TEXT,
        action TEXT NOT NULL,
        ip_address TEXT NOT NULL,
        user_agent_hash TEXT NOT NULL,
        success INTEGER NOT NULL,
        error_message TEXT,
        log_hash TEXT NOT NULL UNIQUE,
        previous_log_hash TEXT NOT NULL UNIQUE,
        created_at INTEGER NOT NULL
    )",
];

impl SqliteStore {
    /// Connect to the database and bootstrap the schema
    ///
    /// # Errors
    /// Returns an error if the pool cannot be created or DDL fails.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .with_context(|| format!("failed to open database at {database_url}"))?;

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .context("schema bootstrap failed")?;
        }

        Ok(Self { pool })
    }

    /// Seed a registered client and its redirect URIs
    ///
    /// Registration is owned by an external process; this exists for
    /// operational seeding and tests.
    ///
    /// # Errors
    /// Returns an error when the insert fails (duplicate client id included).
    pub async fn register_client(
        &self,
        client: &ClientApplication,
        uris: &[RegisteredRedirectUri],
    ) -> Result<()> {
        sqlx::query("INSERT INTO clients (client_id, client_type, is_active) VALUES (?1, ?2, ?3)")
            .bind(&client.client_id)
            .bind(client_type_str(client.client_type))
            .bind(i64::from(client.is_active))
            .execute(&self.pool)
            .await?;

        for uri in uris {
            sqlx::query(
                "INSERT INTO redirect_uris (client_id, uri, is_active) VALUES (?1, ?2, ?3)",
            )
            .bind(&client.client_id)
            .bind(&uri.uri)
            .bind(i64::from(uri.is_active))
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }
}

const fn client_type_str(client_type: ClientType) -> &'static str {
    match client_type {
        ClientType::Public => "public",
        ClientType::Confidential => "confidential",
    }
}

fn parse_client_type(raw: &str) -> Result<ClientType> {
    match raw {
        "public" => Ok(ClientType::Public),
        "confidential" => Ok(ClientType::Confidential),
        other => Err(anyhow!("unknown client_type '{other}'")),
    }
}

fn millis_to_datetime(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| anyhow!("timestamp out of range"))
}

fn map_code_row(row: &SqliteRow) -> Result<AuthorizationCode> {
    let consumed_at: Option<i64> = row.try_get("consumed_at")?;
    let user_id: String = row.try_get("user_id")?;
    Ok(AuthorizationCode {
        code: row.try_get("code")?,
        client_id: row.try_get("client_id")?,
        user_id: Uuid::parse_str(&user_id).context("invalid user_id in store")?,
        redirect_uri: row.try_get("redirect_uri")?,
        scope: row.try_get("scope")?,
        code_challenge: row.try_get("code_challenge")?,
        code_challenge_method: row.try_get("code_challenge_method")?,
        created_at: millis_to_datetime(row.try_get("created_at")?)?,
        expires_at: millis_to_datetime(row.try_get("expires_at")?)?,
        consumed_at: consumed_at.map(millis_to_datetime).transpose()?,
    })
}

fn map_audit_row(row: &SqliteRow) -> Result<AuditLogEntry> {
    let id: String = row.try_get("id")?;
    let user_id: Option<String> = row.try_get("user_id")?;
    let success: i64 = row.try_get("success")?;
    Ok(AuditLogEntry {
        id: Uuid::parse_str(&id).context("invalid audit entry id")?,
        client_id: row.try_get("client_id")?,
        user_id: user_id
            .map(|u| Uuid::parse_str(&u))
            .transpose()
            .context("invalid user_id in audit entry")?,
        action: row.try_get("action")?,
        ip_address: row.try_get("ip_address")?,
        user_agent_hash: row.try_get("user_agent_hash")?,
        success: success != 0,
        error_message: row.try_get("error_message")?,
        log_hash: row.try_get("log_hash")?,
        previous_log_hash: row.try_get("previous_log_hash")?,
        created_at: millis_to_datetime(row.try_get("created_at")?)?,
    })
}

#[async_trait]
impl AuthStore for SqliteStore {
    async fn get_client_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Option<ClientApplication>> {
        let row = sqlx::query(
            "SELECT client_id, client_type, is_active FROM clients WHERE client_id = ?1",
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let raw: String = row.try_get("client_type")?;
            let is_active: i64 = row.try_get("is_active")?;
            Ok(ClientApplication {
                client_id: row.try_get("client_id")?,
                client_type: parse_client_type(&raw)?,
                is_active: is_active != 0,
            })
        })
        .transpose()
    }

    async fn list_redirect_uris(&self, client_id: &str) -> Result<Vec<RegisteredRedirectUri>> {
        let rows = sqlx::query(
            "SELECT uri, is_active FROM redirect_uris WHERE client_id = ?1 ORDER BY id",
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let is_active: i64 = row.try_get("is_active")?;
                Ok(RegisteredRedirectUri {
                    uri: row.try_get("uri")?,
                    is_active: is_active != 0,
                })
            })
            .collect()
    }

    async fn insert_authorization_code(&self, code: &AuthorizationCode) -> Result<()> {
        sqlx::query(
            "INSERT INTO authorization_codes
                 (code, client_id, user_id, redirect_uri, scope,
                  code_challenge, code_challenge_method, created_at, expires_at, consumed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL)",
        )
        .bind(&code.code)
        .bind(&code.client_id)
        .bind(code.user_id.to_string())
        .bind(&code.redirect_uri)
        .bind(&code.scope)
        .bind(&code.code_challenge)
        .bind(&code.code_challenge_method)
        .bind(code.created_at.timestamp_millis())
        .bind(code.expires_at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn consume_authorization_code(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthorizationCode>> {
        // Single conditional UPDATE: concurrent exchange attempts race on the
        // consumed_at IS NULL predicate and exactly one observes a row.
        let row = sqlx::query(
            "UPDATE authorization_codes
             SET consumed_at = ?1
             WHERE code = ?2
               AND client_id = ?3
               AND redirect_uri = ?4
               AND consumed_at IS NULL
               AND expires_at > ?1
             RETURNING code, client_id, user_id, redirect_uri, scope,
                       code_challenge, code_challenge_method,
                       created_at, expires_at, consumed_at",
        )
        .bind(now.timestamp_millis())
        .bind(code)
        .bind(client_id)
        .bind(redirect_uri)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_code_row).transpose()
    }

    async fn get_or_increment_rate_limit_counter(
        &self,
        key: &str,
        action: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<RateLimitCounter> {
        let now_ms = now.timestamp_millis();
        let reset_ms = (now + window).timestamp_millis();

        let row = sqlx::query(
            "INSERT INTO rate_limit_counters (counter_key, action, count, window_reset_at)
             VALUES (?1, ?2, 1, ?3)
             ON CONFLICT (counter_key, action) DO UPDATE SET
                 count = CASE
                     WHEN rate_limit_counters.window_reset_at <= ?4 THEN 1
                     ELSE rate_limit_counters.count + 1
                 END,
                 window_reset_at = CASE
                     WHEN rate_limit_counters.window_reset_at <= ?4 THEN ?3
                     ELSE rate_limit_counters.window_reset_at
                 END
             RETURNING count, window_reset_at",
        )
        .bind(key)
        .bind(action)
        .bind(reset_ms)
        .bind(now_ms)
        .fetch_one(&self.pool)
        .await?;

        let count: i64 = row.try_get("count")?;
        Ok(RateLimitCounter {
            count: u32::try_from(count).unwrap_or(u32::MAX),
            window_reset_at: millis_to_datetime(row.try_get("window_reset_at")?)?,
        })
    }

    async fn get_audit_chain_tail_hash(&self) -> Result<Option<String>> {
        let row =
            sqlx::query("SELECT log_hash FROM audit_log_entries ORDER BY seq DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;
        row.map(|r| r.try_get("log_hash").map_err(Into::into))
            .transpose()
    }

    async fn insert_audit_log_entry(
        &self,
        entry: &AuditLogEntry,
        _expected_tail: Option<&str>,
    ) -> Result<bool> {
        // The UNIQUE constraint on previous_log_hash is the conditional: an
        // insert whose predecessor is no longer the tail collides with the
        // entry that advanced it and reports a lost race instead of forking.
        let result = sqlx::query(
            "INSERT INTO audit_log_entries
                 (id, client_id, user_id, action, ip_address, user_agent_hash,
                  success, error_message, log_hash, previous_log_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(entry.id.to_string())
        .bind(&entry.client_id)
        .bind(entry.user_id.map(|u| u.to_string()))
        .bind(&entry.action)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent_hash)
        .bind(i64::from(entry.success))
        .bind(&entry.error_message)
        .bind(&entry.log_hash)
        .bind(&entry.previous_log_hash)
        .bind(entry.created_at.timestamp_millis())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(sqlx::Error::Database(db_err))
                if db_err.kind() == sqlx::error::ErrorKind::UniqueViolation =>
            {
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_audit_log_entries(&self) -> Result<Vec<AuditLogEntry>> {
        let rows = sqlx::query(
            "SELECT id, client_id, user_id, action, ip_address, user_agent_hash,
                    success, error_message, log_hash, previous_log_hash, created_at
             FROM audit_log_entries ORDER BY seq",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_audit_row).collect()
    }
}
