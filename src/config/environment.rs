// ABOUTME: Environment-based server configuration with typed sections
// ABOUTME: Loads HTTP, database, auth, rate-limit, and OAuth2 server settings from env vars
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Top-level server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,
    /// Database connection URL (sqlite)
    pub database_url: String,
    /// Resource-owner token verification settings
    pub auth: AuthConfig,
    /// Rate limiting settings
    pub rate_limit: RateLimitConfig,
    /// OAuth 2.0 authorization server settings
    pub oauth2_server: OAuth2ServerConfig,
}

/// Resource-owner token verification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret for bearer token verification
    pub jwt_secret: String,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    pub enabled: bool,
    /// Requests per window
    pub requests_per_window: u32,
    /// Window duration in seconds
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_window: 60,
            window_seconds: 60,
        }
    }
}

/// OAuth 2.0 authorization server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuth2ServerConfig {
    /// Issuer URL advertised in discovery metadata
    pub issuer_url: String,
    /// Internal consent page the GET leg redirects to on success
    pub consent_page_path: String,
    /// Authorization code time-to-live in minutes
    pub code_ttl_minutes: i64,
    /// Per-call timeout for collaborator calls (store, token verification)
    pub collaborator_timeout_ms: u64,
    /// Bounded retries for audit chain appends that lose the tail race
    pub audit_append_retries: u32,
}

impl Default for OAuth2ServerConfig {
    fn default() -> Self {
        Self {
            issuer_url: "http://localhost:8081".into(),
            consent_page_path: "/oauth2/consent".into(),
            code_ttl_minutes: 10,
            collaborator_timeout_ms: 5000,
            audit_append_retries: 5,
        }
    }
}

impl OAuth2ServerConfig {
    /// Collaborator timeout as a [`Duration`]
    #[must_use]
    pub const fn collaborator_timeout(&self) -> Duration {
        Duration::from_millis(self.collaborator_timeout_ms)
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if `JWT_SECRET` is missing or a numeric variable
    /// cannot be parsed.
    pub fn from_env() -> AppResult<Self> {
        let http_port = parse_env("HTTP_PORT", 8081_u16)?;
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:data/strive-auth.db?mode=rwc".into());

        let jwt_secret = env::var("JWT_SECRET").map_err(|_| {
            AppError::new(
                crate::errors::ErrorCode::ConfigMissing,
                "JWT_SECRET environment variable is required",
            )
        })?;

        let rate_limit = RateLimitConfig {
            enabled: env::var("RATE_LIMIT_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            requests_per_window: parse_env(
                "RATE_LIMIT_REQUESTS_PER_WINDOW",
                RateLimitConfig::default().requests_per_window,
            )?,
            window_seconds: parse_env(
                "RATE_LIMIT_WINDOW_SECONDS",
                RateLimitConfig::default().window_seconds,
            )?,
        };

        let defaults = OAuth2ServerConfig::default();
        let oauth2_server = OAuth2ServerConfig {
            issuer_url: env::var("OAUTH2_ISSUER_URL").unwrap_or(defaults.issuer_url),
            consent_page_path: env::var("OAUTH2_CONSENT_PAGE_PATH")
                .unwrap_or(defaults.consent_page_path),
            code_ttl_minutes: parse_env("OAUTH2_CODE_TTL_MINUTES", defaults.code_ttl_minutes)?,
            collaborator_timeout_ms: parse_env(
                "OAUTH2_COLLABORATOR_TIMEOUT_MS",
                defaults.collaborator_timeout_ms,
            )?,
            audit_append_retries: parse_env(
                "OAUTH2_AUDIT_APPEND_RETRIES",
                defaults.audit_append_retries,
            )?,
        };

        Ok(Self {
            http_port,
            database_url,
            auth: AuthConfig { jwt_secret },
            rate_limit,
            oauth2_server,
        })
    }

    /// One-line configuration summary for startup logging (no secrets)
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "port={} db={} rate_limit={}/{}s code_ttl={}m issuer={}",
            self.http_port,
            self.database_url,
            self.rate_limit.requests_per_window,
            self.rate_limit.window_seconds,
            self.oauth2_server.code_ttl_minutes,
            self.oauth2_server.issuer_url
        )
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> AppResult<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| AppError::config(format!("invalid {name}: {e}"))),
        Err(_) => Ok(default),
    }
}
