// ABOUTME: Fixed-window rate limiting for the authorize endpoints
// ABOUTME: Store-side atomic increments keyed by caller IP and action
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rate limiting runs before any parameter validation so malformed floods pay
//! the same cost as well-formed ones. The count-and-check is one atomic store
//! operation; the process never does a read-modify-write on a counter it can
//! race another instance on.

use crate::config::RateLimitConfig;
use crate::database::AuthStore;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Result of a rate limit check
#[derive(Debug, Clone)]
pub struct RateLimitStatus {
    /// Whether this request is over the limit
    pub is_rate_limited: bool,
    /// Window budget
    pub limit: u32,
    /// Requests left in the current window
    pub remaining: u32,
    /// When the current window resets
    pub reset_at: DateTime<Utc>,
}

impl RateLimitStatus {
    /// Whole seconds until the window resets, for the `Retry-After` header
    ///
    /// Always at least 1: a client told to retry after 0 seconds would
    /// retry into the same window.
    #[must_use]
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> u64 {
        let secs = (self.reset_at - now).num_seconds().max(1);
        u64::try_from(secs).unwrap_or(1)
    }
}

/// Rate limit checks for authorize traffic
pub struct RateLimitManager {
    store: Arc<dyn AuthStore>,
    config: RateLimitConfig,
}

impl RateLimitManager {
    /// Create a manager over the injected store
    #[must_use]
    pub fn new(store: Arc<dyn AuthStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    /// Count this request against `(key, action)` and report the status
    ///
    /// Counting happens on every request including the one that gets
    /// rejected; there is no separate record step to forget.
    ///
    /// # Errors
    /// Returns an error when the store fails.
    pub async fn check_rate_limit(&self, key: &str, action: &str) -> Result<RateLimitStatus> {
        self.check_rate_limit_at(key, action, Utc::now()).await
    }

    /// Like [`Self::check_rate_limit`] with an explicit clock, for tests
    ///
    /// # Errors
    /// Returns an error when the store fails.
    pub async fn check_rate_limit_at(
        &self,
        key: &str,
        action: &str,
        now: DateTime<Utc>,
    ) -> Result<RateLimitStatus> {
        let limit = self.config.requests_per_window;

        if !self.config.enabled {
            return Ok(RateLimitStatus {
                is_rate_limited: false,
                limit,
                remaining: limit,
                reset_at: now,
            });
        }

        let window =
            Duration::seconds(i64::try_from(self.config.window_seconds).unwrap_or(i64::MAX));
        let counter = self
            .store
            .get_or_increment_rate_limit_counter(key, action, window, now)
            .await?;

        Ok(RateLimitStatus {
            is_rate_limited: counter.count > limit,
            limit,
            remaining: limit.saturating_sub(counter.count),
            reset_at: counter.window_reset_at,
        })
    }
}
