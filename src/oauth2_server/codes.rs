// ABOUTME: Authorization code issuance and single-use consumption
// ABOUTME: 256-bit random codes, store-side atomic consume, uniform invalid_grant on failure
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::database::AuthStore;
use crate::models::AuthorizationCode;
use crate::oauth2_server::models::OAuth2Error;
use crate::oauth2_server::pkce;
use anyhow::{anyhow, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;
use uuid::Uuid;

/// What a successfully exchanged code grants
#[derive(Debug, Clone)]
pub struct Grant {
    /// Resource owner who approved the request
    pub user_id: Uuid,
    /// Client the grant belongs to
    pub client_id: String,
    /// Granted scopes
    pub scope: Option<String>,
}

/// Generate a cryptographically secure URL-safe random string
///
/// # Errors
/// Returns an error if the system RNG fails.
fn generate_random_string(len: usize) -> Result<String> {
    let rng = SystemRandom::new();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes)
        .map_err(|_| anyhow!("system RNG failure"))?;
    Ok(URL_SAFE_NO_PAD.encode(&bytes))
}

/// Issues and consumes single-use authorization codes
pub struct AuthorizationCodeManager {
    store: Arc<dyn AuthStore>,
    ttl: Duration,
    store_timeout: std::time::Duration,
}

/// Everything a code is bound to at issuance
#[derive(Debug, Clone)]
pub struct CodeIssuance<'a> {
    /// Client the code is issued to
    pub client_id: &'a str,
    /// Resource owner who approved the request
    pub user_id: Uuid,
    /// Redirect URI the exchange must repeat exactly
    pub redirect_uri: &'a str,
    /// Approved scopes
    pub scope: Option<&'a str>,
    /// PKCE challenge, if the request carried one
    pub code_challenge: Option<&'a str>,
    /// PKCE challenge method, "S256" when present
    pub code_challenge_method: Option<&'a str>,
}

impl AuthorizationCodeManager {
    /// Create a manager over the injected store
    ///
    /// `store_timeout` bounds the consume call; a hung store fails the
    /// exchange instead of stalling it.
    #[must_use]
    pub fn new(store: Arc<dyn AuthStore>, ttl: Duration, store_timeout: std::time::Duration) -> Self {
        Self {
            store,
            ttl,
            store_timeout,
        }
    }

    /// Issue a fresh authorization code bound to the approved request
    ///
    /// Codes carry 256 bits of entropy; opacity is the only secrecy, the
    /// value encodes nothing.
    ///
    /// # Errors
    /// Returns an error when the RNG or the store fails.
    pub async fn create_code(&self, issuance: CodeIssuance<'_>) -> Result<String> {
        let code = generate_random_string(32)?;
        let now = Utc::now();

        let record = AuthorizationCode {
            code: code.clone(),
            client_id: issuance.client_id.to_owned(),
            user_id: issuance.user_id,
            redirect_uri: issuance.redirect_uri.to_owned(),
            scope: issuance.scope.map(str::to_owned),
            code_challenge: issuance.code_challenge.map(str::to_owned),
            code_challenge_method: issuance.code_challenge_method.map(str::to_owned),
            created_at: now,
            expires_at: now + self.ttl,
            consumed_at: None,
        };

        self.store.insert_authorization_code(&record).await?;
        Ok(code)
    }

    /// Atomically consume a code and verify its PKCE binding
    ///
    /// The store-side conditional update checks existence, expiry, client
    /// binding, and redirect binding in one step; under concurrent exchange
    /// attempts exactly one caller wins. PKCE verification runs after the
    /// consume, so a wrong verifier still burns the code.
    ///
    /// Every failure maps to the same `invalid_grant` shape. The caller
    /// learns nothing about which check failed.
    ///
    /// # Errors
    /// `invalid_grant` for any validation failure, `server_error` when the
    /// store itself fails.
    pub async fn validate_and_consume_code(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> Result<Grant, OAuth2Error> {
        let consumed = match tokio::time::timeout(
            self.store_timeout,
            self.store
                .consume_authorization_code(code, client_id, redirect_uri, Utc::now()),
        )
        .await
        {
            Ok(Ok(consumed)) => consumed,
            Ok(Err(e)) => {
                tracing::error!("authorization code consume failed: {e:#}");
                return Err(OAuth2Error::server_error());
            }
            Err(_) => {
                tracing::error!("authorization code consume timed out");
                return Err(OAuth2Error::server_error());
            }
        };

        let Some(record) = consumed else {
            return Err(invalid_grant());
        };

        match (record.code_challenge.as_deref(), code_verifier) {
            (Some(challenge), Some(verifier)) => {
                if !pkce::verify(verifier, challenge) {
                    return Err(invalid_grant());
                }
            }
            (None, None) => {}
            // Challenge without verifier, or verifier against a code that
            // was issued without one
            _ => return Err(invalid_grant()),
        }

        Ok(Grant {
            user_id: record.user_id,
            client_id: record.client_id,
            scope: record.scope,
        })
    }
}

fn invalid_grant() -> OAuth2Error {
    OAuth2Error::invalid_grant("Invalid or expired authorization code")
}
