// ABOUTME: Resource-owner token verification consumed by the POST authorize leg
// ABOUTME: Trait seam plus an HS256 JWT implementation; tests inject fakes
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Capability for verifying a resource-owner bearer token
///
/// The identity/session system is an external collaborator; this subsystem
/// only consumes `verify_user_token(token) -> user_id | fail`.
#[async_trait]
pub trait UserTokenVerifier: Send + Sync {
    /// Verify a bearer token and return the resource-owner id
    ///
    /// # Errors
    /// Returns an auth error for missing, malformed, expired, or forged
    /// tokens.
    async fn verify_user_token(&self, token: &str) -> AppResult<Uuid>;
}

/// JWT claims for resource-owner sessions
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Resource-owner id
    pub sub: String,
    /// Expiry (unix seconds)
    pub exp: i64,
    /// Issued at (unix seconds)
    pub iat: i64,
}

/// HS256 JWT verifier backed by a shared secret
pub struct JwtUserTokenVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtUserTokenVerifier {
    /// Create a verifier from the shared HS256 secret
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Issue a session token for a resource owner
    ///
    /// Production tokens come from the identity system; this mirrors its
    /// format for tests and operational tooling.
    ///
    /// # Errors
    /// Returns an error if signing fails.
    pub fn generate_user_token(&self, user_id: Uuid, expires_in: Duration) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (now + expires_in).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("failed to sign token: {e}")))
    }
}

#[async_trait]
impl UserTokenVerifier for JwtUserTokenVerifier {
    async fn verify_user_token(&self, token: &str) -> AppResult<Uuid> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::auth_expired(),
                _ => AppError::auth_invalid("Invalid bearer token"),
            })?;

        Uuid::parse_str(&data.claims.sub)
            .map_err(|_| AppError::auth_invalid("Malformed subject claim"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip() {
        let verifier = JwtUserTokenVerifier::new(b"test-secret");
        let user_id = Uuid::new_v4();
        let token = verifier
            .generate_user_token(user_id, Duration::hours(1))
            .unwrap();

        let verified = verifier.verify_user_token(&token).await.unwrap();
        assert_eq!(verified, user_id);
    }

    #[tokio::test]
    async fn test_rejects_wrong_secret() {
        let issuer = JwtUserTokenVerifier::new(b"secret-a");
        let verifier = JwtUserTokenVerifier::new(b"secret-b");
        let token = issuer
            .generate_user_token(Uuid::new_v4(), Duration::hours(1))
            .unwrap();

        assert!(verifier.verify_user_token(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_expired_token() {
        let verifier = JwtUserTokenVerifier::new(b"test-secret");
        let token = verifier
            .generate_user_token(Uuid::new_v4(), Duration::seconds(-120))
            .unwrap();

        let err = verifier.verify_user_token(&token).await.unwrap_err();
        assert_eq!(err.code, crate::errors::ErrorCode::AuthExpired);
    }

    #[tokio::test]
    async fn test_rejects_garbage() {
        let verifier = JwtUserTokenVerifier::new(b"test-secret");
        assert!(verifier.verify_user_token("not-a-jwt").await.is_err());
    }
}
