// ABOUTME: PKCE (RFC 7636) challenge and verifier validation, S256 only
// ABOUTME: Constant-time digest comparison so verification leaks no timing signal
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::models::ClientType;
use crate::oauth2_server::models::OAuth2Error;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const MIN_LEN: usize = 43;
const MAX_LEN: usize = 128;

fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~')
}

fn valid_shape(value: &str) -> bool {
    (MIN_LEN..=MAX_LEN).contains(&value.len()) && value.bytes().all(is_unreserved)
}

/// Validate PKCE parameters supplied with an authorization request
///
/// Public clients must send a challenge; confidential clients may omit it.
/// When a challenge is present the method must be exactly `S256` - `plain`
/// and every other value are rejected regardless of client type.
///
/// # Errors
/// Returns `invalid_request` describing the first failed check.
pub fn validate_challenge(
    client_type: ClientType,
    code_challenge: Option<&str>,
    code_challenge_method: Option<&str>,
) -> Result<(), OAuth2Error> {
    let Some(challenge) = code_challenge else {
        if code_challenge_method.is_some() {
            return Err(OAuth2Error::invalid_request(
                "code_challenge_method requires code_challenge",
            ));
        }
        return match client_type {
            ClientType::Public => Err(OAuth2Error::invalid_request(
                "code_challenge is required for public clients",
            )),
            ClientType::Confidential => Ok(()),
        };
    };

    match code_challenge_method {
        Some("S256") => {}
        Some(_) => {
            return Err(OAuth2Error::invalid_request(
                "Only the S256 code_challenge_method is supported",
            ));
        }
        None => {
            return Err(OAuth2Error::invalid_request(
                "code_challenge_method is required with code_challenge",
            ));
        }
    }

    if !valid_shape(challenge) {
        return Err(OAuth2Error::invalid_request(
            "code_challenge must be 43-128 unreserved characters",
        ));
    }

    Ok(())
}

/// Compute the S256 challenge for a verifier
#[must_use]
pub fn compute_challenge(code_verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code_verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Verify a code verifier against the challenge stored at issuance
///
/// Runs after the code is consumed, so a failed verifier still burns the
/// code. The digest comparison is constant-time.
#[must_use]
pub fn verify(code_verifier: &str, stored_challenge: &str) -> bool {
    if !valid_shape(code_verifier) {
        return false;
    }
    let computed = compute_challenge(code_verifier);
    computed.as_bytes().ct_eq(stored_challenge.as_bytes()).into()
}
