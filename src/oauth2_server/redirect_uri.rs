// ABOUTME: Exact-match redirect URI validation for the authorize endpoint
// ABOUTME: Byte comparison against registered URIs, no normalization of any kind
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Redirect URI validation is the trust boundary for error delivery: before a
//! candidate URI passes this check, errors go back to the caller directly and
//! never via redirect. Matching is byte-for-byte equality against the client's
//! active registered URIs. No scheme, host-case, port, trailing-slash, or
//! percent-encoding normalization is applied; `https://app.example.com/callback`
//! and `https://app.example.com/callback/` are different URIs.

/// True when `candidate` exactly matches one of the registered URIs
#[must_use]
pub fn is_registered(candidate: &str, registered: &[String]) -> bool {
    registered.iter().any(|uri| uri == candidate)
}
