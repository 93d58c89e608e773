// ABOUTME: Strive authorization server library root
// ABOUTME: OAuth 2.0 authorization endpoint with PKCE, rate limiting, and hash-chained audit
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Strive Authorization Server
//!
//! OAuth 2.0 authorization-code issuance for the Strive platform. Third-party
//! integrations send resource owners here to approve access; the server
//! validates the request, collects consent, and issues single-use codes the
//! token endpoint can exchange.
//!
//! Key properties:
//! - Redirect URIs match registration byte-for-byte, and errors are only
//!   redirected after that match succeeds
//! - PKCE is S256-only and mandatory for public clients
//! - Codes are single-use under any concurrency, enforced at the store
//! - Every terminal decision lands in a hash-chained audit log

/// Hash-chained audit logging
pub mod audit;
/// Resource-owner token verification
pub mod auth;
/// Server configuration
pub mod config;
/// Storage backends
pub mod database;
/// Error types and HTTP error responses
pub mod errors;
/// Logging configuration and initialization
pub mod logging;
/// Core domain types
pub mod models;
/// OAuth 2.0 authorization endpoint
pub mod oauth2_server;
/// HTTP routes
pub mod routes;
