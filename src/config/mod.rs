// ABOUTME: Configuration module for server settings
// ABOUTME: Environment-only configuration loading, no config files
//
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Environment-based server configuration
pub mod environment;

pub use environment::{
    AuthConfig, OAuth2ServerConfig, RateLimitConfig, ServerConfig,
};
