// ABOUTME: System-wide constants and defaults for the OAuth 2.0 authorization server
// ABOUTME: Token lifetimes, route paths, environment defaults and protocol literals
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Constants Module
//!
//! Defaults used when the corresponding environment variable is not set,
//! plus protocol literals shared by the engine and the HTTP adapter.

/// Service identity
pub mod service_names {
    /// Service name used in structured logs and discovery
    pub const OAUTH2_AUTHORITY: &str = "oauth2-authority";
}

/// Token and code lifetimes, in seconds
pub mod lifetimes {
    /// Access token lifetime (1 hour)
    pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 3600;
    /// Refresh token lifetime (24 hours)
    pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: i64 = 86_400;
    /// Authorization code lifetime (10 minutes)
    pub const DEFAULT_AUTHORIZATION_CODE_TTL_SECS: i64 = 600;
    /// Upper bound for authorization codes, RFC 6749 Section 4.1.2
    pub const MAX_AUTHORIZATION_CODE_TTL_SECS: i64 = 600;
    /// Upper bound for access and refresh tokens (10 years)
    pub const MAX_TOKEN_TTL_SECS: i64 = 315_360_000;
}

/// Protocol literals
pub mod oauth2 {
    /// The only supported `response_type`
    pub const RESPONSE_TYPE_CODE: &str = "code";
    /// `token_type` returned in token responses
    pub const TOKEN_TYPE_BEARER: &str = "bearer";
    /// Random bytes per code or token (256 bits)
    pub const TOKEN_BYTES: usize = 32;
    /// Attempts at minting a value that does not collide with a stored one
    pub const MAX_GENERATION_ATTEMPTS: u32 = 3;
    /// Client authentication methods advertised in discovery
    pub const TOKEN_ENDPOINT_AUTH_METHODS: &[&str] =
        &["client_secret_basic", "client_secret_post", "none"];
}

/// HTTP route paths
pub mod routes {
    /// Authorization endpoint
    pub const AUTHORIZE: &str = "/oauth2/authorize";
    /// Token endpoint
    pub const TOKEN: &str = "/oauth2/token";
    /// Revocation endpoint (RFC 7009)
    pub const REVOKE: &str = "/oauth2/revoke";
    /// Bearer-protected identity endpoint
    pub const USERINFO: &str = "/oauth2/userinfo";
    /// Authorization server metadata (RFC 8414)
    pub const DISCOVERY: &str = "/.well-known/oauth-authorization-server";
    /// Liveness probe
    pub const HEALTH: &str = "/health";
}

/// Network and storage defaults
pub mod network {
    /// HTTP listener port
    pub const DEFAULT_HTTP_PORT: u16 = 8081;
    /// SQLite database location
    pub const DEFAULT_DATABASE_URL: &str = "sqlite:./oauth2.db";
}

/// Authentication delegate defaults
pub mod auth {
    /// Interactive login page the delegate redirects to
    pub const DEFAULT_LOGIN_URL: &str = "/login";
    /// Query parameter carrying the resume URL on the login page
    pub const RESUME_PARAM: &str = "next";
    /// Identity header set by the upstream authenticating proxy
    pub const DEFAULT_USER_HEADER: &str = "x-forwarded-user";
    /// Optional email header set by the upstream authenticating proxy
    pub const DEFAULT_EMAIL_HEADER: &str = "x-forwarded-email";
}

/// Background maintenance
pub mod maintenance {
    /// Expired credential purge interval; 0 disables the task
    pub const DEFAULT_PURGE_INTERVAL_SECS: u64 = 3600;
}
