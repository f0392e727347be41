// ABOUTME: OAuth 2.0 credential models for the registered client, codes, and tokens
// ABOUTME: Used by the credential store and grant engine; expiry is evaluated lazily via Expiring
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::GrantError;

/// Grant types a client may be allowed to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// RFC 6749 Section 4.1
    AuthorizationCode,
    /// RFC 6749 Section 6
    RefreshToken,
}

impl GrantType {
    /// Wire name of the grant type
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrantType {
    type Err = GrantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authorization_code" => Ok(Self::AuthorizationCode),
            "refresh_token" => Ok(Self::RefreshToken),
            other => Err(GrantError::UnsupportedGrantType(other.to_owned())),
        }
    }
}

/// Kind of bearer credential, used for revocation hints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Short-lived bearer credential
    AccessToken,
    /// Long-lived credential for minting new access tokens
    RefreshToken,
}

impl TokenKind {
    /// Parse an RFC 7009 `token_type_hint`; unknown hints are ignored
    #[must_use]
    pub fn from_hint(hint: &str) -> Option<Self> {
        match hint {
            "access_token" => Some(Self::AccessToken),
            "refresh_token" => Some(Self::RefreshToken),
            _ => None,
        }
    }

    /// Wire name of the token kind
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
        }
    }
}

/// The single registered OAuth 2.0 client
#[derive(Clone)]
pub struct Client {
    /// OAuth 2.0 client identifier
    pub id: String,
    /// Shared secret; `None` for public clients
    pub secret: Option<String>,
    /// Redirect URIs accepted by exact string comparison
    pub allowed_redirect_uris: Vec<String>,
    /// Lifetime of minted access tokens
    pub access_token_ttl: Duration,
    /// Lifetime of minted refresh tokens
    pub refresh_token_ttl: Duration,
    /// Grant types this client may use
    pub allowed_grants: Vec<GrantType>,
}

impl Client {
    /// Exact-match membership test against the registered redirect URIs
    #[must_use]
    pub fn has_redirect_uri(&self, uri: &str) -> bool {
        self.allowed_redirect_uris.iter().any(|allowed| allowed == uri)
    }

    /// Whether the client is configured for the grant type
    #[must_use]
    pub fn allows_grant(&self, grant: GrantType) -> bool {
        self.allowed_grants.contains(&grant)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("allowed_redirect_uris", &self.allowed_redirect_uris)
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("allowed_grants", &self.allowed_grants)
            .finish()
    }
}

/// Authenticated end user as reported by the authentication delegate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Opaque user identifier
    pub id: String,
    /// Email address when the identity provider supplies one
    pub email: Option<String>,
}

impl User {
    /// User with only an identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }
}

/// Records that stop being valid at a fixed instant
pub trait Expiring {
    /// Instant at which the record stops being valid
    fn expires_at(&self) -> DateTime<Utc>;

    /// A record is valid strictly before `expires_at`
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}

/// OAuth 2.0 Authorization Code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCode {
    /// The authorization code value
    pub code: String,
    /// When this authorization code expires
    pub expires_at: DateTime<Utc>,
    /// Redirect URI that must match during token exchange
    pub redirect_uri: String,
    /// Opaque scope string echoed from the authorization request
    pub scope: Option<String>,
    /// User who authorized the code
    pub user_id: String,
}

/// OAuth 2.0 Access Token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    /// The bearer token value
    pub token: String,
    /// When this access token expires
    pub expires_at: DateTime<Utc>,
    /// Opaque scope string
    pub scope: Option<String>,
    /// User the token acts for
    pub user_id: String,
}

/// OAuth 2.0 Refresh Token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    /// The refresh token value
    pub token: String,
    /// When this refresh token expires
    pub expires_at: DateTime<Utc>,
    /// Opaque scope string
    pub scope: Option<String>,
    /// User the token acts for
    pub user_id: String,
}

impl Expiring for AuthorizationCode {
    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl Expiring for AccessToken {
    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl Expiring for RefreshToken {
    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}
