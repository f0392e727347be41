// ABOUTME: OAuth 2.0 request and response structures for authorize, token and revoke
// ABOUTME: Implements RFC 6749 and RFC 7009 wire shapes plus redirect construction
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::{DateTime, Duration, Utc};
use oauth2_authority_core::{GrantError, TokenKind};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::lifetimes::DEFAULT_AUTHORIZATION_CODE_TTL_SECS;
use crate::constants::oauth2::TOKEN_TYPE_BEARER;

/// Grant engine behaviour that is not part of the client registration
#[derive(Debug, Clone, Copy)]
pub struct GrantSettings {
    /// Lifetime of issued authorization codes
    pub authorization_code_ttl: Duration,
    /// Issue a new refresh token on every refresh and retire the old one
    pub rotate_refresh_tokens: bool,
}

impl Default for GrantSettings {
    fn default() -> Self {
        Self {
            authorization_code_ttl: Duration::seconds(DEFAULT_AUTHORIZATION_CODE_TTL_SECS),
            rotate_refresh_tokens: false,
        }
    }
}

/// OAuth 2.0 Authorization Request
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AuthorizeRequest {
    /// Response type; only `code` is supported
    pub response_type: Option<String>,
    /// Client identifier
    pub client_id: Option<String>,
    /// Redirect URI for response
    pub redirect_uri: Option<String>,
    /// Requested scope, stored and echoed verbatim
    pub scope: Option<String>,
    /// Opaque client state, echoed on the redirect
    pub state: Option<String>,
}

/// OAuth 2.0 Authorization Response
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizeResponse {
    /// Authorization code
    pub code: String,
    /// State parameter (if provided in request)
    pub state: Option<String>,
    /// Validated redirect URI the code is bound to
    pub redirect_uri: String,
}

impl AuthorizeResponse {
    /// `redirect_uri?code=..&state=..`
    ///
    /// # Errors
    /// Returns `GrantError::ServerError` if the registered URI cannot be parsed
    pub fn redirect_location(&self) -> Result<String, GrantError> {
        let mut params = vec![("code", self.code.as_str())];
        if let Some(state) = &self.state {
            params.push(("state", state.as_str()));
        }
        append_query(&self.redirect_uri, &params)
    }
}

/// Failure of the authorization endpoint
///
/// Carries a redirect target only once the redirect URI has been validated
/// against the registration; before that point errors are reported directly.
#[derive(Debug, Clone)]
pub struct AuthorizationFailure {
    /// What went wrong
    pub error: GrantError,
    /// Validated redirect URI, if validation got that far
    pub redirect_uri: Option<String>,
    /// State to echo on the error redirect
    pub state: Option<String>,
}

impl AuthorizationFailure {
    /// Failure reported directly to the user agent
    #[must_use]
    pub const fn direct(error: GrantError) -> Self {
        Self {
            error,
            redirect_uri: None,
            state: None,
        }
    }

    /// Failure delivered to the client via its redirect URI
    #[must_use]
    pub const fn redirected(error: GrantError, redirect_uri: String, state: Option<String>) -> Self {
        Self {
            error,
            redirect_uri: Some(redirect_uri),
            state,
        }
    }

    /// `redirect_uri?error=..&error_description=..&state=..` when redirectable
    #[must_use]
    pub fn redirect_location(&self) -> Option<String> {
        if matches!(self.error, GrantError::AuthenticationRequired { .. }) {
            return None;
        }
        let redirect_uri = self.redirect_uri.as_deref()?;
        let description = self.error.description();
        let mut params = vec![
            ("error", self.error.error_code()),
            ("error_description", description.as_str()),
        ];
        if let Some(state) = &self.state {
            params.push(("state", state.as_str()));
        }
        append_query(redirect_uri, &params).ok()
    }
}

impl From<GrantError> for AuthorizationFailure {
    fn from(error: GrantError) -> Self {
        Self::direct(error)
    }
}

fn append_query(base: &str, params: &[(&str, &str)]) -> Result<String, GrantError> {
    let mut url =
        Url::parse(base).map_err(|_| GrantError::ServerError("registered redirect URI is invalid"))?;
    url.query_pairs_mut().extend_pairs(params);
    Ok(url.into())
}

/// OAuth 2.0 Token Request
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TokenRequest {
    /// Grant type (`authorization_code`, `refresh_token`)
    pub grant_type: Option<String>,
    /// Authorization code (for `authorization_code` grant)
    pub code: Option<String>,
    /// Redirect URI (must equal the one used at authorization)
    pub redirect_uri: Option<String>,
    /// Client ID
    pub client_id: Option<String>,
    /// Client secret
    pub client_secret: Option<String>,
    /// Refresh token (for `refresh_token` grant)
    pub refresh_token: Option<String>,
    /// Requested scope; ignored, tokens keep the scope they were granted with
    pub scope: Option<String>,
}

/// OAuth 2.0 Token Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Access token
    pub access_token: String,
    /// Token type (always "bearer")
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    /// Refresh token usable with the `refresh_token` grant
    pub refresh_token: String,
    /// Scope granted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Bearer response for a minted pair
    #[must_use]
    pub fn bearer(
        access_token: String,
        expires_in: i64,
        refresh_token: String,
        scope: Option<String>,
    ) -> Self {
        Self {
            access_token,
            token_type: TOKEN_TYPE_BEARER.to_owned(),
            expires_in,
            refresh_token,
            scope,
        }
    }
}

/// Token revocation request (RFC 7009), also accepting a bare `refresh_token` field
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RevocationRequest {
    /// Token to revoke (RFC 7009 field name)
    pub token: Option<String>,
    /// Refresh token to revoke
    pub refresh_token: Option<String>,
    /// `access_token` or `refresh_token`
    pub token_type_hint: Option<String>,
    /// Client ID, validated when present
    pub client_id: Option<String>,
    /// Client secret
    pub client_secret: Option<String>,
}

impl RevocationRequest {
    /// The credential value to revoke
    #[must_use]
    pub fn token_value(&self) -> Option<&str> {
        self.refresh_token
            .as_deref()
            .or(self.token.as_deref())
            .filter(|t| !t.is_empty())
    }

    /// Parsed hint; a bare `refresh_token` field implies a refresh token
    #[must_use]
    pub fn hint(&self) -> Option<TokenKind> {
        self.token_type_hint
            .as_deref()
            .and_then(TokenKind::from_hint)
            .or_else(|| self.refresh_token.as_ref().map(|_| TokenKind::RefreshToken))
    }
}

/// Result of a revocation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationOutcome {
    /// A stored credential of this kind was deleted
    Revoked(TokenKind),
    /// Nothing matched; already revoked, expired and purged, or never issued
    NotFound,
}

/// Identity attached to a request that presented a valid access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPrincipal {
    /// User the token acts for
    pub user_id: String,
    /// Scope the token was granted with
    pub scope: Option<String>,
    /// When the token stops being valid
    pub expires_at: DateTime<Utc>,
}
