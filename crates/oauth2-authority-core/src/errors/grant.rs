// ABOUTME: Grant error taxonomy with RFC 6749 and RFC 6750 wire codes
// ABOUTME: Defines GrantError and the serializable OAuth2Error response body
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use serde::{Deserialize, Serialize};

/// Failure outcomes of the authorization, token, revocation and protection operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrantError {
    /// Request is missing a parameter or is otherwise malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(&'static str),

    /// Unknown client or wrong client secret; never says which
    #[error("Client authentication failed")]
    InvalidClient,

    /// Redirect URI is not registered for the client
    #[error("Redirect URI is not registered for this client")]
    InvalidRedirectUri,

    /// Authorization code or refresh token is unknown, expired, consumed or mismatched
    #[error("Invalid grant: {0}")]
    InvalidGrant(&'static str),

    /// Bearer token is unknown or expired
    #[error("Invalid access token: {0}")]
    InvalidToken(&'static str),

    /// Protected request carried no bearer credential
    #[error("Bearer token missing")]
    BearerTokenMissing,

    /// Client is not configured for the requested grant
    #[error("Client is not authorized to use {0}")]
    UnauthorizedClient(&'static str),

    /// Grant type is not one of the supported grants
    #[error("Unsupported grant type: {0}")]
    UnsupportedGrantType(String),

    /// Response type other than `code`
    #[error("Unsupported response type: {0}")]
    UnsupportedResponseType(String),

    /// End user must complete an interactive login before the request is retried
    #[error("Interactive login required")]
    AuthenticationRequired {
        /// Where to send the user agent; returns to the original request afterwards
        resume_url: String,
    },

    /// Credential store failed; details are logged, not returned
    #[error("Credential storage unavailable")]
    StorageUnavailable,

    /// Any other server-side failure, such as the system RNG
    #[error("Server error: {0}")]
    ServerError(&'static str),
}

impl GrantError {
    /// RFC 6749 Section 5.2 / RFC 6750 Section 3.1 error code
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) | Self::InvalidRedirectUri | Self::BearerTokenMissing => {
                "invalid_request"
            }
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::InvalidToken(_) => "invalid_token",
            Self::UnauthorizedClient(_) => "unauthorized_client",
            Self::UnsupportedGrantType(_) => "unsupported_grant_type",
            Self::UnsupportedResponseType(_) => "unsupported_response_type",
            Self::AuthenticationRequired { .. } => "login_required",
            Self::StorageUnavailable | Self::ServerError(_) => "server_error",
        }
    }

    /// HTTP status code for direct (non-redirected) error responses
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidRequest(_)
            | Self::InvalidRedirectUri
            | Self::InvalidGrant(_)
            | Self::UnauthorizedClient(_)
            | Self::UnsupportedGrantType(_)
            | Self::UnsupportedResponseType(_) => 400,
            Self::InvalidClient
            | Self::InvalidToken(_)
            | Self::BearerTokenMissing
            | Self::AuthenticationRequired { .. } => 401,
            Self::StorageUnavailable | Self::ServerError(_) => 500,
        }
    }

    /// Human-readable `error_description`; storage failures stay generic
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::StorageUnavailable | Self::ServerError(_) => {
                "The authorization server encountered an unexpected condition".to_owned()
            }
            other => other.to_string(),
        }
    }

    /// RFC section describing the error code
    #[must_use]
    pub const fn error_uri(&self) -> Option<&'static str> {
        match self {
            Self::InvalidToken(_) | Self::BearerTokenMissing => {
                Some("https://datatracker.ietf.org/doc/html/rfc6750#section-3.1")
            }
            Self::UnsupportedResponseType(_) | Self::InvalidRedirectUri => {
                Some("https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1")
            }
            Self::InvalidRequest(_)
            | Self::InvalidClient
            | Self::InvalidGrant(_)
            | Self::UnauthorizedClient(_)
            | Self::UnsupportedGrantType(_) => {
                Some("https://datatracker.ietf.org/doc/html/rfc6749#section-5.2")
            }
            Self::AuthenticationRequired { .. } | Self::StorageUnavailable | Self::ServerError(_) => {
                None
            }
        }
    }

    /// Wire body for this error
    #[must_use]
    pub fn to_oauth2_error(&self) -> OAuth2Error {
        OAuth2Error {
            error: self.error_code().to_owned(),
            error_description: Some(self.description()),
            error_uri: self.error_uri().map(str::to_owned),
        }
    }
}

/// OAuth 2.0 error response body (RFC 6749 Section 5.2)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth2Error {
    /// Error code
    pub error: String,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    /// URI with more information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
}

impl From<&GrantError> for OAuth2Error {
    fn from(error: &GrantError) -> Self {
        error.to_oauth2_error()
    }
}
