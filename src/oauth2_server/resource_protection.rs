// ABOUTME: Resource protection filter validating bearer access tokens on protected requests
// ABOUTME: Provides the token lookup, Authorization header parsing and an axum extractor
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use http::header::AUTHORIZATION;
use http::request::Parts;
use oauth2_authority_core::{Expiring, GrantError};

use super::models::TokenPrincipal;
use crate::clock::Clock;
use crate::database::CredentialStore;

/// Validates access tokens presented as bearer credentials
#[derive(Clone)]
pub struct ResourceGuard {
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
}

impl ResourceGuard {
    /// Guard reading tokens from `store` and judging expiry by `clock`
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Resolve a bearer token to the principal it was issued for
    ///
    /// # Errors
    /// - `InvalidToken` if the token is unknown or `expires_at <= now`
    /// - `StorageUnavailable` if the store cannot be read
    #[tracing::instrument(skip_all, fields(user_id = tracing::field::Empty))]
    pub async fn authenticate(&self, bearer_token: &str) -> Result<TokenPrincipal, GrantError> {
        let token = self
            .store
            .get_access_token(bearer_token)
            .await
            .map_err(|e| {
                tracing::error!("Access token lookup failed: {:#}", e);
                GrantError::StorageUnavailable
            })?
            .ok_or_else(|| {
                tracing::debug!("Bearer token not found");
                GrantError::InvalidToken("token is unknown or revoked")
            })?;

        if token.is_expired(self.clock.now()) {
            tracing::debug!("Bearer token expired at {}", token.expires_at);
            return Err(GrantError::InvalidToken("token has expired"));
        }

        tracing::Span::current().record("user_id", token.user_id.as_str());
        Ok(TokenPrincipal {
            user_id: token.user_id,
            scope: token.scope,
            expires_at: token.expires_at,
        })
    }

    /// Parse an `Authorization` header value and authenticate its bearer token
    ///
    /// # Errors
    /// - `BearerTokenMissing` if no header was sent
    /// - `InvalidRequest` if the header is not a `Bearer` credential
    /// - anything `authenticate` returns
    pub async fn authenticate_header(
        &self,
        auth_header: Option<&str>,
    ) -> Result<TokenPrincipal, GrantError> {
        let Some(header) = auth_header else {
            tracing::debug!("Protected request without Authorization header");
            return Err(GrantError::BearerTokenMissing);
        };
        let token = extract_bearer_token(header)?;
        self.authenticate(token).await
    }
}

/// Token part of `Bearer <token>`; the scheme is case-insensitive
///
/// # Errors
/// Returns `InvalidRequest` for other schemes or an empty token
pub fn extract_bearer_token(header: &str) -> Result<&str, GrantError> {
    let (scheme, token) = header
        .trim()
        .split_once(' ')
        .ok_or(GrantError::InvalidRequest("authorization header must be 'Bearer <token>'"))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(GrantError::InvalidRequest(
            "authorization header must be 'Bearer <token>'",
        ));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(GrantError::InvalidRequest("bearer token is empty"));
    }
    Ok(token)
}

/// Extractor that rejects the request unless it carries a valid bearer token
#[derive(Debug, Clone)]
pub struct BearerPrincipal(pub TokenPrincipal);

#[async_trait]
impl<S> FromRequestParts<S> for BearerPrincipal
where
    ResourceGuard: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = GrantError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let guard = ResourceGuard::from_ref(state);
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .map(|v| {
                v.to_str()
                    .map_err(|_| GrantError::InvalidRequest("authorization header is not ASCII"))
            })
            .transpose()?;

        guard.authenticate_header(header).await.map(Self)
    }
}
