// ABOUTME: OAuth 2.0 grant engine implementing authorization, token, refresh and revocation
// ABOUTME: Mints opaque credentials, enforces single-use codes and lazy expiry
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::Arc;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use oauth2_authority_core::{
    AccessToken, AuthorizationCode, Client, Expiring, GrantError, GrantType, RefreshToken,
    StoreError, TokenKind,
};
use tracing::{debug, error, warn};

use super::authentication::{AuthenticationContext, AuthenticationDelegate, AuthenticationOutcome};
use super::client_registry::ClientRegistry;
use super::models::{
    AuthorizationFailure, AuthorizeRequest, AuthorizeResponse, GrantSettings, RevocationOutcome,
    RevocationRequest, TokenRequest, TokenResponse,
};
use super::resource_protection::ResourceGuard;
use crate::clock::{Clock, SystemClock};
use crate::constants::oauth2::{MAX_GENERATION_ATTEMPTS, RESPONSE_TYPE_CODE};
use crate::crypto::{SecureTokenGenerator, TokenGenerator};
use crate::database::{CredentialStore, PurgeReport};
use crate::logging::GrantLogger;

/// OAuth 2.0 Authorization Server
pub struct OAuth2AuthorizationServer {
    registry: ClientRegistry,
    store: Arc<dyn CredentialStore>,
    delegate: Arc<dyn AuthenticationDelegate>,
    clock: Arc<dyn Clock>,
    tokens: Arc<dyn TokenGenerator>,
    settings: GrantSettings,
}

/// Log a store failure and hide its details from the caller
fn storage_failure(operation: &'static str) -> impl FnOnce(StoreError) -> GrantError {
    move |e| {
        error!(operation, "Credential store failure: {:#}", e);
        GrantError::StorageUnavailable
    }
}

/// `now + ttl` at the millisecond precision every store keeps
fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>, GrantError> {
    now.checked_add_signed(ttl)
        .map(|at| at.trunc_subsecs(3))
        .ok_or_else(|| {
            error!(ttl_secs = ttl.num_seconds(), "Credential lifetime overflows the calendar");
            GrantError::ServerError("credential lifetime is out of range")
        })
}

impl OAuth2AuthorizationServer {
    /// Engine using the system clock and the OS random source
    #[must_use]
    pub fn new(
        registry: ClientRegistry,
        store: Arc<dyn CredentialStore>,
        delegate: Arc<dyn AuthenticationDelegate>,
        settings: GrantSettings,
    ) -> Self {
        Self {
            registry,
            store,
            delegate,
            clock: Arc::new(SystemClock),
            tokens: Arc::new(SecureTokenGenerator::new()),
            settings,
        }
    }

    /// Replace the time source
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the credential value source
    #[must_use]
    pub fn with_token_generator(mut self, tokens: Arc<dyn TokenGenerator>) -> Self {
        self.tokens = tokens;
        self
    }

    /// The client registry
    #[must_use]
    pub const fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Resource protection filter sharing this engine's store and clock
    #[must_use]
    pub fn resource_guard(&self) -> ResourceGuard {
        ResourceGuard::new(Arc::clone(&self.store), Arc::clone(&self.clock))
    }

    /// Verify the credential store is reachable
    ///
    /// # Errors
    /// Returns `StorageUnavailable` if the store health check fails
    pub async fn health_check(&self) -> Result<(), GrantError> {
        self.store
            .health_check()
            .await
            .map_err(storage_failure("health check"))
    }

    /// Handle an authorization request (GET /oauth2/authorize)
    ///
    /// Client and redirect URI are validated before anything else, so errors
    /// found afterwards can safely be redirected back to the client.
    ///
    /// # Errors
    /// Returns an `AuthorizationFailure` whose redirect target is set only once
    /// the redirect URI has been validated
    #[tracing::instrument(skip_all, fields(client_id = ?request.client_id))]
    pub async fn authorize(
        &self,
        request: AuthorizeRequest,
        context: &AuthenticationContext,
    ) -> Result<AuthorizeResponse, AuthorizationFailure> {
        let client_id = request
            .client_id
            .as_deref()
            .ok_or(GrantError::InvalidRequest("client_id is required"))?;
        let client = self.registry.lookup(client_id)?;

        let redirect_uri = request
            .redirect_uri
            .as_deref()
            .ok_or(GrantError::InvalidRequest("redirect_uri is required"))?;
        if !self.registry.redirect_uri_registered(redirect_uri) {
            GrantLogger::log_security_event(
                "redirect_uri_mismatch",
                &client.id,
                "authorization request with unregistered redirect_uri",
            );
            return Err(GrantError::InvalidRedirectUri.into());
        }

        let redirect_to = |error: GrantError| {
            AuthorizationFailure::redirected(error, redirect_uri.to_owned(), request.state.clone())
        };

        match request.response_type.as_deref() {
            Some(RESPONSE_TYPE_CODE) => {}
            Some(other) => {
                return Err(redirect_to(GrantError::UnsupportedResponseType(
                    other.to_owned(),
                )))
            }
            None => {
                return Err(redirect_to(GrantError::InvalidRequest(
                    "response_type is required",
                )))
            }
        }
        if !self.registry.allows_grant(GrantType::AuthorizationCode) {
            return Err(redirect_to(GrantError::UnauthorizedClient(
                GrantType::AuthorizationCode.as_str(),
            )));
        }

        let user = match self
            .delegate
            .authenticate(context)
            .await
            .map_err(&redirect_to)?
        {
            AuthenticationOutcome::Authenticated(user) => user,
            AuthenticationOutcome::RequiresInteractiveLogin { resume_url } => {
                debug!("Authorization deferred until the user logs in");
                return Err(AuthorizationFailure::direct(
                    GrantError::AuthenticationRequired { resume_url },
                ));
            }
        };

        let code = self
            .issue_authorization_code(
                redirect_uri,
                request.scope.clone().filter(|s| !s.is_empty()),
                &user.id,
            )
            .await
            .map_err(&redirect_to)?;

        GrantLogger::log_grant_event(&client.id, &user.id, "authorization_code_issued");
        Ok(AuthorizeResponse {
            code: code.code,
            state: request.state,
            redirect_uri: redirect_uri.to_owned(),
        })
    }

    /// Handle a token request (POST /oauth2/token)
    ///
    /// # Errors
    /// - `InvalidClient` if client authentication fails
    /// - `InvalidRequest` if `grant_type` or a grant parameter is missing
    /// - `UnsupportedGrantType` / `UnauthorizedClient` for grants that cannot be used
    /// - `InvalidGrant` for unknown, expired, consumed or mismatched grants
    /// - `StorageUnavailable` if the store fails
    #[tracing::instrument(skip_all, fields(client_id = ?request.client_id, grant_type = ?request.grant_type))]
    pub async fn token(&self, request: TokenRequest) -> Result<TokenResponse, GrantError> {
        let client_id = request
            .client_id
            .as_deref()
            .ok_or(GrantError::InvalidClient)?;
        let client = self
            .registry
            .resolve(client_id, request.client_secret.as_deref())
            .inspect_err(|_| {
                GrantLogger::log_security_event(
                    "client_authentication_failed",
                    client_id,
                    "token request with invalid client credentials",
                );
            })?;

        let grant_type: GrantType = request
            .grant_type
            .as_deref()
            .ok_or(GrantError::InvalidRequest("grant_type is required"))?
            .parse()?;
        if !self.registry.allows_grant(grant_type) {
            return Err(GrantError::UnauthorizedClient(grant_type.as_str()));
        }

        match grant_type {
            GrantType::AuthorizationCode => self.exchange_authorization_code(client, &request).await,
            GrantType::RefreshToken => self.refresh_access_token(client, &request).await,
        }
    }

    /// Exchange an authorization code for an access/refresh token pair
    async fn exchange_authorization_code(
        &self,
        client: &Client,
        request: &TokenRequest,
    ) -> Result<TokenResponse, GrantError> {
        let code_value = request
            .code
            .as_deref()
            .ok_or(GrantError::InvalidRequest("code is required"))?;
        let redirect_uri = request
            .redirect_uri
            .as_deref()
            .ok_or(GrantError::InvalidRequest("redirect_uri is required"))?;
        let now = self.clock.now();

        let code = self
            .store
            .get_authorization_code(code_value)
            .await
            .map_err(storage_failure("get authorization code"))?
            .ok_or(GrantError::InvalidGrant("authorization code is invalid"))?;

        if code.is_expired(now) {
            if let Err(e) = self.store.delete_authorization_code(code_value).await {
                warn!("Failed to delete expired authorization code: {:#}", e);
            }
            return Err(GrantError::InvalidGrant("authorization code has expired"));
        }

        if code.redirect_uri != redirect_uri {
            GrantLogger::log_security_event(
                "redirect_uri_mismatch",
                &client.id,
                "token request redirect_uri differs from authorization request",
            );
            return Err(GrantError::InvalidGrant(
                "redirect_uri does not match the authorization request",
            ));
        }

        for attempt in 1..=MAX_GENERATION_ATTEMPTS {
            let (access_token, refresh_token) =
                self.mint_token_pair(client, &code.user_id, code.scope.as_ref(), now)?;

            match self
                .store
                .redeem_authorization_code(code_value, &access_token, &refresh_token)
                .await
            {
                Ok(true) => {
                    GrantLogger::log_grant_event(&client.id, &code.user_id, "code_exchanged");
                    return Ok(Self::token_response(client, access_token, refresh_token));
                }
                Ok(false) => {
                    GrantLogger::log_security_event(
                        "authorization_code_replay",
                        &client.id,
                        "authorization code was already redeemed",
                    );
                    return Err(GrantError::InvalidGrant(
                        "authorization code has already been used",
                    ));
                }
                Err(e) if e.is_duplicate() => {
                    warn!(attempt, "Minted token collided with a stored value, regenerating");
                }
                Err(e) => return Err(storage_failure("redeem authorization code")(e)),
            }
        }

        error!("Exhausted attempts to mint a unique token pair");
        Err(GrantError::StorageUnavailable)
    }

    /// Mint a new access token from a refresh token
    async fn refresh_access_token(
        &self,
        client: &Client,
        request: &TokenRequest,
    ) -> Result<TokenResponse, GrantError> {
        let refresh_value = request
            .refresh_token
            .as_deref()
            .ok_or(GrantError::InvalidRequest("refresh_token is required"))?;
        let now = self.clock.now();

        let refresh_token = self
            .store
            .get_refresh_token(refresh_value)
            .await
            .map_err(storage_failure("get refresh token"))?
            .ok_or(GrantError::InvalidGrant("refresh token is invalid"))?;

        if refresh_token.is_expired(now) {
            if let Err(e) = self.store.delete_refresh_token(refresh_value).await {
                warn!("Failed to delete expired refresh token: {:#}", e);
            }
            return Err(GrantError::InvalidGrant("refresh token has expired"));
        }

        if self.settings.rotate_refresh_tokens {
            return self.rotate_refresh_token(client, &refresh_token, now).await;
        }

        for attempt in 1..=MAX_GENERATION_ATTEMPTS {
            let access_token = self.mint_access_token(
                client,
                &refresh_token.user_id,
                refresh_token.scope.as_ref(),
                now,
            )?;

            match self.store.store_access_token(&access_token).await {
                Ok(()) => {
                    GrantLogger::log_grant_event(
                        &client.id,
                        &refresh_token.user_id,
                        "access_token_refreshed",
                    );
                    return Ok(Self::token_response(client, access_token, refresh_token));
                }
                Err(e) if e.is_duplicate() => {
                    warn!(attempt, "Minted access token collided with a stored value, regenerating");
                }
                Err(e) => return Err(storage_failure("store access token")(e)),
            }
        }

        error!("Exhausted attempts to mint a unique access token");
        Err(GrantError::StorageUnavailable)
    }

    /// Retire `current` and issue a fresh access/refresh pair in its place
    async fn rotate_refresh_token(
        &self,
        client: &Client,
        current: &RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<TokenResponse, GrantError> {
        for attempt in 1..=MAX_GENERATION_ATTEMPTS {
            let (access_token, refresh_token) =
                self.mint_token_pair(client, &current.user_id, current.scope.as_ref(), now)?;

            match self
                .store
                .rotate_refresh_token(&current.token, &access_token, &refresh_token)
                .await
            {
                Ok(true) => {
                    GrantLogger::log_grant_event(&client.id, &current.user_id, "refresh_token_rotated");
                    return Ok(Self::token_response(client, access_token, refresh_token));
                }
                Ok(false) => {
                    GrantLogger::log_security_event(
                        "refresh_token_replay",
                        &client.id,
                        "rotated refresh token was presented again",
                    );
                    return Err(GrantError::InvalidGrant("refresh token has already been used"));
                }
                Err(e) if e.is_duplicate() => {
                    warn!(attempt, "Minted token collided with a stored value, regenerating");
                }
                Err(e) => return Err(storage_failure("rotate refresh token")(e)),
            }
        }

        error!("Exhausted attempts to mint a unique token pair");
        Err(GrantError::StorageUnavailable)
    }

    /// Handle a revocation request (POST /oauth2/revoke)
    ///
    /// Revoking a value that does not exist is not an error. Client
    /// credentials are optional, but must be valid when presented.
    ///
    /// # Errors
    /// - `InvalidClient` if presented client credentials are wrong
    /// - `InvalidRequest` if no token was supplied
    /// - `StorageUnavailable` if the store fails
    #[tracing::instrument(skip_all, fields(client_id = ?request.client_id, hint = ?request.token_type_hint))]
    pub async fn revoke(
        &self,
        request: &RevocationRequest,
    ) -> Result<RevocationOutcome, GrantError> {
        if let Some(client_id) = request.client_id.as_deref() {
            self.registry
                .resolve(client_id, request.client_secret.as_deref())?;
        }

        let token = request
            .token_value()
            .ok_or(GrantError::InvalidRequest("token is required"))?;

        let order = match request.hint() {
            Some(TokenKind::AccessToken) => [TokenKind::AccessToken, TokenKind::RefreshToken],
            _ => [TokenKind::RefreshToken, TokenKind::AccessToken],
        };

        for kind in order {
            let deleted = match kind {
                TokenKind::RefreshToken => self
                    .store
                    .delete_refresh_token(token)
                    .await
                    .map_err(storage_failure("delete refresh token"))?,
                TokenKind::AccessToken => self
                    .store
                    .delete_access_token(token)
                    .await
                    .map_err(storage_failure("delete access token"))?,
            };
            if deleted {
                debug!(kind = kind.as_str(), "Revoked credential");
                return Ok(RevocationOutcome::Revoked(kind));
            }
        }

        debug!("Revocation target not found");
        Ok(RevocationOutcome::NotFound)
    }

    /// Delete every expired code and token
    ///
    /// # Errors
    /// Returns `StorageUnavailable` if the store fails
    pub async fn purge_expired(&self) -> Result<PurgeReport, GrantError> {
        let report = self
            .store
            .purge_expired(self.clock.now())
            .await
            .map_err(storage_failure("purge expired credentials"))?;
        if report.total() > 0 {
            tracing::info!(
                authorization_codes = report.authorization_codes,
                access_tokens = report.access_tokens,
                refresh_tokens = report.refresh_tokens,
                "Purged expired credentials"
            );
        }
        Ok(report)
    }

    /// Generate, persist and return a new authorization code
    async fn issue_authorization_code(
        &self,
        redirect_uri: &str,
        scope: Option<String>,
        user_id: &str,
    ) -> Result<AuthorizationCode, GrantError> {
        let expires_at = expiry_after(self.clock.now(), self.settings.authorization_code_ttl)?;

        for attempt in 1..=MAX_GENERATION_ATTEMPTS {
            let code = AuthorizationCode {
                code: self.tokens.generate()?,
                expires_at,
                redirect_uri: redirect_uri.to_owned(),
                scope: scope.clone(),
                user_id: user_id.to_owned(),
            };

            match self.store.store_authorization_code(&code).await {
                Ok(()) => return Ok(code),
                Err(e) if e.is_duplicate() => {
                    warn!(attempt, "Authorization code collided with a stored value, regenerating");
                }
                Err(e) => return Err(storage_failure("store authorization code")(e)),
            }
        }

        error!("Exhausted attempts to mint a unique authorization code");
        Err(GrantError::StorageUnavailable)
    }

    fn mint_access_token(
        &self,
        client: &Client,
        user_id: &str,
        scope: Option<&String>,
        now: DateTime<Utc>,
    ) -> Result<AccessToken, GrantError> {
        Ok(AccessToken {
            token: self.tokens.generate()?,
            expires_at: expiry_after(now, client.access_token_ttl)?,
            scope: scope.cloned(),
            user_id: user_id.to_owned(),
        })
    }

    fn mint_token_pair(
        &self,
        client: &Client,
        user_id: &str,
        scope: Option<&String>,
        now: DateTime<Utc>,
    ) -> Result<(AccessToken, RefreshToken), GrantError> {
        let access_token = self.mint_access_token(client, user_id, scope, now)?;
        let refresh_token = RefreshToken {
            token: self.tokens.generate()?,
            expires_at: expiry_after(now, client.refresh_token_ttl)?,
            scope: scope.cloned(),
            user_id: user_id.to_owned(),
        };
        Ok((access_token, refresh_token))
    }

    fn token_response(
        client: &Client,
        access_token: AccessToken,
        refresh_token: RefreshToken,
    ) -> TokenResponse {
        TokenResponse::bearer(
            access_token.token,
            client.access_token_ttl.num_seconds(),
            refresh_token.token,
            access_token.scope,
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_expiry_truncated_to_milliseconds() {
        let now = Utc
            .timestamp_opt(1_735_732_800, 123_456_789)
            .single()
            .unwrap();
        let expires_at = expiry_after(now, Duration::seconds(3600)).unwrap();

        assert_eq!(expires_at.timestamp(), 1_735_736_400);
        assert_eq!(expires_at.timestamp_subsec_nanos(), 123_000_000);
        assert_eq!(
            expires_at.timestamp_millis(),
            (now + Duration::seconds(3600)).timestamp_millis()
        );
    }

    #[test]
    fn test_expiry_overflow_is_server_error() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        assert!(matches!(
            expiry_after(now, Duration::MAX),
            Err(GrantError::ServerError(_))
        ));
        assert!(matches!(
            expiry_after(DateTime::<Utc>::MAX_UTC, Duration::seconds(1)),
            Err(GrantError::ServerError(_))
        ));
    }
}
