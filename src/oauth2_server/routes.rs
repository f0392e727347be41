// ABOUTME: OAuth 2.0 HTTP route handlers for the axum web framework
// ABOUTME: Exposes authorize, token, revoke, userinfo, discovery and health endpoints
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! OAuth 2.0 routes
//!
//! Thin HTTP adapter over [`OAuth2AuthorizationServer`]. Request bodies on the
//! token and revocation endpoints may be form-encoded or JSON, and client
//! credentials may arrive in the body or through HTTP Basic authentication.

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, FromRef, FromRequest, Query, Request, State},
    http::{
        header::{AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE, LOCATION, PRAGMA},
        HeaderMap, HeaderValue, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use oauth2_authority_core::GrantError;
use serde::de::DeserializeOwned;
use tower_http::trace::TraceLayer;
use tracing::debug;

use super::authentication::AuthenticationContext;
use super::endpoints::OAuth2AuthorizationServer;
use super::models::{
    AuthorizationFailure, AuthorizeRequest, RevocationRequest, TokenRequest, TokenResponse,
};
use super::resource_protection::{BearerPrincipal, ResourceGuard};
use crate::constants::{oauth2, routes};

/// Shared state of the OAuth 2.0 router
#[derive(Clone)]
pub struct OAuth2State {
    /// Grant engine
    pub server: Arc<OAuth2AuthorizationServer>,
    /// Bearer token filter for protected routes
    pub guard: ResourceGuard,
    /// Issuer advertised in discovery metadata, without trailing slash
    pub issuer_url: Arc<str>,
}

impl OAuth2State {
    /// State serving `server` under `issuer_url`
    #[must_use]
    pub fn new(server: Arc<OAuth2AuthorizationServer>, issuer_url: &str) -> Self {
        let guard = server.resource_guard();
        Self {
            server,
            guard,
            issuer_url: Arc::from(issuer_url.trim_end_matches('/')),
        }
    }
}

impl FromRef<OAuth2State> for ResourceGuard {
    fn from_ref(state: &OAuth2State) -> Self {
        state.guard.clone()
    }
}

/// OAuth 2.0 routes implementation
pub struct OAuth2Routes;

impl OAuth2Routes {
    /// Create all OAuth 2.0 routes
    pub fn routes(state: OAuth2State) -> Router {
        Router::new()
            .route(routes::AUTHORIZE, get(Self::handle_authorize))
            .route(routes::TOKEN, post(Self::handle_token))
            .route(routes::REVOKE, post(Self::handle_revoke))
            .route(routes::USERINFO, get(Self::handle_userinfo))
            .route(routes::DISCOVERY, get(Self::handle_discovery))
            .route(routes::HEALTH, get(Self::handle_health))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// GET /oauth2/authorize
    async fn handle_authorize(
        State(state): State<OAuth2State>,
        uri: Uri,
        headers: HeaderMap,
        query: Result<Query<AuthorizeRequest>, QueryRejection>,
    ) -> Result<Response, AuthorizationFailure> {
        let Query(request) = query.map_err(|e| {
            debug!("Rejected authorization query: {}", e);
            GrantError::InvalidRequest("malformed authorization request")
        })?;

        let original_uri = uri
            .path_and_query()
            .map_or_else(|| uri.path().to_owned(), ToString::to_string);
        let context = AuthenticationContext::new(headers, original_uri);

        let response = state.server.authorize(request, &context).await?;
        let location = response.redirect_location()?;
        Ok(found(&location))
    }

    /// POST /oauth2/token
    async fn handle_token(State(state): State<OAuth2State>, request: Request) -> Response {
        match Self::issue_token(&state, request).await {
            Ok(token_response) => {
                let mut response = Json(token_response).into_response();
                let headers = response.headers_mut();
                headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
                headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
                response
            }
            Err(e) => e.into_response(),
        }
    }

    async fn issue_token(state: &OAuth2State, request: Request) -> Result<TokenResponse, GrantError> {
        let basic = basic_credentials(request.headers())?;
        let mut token_request: TokenRequest = parse_body(request).await?;
        let (client_id, client_secret) = merge_client_credentials(
            basic,
            token_request.client_id.take(),
            token_request.client_secret.take(),
        )?;
        token_request.client_id = client_id;
        token_request.client_secret = client_secret;
        state.server.token(token_request).await
    }

    /// POST /oauth2/revoke
    async fn handle_revoke(
        State(state): State<OAuth2State>,
        request: Request,
    ) -> Result<StatusCode, GrantError> {
        let basic = basic_credentials(request.headers())?;
        let mut revocation: RevocationRequest = parse_body(request).await?;
        let (client_id, client_secret) = merge_client_credentials(
            basic,
            revocation.client_id.take(),
            revocation.client_secret.take(),
        )?;
        revocation.client_id = client_id;
        revocation.client_secret = client_secret;

        state.server.revoke(&revocation).await?;
        Ok(StatusCode::OK)
    }

    /// GET /oauth2/userinfo
    async fn handle_userinfo(BearerPrincipal(principal): BearerPrincipal) -> Json<serde_json::Value> {
        Json(serde_json::json!({
            "user_id": principal.user_id,
            "scope": principal.scope,
        }))
    }

    /// GET /.well-known/oauth-authorization-server (RFC 8414)
    async fn handle_discovery(State(state): State<OAuth2State>) -> Json<serde_json::Value> {
        let issuer = &state.issuer_url;
        let grant_types: Vec<&str> = state
            .server
            .registry()
            .client()
            .allowed_grants
            .iter()
            .map(|grant| grant.as_str())
            .collect();

        Json(serde_json::json!({
            "issuer": issuer.as_ref(),
            "authorization_endpoint": format!("{issuer}{}", routes::AUTHORIZE),
            "token_endpoint": format!("{issuer}{}", routes::TOKEN),
            "revocation_endpoint": format!("{issuer}{}", routes::REVOKE),
            "response_types_supported": [oauth2::RESPONSE_TYPE_CODE],
            "grant_types_supported": grant_types,
            "token_endpoint_auth_methods_supported": oauth2::TOKEN_ENDPOINT_AUTH_METHODS,
            "revocation_endpoint_auth_methods_supported": oauth2::TOKEN_ENDPOINT_AUTH_METHODS,
        }))
    }

    /// GET /health
    async fn handle_health(State(state): State<OAuth2State>) -> (StatusCode, Json<serde_json::Value>) {
        let (status, label) = match state.server.health_check().await {
            Ok(()) => (StatusCode::OK, "healthy"),
            Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
        };
        (
            status,
            Json(serde_json::json!({
                "status": label,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            })),
        )
    }
}

impl IntoResponse for AuthorizationFailure {
    fn into_response(self) -> Response {
        match self.redirect_location() {
            Some(location) => found(&location),
            // Browser-facing endpoint: no client authentication challenge
            None if self.error == GrantError::InvalidClient => {
                let mut response =
                    (StatusCode::BAD_REQUEST, Json(self.error.to_oauth2_error())).into_response();
                response
                    .headers_mut()
                    .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
                response
            }
            None => self.error.into_response(),
        }
    }
}

/// 302 Found to `location`
fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(LOCATION, value)]).into_response(),
        Err(_) => GrantError::ServerError("redirect location is not a valid header value")
            .into_response(),
    }
}

/// Decode a form or JSON body depending on the content type
async fn parse_body<T>(request: Request) -> Result<T, GrantError>
where
    T: DeserializeOwned + Send,
{
    let is_json = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.trim_start().starts_with("application/json"));

    if is_json {
        Json::<T>::from_request(request, &())
            .await
            .map(|Json(body)| body)
            .map_err(|e| {
                debug!("Rejected JSON body: {}", e);
                GrantError::InvalidRequest("malformed JSON body")
            })
    } else {
        Form::<T>::from_request(request, &())
            .await
            .map(|Form(body)| body)
            .map_err(|e| {
                debug!("Rejected form body: {}", e);
                GrantError::InvalidRequest("malformed form body")
            })
    }
}

/// Client credentials from an `Authorization: Basic` header (RFC 6749 section 2.3.1)
///
/// Other schemes are ignored. A malformed Basic credential fails client authentication.
fn basic_credentials(headers: &HeaderMap) -> Result<Option<(String, String)>, GrantError> {
    let Some(header) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let header = header.to_str().map_err(|_| GrantError::InvalidClient)?.trim();
    let Some((scheme, encoded)) = header.split_once(' ') else {
        return Ok(None);
    };
    if !scheme.eq_ignore_ascii_case("basic") {
        return Ok(None);
    }

    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|_| GrantError::InvalidClient)?;
    let decoded = String::from_utf8(decoded).map_err(|_| GrantError::InvalidClient)?;
    let (id, secret) = decoded.split_once(':').ok_or(GrantError::InvalidClient)?;

    let id = urlencoding::decode(id).map_err(|_| GrantError::InvalidClient)?;
    let secret = urlencoding::decode(secret).map_err(|_| GrantError::InvalidClient)?;
    Ok(Some((id.into_owned(), secret.into_owned())))
}

/// Combine Basic credentials with body credentials
///
/// A client must use a single authentication method per request.
fn merge_client_credentials(
    basic: Option<(String, String)>,
    body_id: Option<String>,
    body_secret: Option<String>,
) -> Result<(Option<String>, Option<String>), GrantError> {
    let Some((basic_id, basic_secret)) = basic else {
        return Ok((body_id, body_secret));
    };
    if body_secret.is_some() {
        return Err(GrantError::InvalidRequest(
            "client credentials supplied by more than one method",
        ));
    }
    if body_id.as_deref().is_some_and(|id| id != basic_id) {
        return Err(GrantError::InvalidClient);
    }
    let secret = (!basic_secret.is_empty()).then_some(basic_secret);
    Ok((Some(basic_id), secret))
}
