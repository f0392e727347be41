// ABOUTME: Environment-based configuration for the authorization server
// ABOUTME: Parses client registration, token lifetimes, storage and delegate settings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::env;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use chrono::Duration;
use oauth2_authority_core::{Client, GrantType};
use tracing::info;
use url::Url;

use crate::constants::{auth, lifetimes, maintenance, network};
use crate::crypto::secret_fingerprint;
use crate::errors::{AppError, AppResult};
use crate::oauth2_server::GrantSettings;

/// Registration of the single OAuth 2.0 client
#[derive(Clone)]
pub struct ClientConfig {
    /// `CLIENT_ID`
    pub client_id: String,
    /// `CLIENT_SECRET`; absent for a public client
    pub client_secret: Option<String>,
    /// `REDIRECT_URI`, comma-separated
    pub redirect_uris: Vec<String>,
    /// `ACCESS_TOKEN_TTL_SECS`
    pub access_token_ttl_secs: i64,
    /// `REFRESH_TOKEN_TTL_SECS`
    pub refresh_token_ttl_secs: i64,
    /// `CLIENT_GRANTS`, comma-separated
    pub grants: Vec<GrantType>,
}

impl ClientConfig {
    /// Client record served by the registry
    #[must_use]
    pub fn to_client(&self) -> Client {
        Client {
            id: self.client_id.clone(),
            secret: self.client_secret.clone(),
            allowed_redirect_uris: self.redirect_uris.clone(),
            access_token_ttl: Duration::seconds(self.access_token_ttl_secs),
            refresh_token_ttl: Duration::seconds(self.refresh_token_ttl_secs),
            allowed_grants: self.grants.clone(),
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_deref().map(secret_fingerprint),
            )
            .field("redirect_uris", &self.redirect_uris)
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("refresh_token_ttl_secs", &self.refresh_token_ttl_secs)
            .field("grants", &self.grants)
            .finish()
    }
}

/// Grant engine behaviour
#[derive(Debug, Clone, Copy)]
pub struct GrantConfig {
    /// `AUTHORIZATION_CODE_TTL_SECS`
    pub authorization_code_ttl_secs: i64,
    /// `OAUTH2_ROTATE_REFRESH_TOKENS`
    pub rotate_refresh_tokens: bool,
}

/// Authentication delegate settings
#[derive(Debug, Clone)]
pub struct AuthDelegateConfig {
    /// `OAUTH2_LOGIN_URL`
    pub login_url: String,
    /// `AUTH_USER_HEADER`
    pub user_header: String,
    /// `AUTH_EMAIL_HEADER`
    pub email_header: String,
}

/// Complete server configuration, built once and passed explicitly
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `HTTP_PORT`
    pub http_port: u16,
    /// `DATABASE_URL`
    pub database_url: String,
    /// `OAUTH2_ISSUER_URL`
    pub issuer_url: String,
    /// Client registration
    pub client: ClientConfig,
    /// Grant engine behaviour
    pub grants: GrantConfig,
    /// Authentication delegate
    pub auth: AuthDelegateConfig,
    /// `OAUTH2_PURGE_INTERVAL_SECS`; `None` disables the purge task
    pub purge_interval: Option<StdDuration>,
}

impl ServerConfig {
    /// Load configuration from process environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value is invalid
    pub fn from_env() -> AppResult<Self> {
        info!("Loading configuration from environment variables");
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value is invalid
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let http_port = parse_or(var("HTTP_PORT"), "HTTP_PORT", network::DEFAULT_HTTP_PORT)?;
        let database_url =
            var("DATABASE_URL").unwrap_or_else(|| network::DEFAULT_DATABASE_URL.to_owned());
        let issuer_url = var("OAUTH2_ISSUER_URL")
            .unwrap_or_else(|| format!("http://localhost:{http_port}"))
            .trim_end_matches('/')
            .to_owned();
        Url::parse(&issuer_url)
            .map_err(|e| AppError::config(format!("OAUTH2_ISSUER_URL is not a URL: {e}")))?;

        let client = ClientConfig {
            client_id: var("CLIENT_ID").ok_or_else(|| AppError::config_missing("CLIENT_ID"))?,
            client_secret: var("CLIENT_SECRET"),
            redirect_uris: parse_redirect_uris(
                &var("REDIRECT_URI").ok_or_else(|| AppError::config_missing("REDIRECT_URI"))?,
            )?,
            access_token_ttl_secs: parse_lifetime(
                var("ACCESS_TOKEN_TTL_SECS"),
                "ACCESS_TOKEN_TTL_SECS",
                lifetimes::DEFAULT_ACCESS_TOKEN_TTL_SECS,
                lifetimes::MAX_TOKEN_TTL_SECS,
            )?,
            refresh_token_ttl_secs: parse_lifetime(
                var("REFRESH_TOKEN_TTL_SECS"),
                "REFRESH_TOKEN_TTL_SECS",
                lifetimes::DEFAULT_REFRESH_TOKEN_TTL_SECS,
                lifetimes::MAX_TOKEN_TTL_SECS,
            )?,
            grants: var("CLIENT_GRANTS").map_or_else(
                || Ok(vec![GrantType::AuthorizationCode, GrantType::RefreshToken]),
                |v| parse_grants(&v),
            )?,
        };

        let authorization_code_ttl_secs = parse_lifetime(
            var("AUTHORIZATION_CODE_TTL_SECS"),
            "AUTHORIZATION_CODE_TTL_SECS",
            lifetimes::DEFAULT_AUTHORIZATION_CODE_TTL_SECS,
            lifetimes::MAX_AUTHORIZATION_CODE_TTL_SECS,
        )?;

        let grants = GrantConfig {
            authorization_code_ttl_secs,
            rotate_refresh_tokens: parse_bool(
                var("OAUTH2_ROTATE_REFRESH_TOKENS"),
                "OAUTH2_ROTATE_REFRESH_TOKENS",
            )?,
        };

        let auth = AuthDelegateConfig {
            login_url: var("OAUTH2_LOGIN_URL").unwrap_or_else(|| auth::DEFAULT_LOGIN_URL.to_owned()),
            user_header: var("AUTH_USER_HEADER")
                .unwrap_or_else(|| auth::DEFAULT_USER_HEADER.to_owned())
                .to_lowercase(),
            email_header: var("AUTH_EMAIL_HEADER")
                .unwrap_or_else(|| auth::DEFAULT_EMAIL_HEADER.to_owned())
                .to_lowercase(),
        };

        let purge_secs: u64 = parse_or(
            var("OAUTH2_PURGE_INTERVAL_SECS"),
            "OAUTH2_PURGE_INTERVAL_SECS",
            maintenance::DEFAULT_PURGE_INTERVAL_SECS,
        )?;

        Ok(Self {
            http_port,
            database_url,
            issuer_url,
            client,
            grants,
            auth,
            purge_interval: (purge_secs > 0).then(|| StdDuration::from_secs(purge_secs)),
        })
    }

    /// Settings handed to the grant engine
    #[must_use]
    pub fn grant_settings(&self) -> GrantSettings {
        GrantSettings {
            authorization_code_ttl: Duration::seconds(self.grants.authorization_code_ttl_secs),
            rotate_refresh_tokens: self.grants.rotate_refresh_tokens,
        }
    }

    /// Log-safe description of the configuration
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "OAuth2 Authority Configuration:\n\
             - HTTP Port: {}\n\
             - Database: {}\n\
             - Issuer: {}\n\
             - Client ID: {}\n\
             - Client Secret: {}\n\
             - Redirect URIs: {}\n\
             - Grants: {}\n\
             - Token Lifetimes: code={}s access={}s refresh={}s\n\
             - Refresh Rotation: {}\n\
             - Login URL: {}\n\
             - Purge Interval: {}",
            self.http_port,
            self.database_url,
            self.issuer_url,
            self.client.client_id,
            self.client
                .client_secret
                .as_deref()
                .map_or_else(|| "none (public client)".to_owned(), |s| {
                    format!("sha256:{}", secret_fingerprint(s))
                }),
            self.client.redirect_uris.join(", "),
            self.client
                .grants
                .iter()
                .map(|g| g.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            self.grants.authorization_code_ttl_secs,
            self.client.access_token_ttl_secs,
            self.client.refresh_token_ttl_secs,
            if self.grants.rotate_refresh_tokens {
                "enabled"
            } else {
                "disabled"
            },
            self.auth.login_url,
            self.purge_interval
                .map_or_else(|| "disabled".to_owned(), |d| format!("{}s", d.as_secs())),
        )
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> AppResult<T> {
    value.map_or(Ok(default), |v| {
        v.trim()
            .parse()
            .map_err(|_| AppError::config(format!("{key} has an invalid value: {v}")))
    })
}

/// Lifetime in seconds within `1..=max`
fn parse_lifetime(value: Option<String>, key: &str, default: i64, max: i64) -> AppResult<i64> {
    let parsed = parse_or(value, key, default)?;
    if parsed <= 0 {
        return Err(AppError::config(format!("{key} must be greater than zero")));
    }
    if parsed > max {
        return Err(AppError::config(format!("{key} must not exceed {max}")));
    }
    Ok(parsed)
}

fn parse_bool(value: Option<String>, key: &str) -> AppResult<bool> {
    match value.as_deref().map(str::trim) {
        None => Ok(false),
        Some("true" | "1" | "yes" | "on") => Ok(true),
        Some("false" | "0" | "no" | "off") => Ok(false),
        Some(other) => Err(AppError::config(format!(
            "{key} must be true or false, got {other}"
        ))),
    }
}

/// Parse comma-separated redirect URIs; each must be an absolute URL
fn parse_redirect_uris(raw: &str) -> AppResult<Vec<String>> {
    let uris: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect();

    if uris.is_empty() {
        return Err(AppError::config_missing("REDIRECT_URI"));
    }
    for uri in &uris {
        Url::parse(uri).map_err(|e| {
            AppError::config(format!("REDIRECT_URI entry {uri} is not an absolute URL: {e}"))
        })?;
    }
    Ok(uris)
}

/// Parse comma-separated grant type names
fn parse_grants(raw: &str) -> AppResult<Vec<GrantType>> {
    let grants = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<GrantType>()
                .map_err(|_| AppError::config(format!("CLIENT_GRANTS contains unknown grant {s}")))
        })
        .collect::<AppResult<Vec<_>>>()?;

    if grants.is_empty() {
        return Err(AppError::config("CLIENT_GRANTS must name at least one grant"));
    }
    Ok(grants)
}
