// ABOUTME: Authentication delegate boundary between the grant engine and the identity provider
// ABOUTME: Resolves the end user for an authorization request or asks for an interactive login
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use async_trait::async_trait;
use http::header::HeaderName;
use http::HeaderMap;
use oauth2_authority_core::{GrantError, User};

use crate::constants::auth::RESUME_PARAM;
use crate::errors::{AppError, AppResult};

/// What the delegate can see of the authorization request
#[derive(Debug, Clone, Default)]
pub struct AuthenticationContext {
    /// Request headers, including any session cookie or proxy identity headers
    pub headers: HeaderMap,
    /// Path and query of the original authorization request
    pub original_uri: String,
}

impl AuthenticationContext {
    /// Context for a request
    #[must_use]
    pub fn new(headers: HeaderMap, original_uri: impl Into<String>) -> Self {
        Self {
            headers,
            original_uri: original_uri.into(),
        }
    }
}

/// Result of asking the delegate who the end user is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationOutcome {
    /// The end user is known
    Authenticated(User),
    /// The user agent must log in at `resume_url`, then retry the original request
    RequiresInteractiveLogin {
        /// Login location that returns to the original request afterwards
        resume_url: String,
    },
}

/// Decides whether an authorization request has an authenticated end user
#[async_trait]
pub trait AuthenticationDelegate: Send + Sync {
    /// Authenticate the end user behind `context`
    async fn authenticate(
        &self,
        context: &AuthenticationContext,
    ) -> Result<AuthenticationOutcome, GrantError>;
}

/// Opaque upstream identity source
#[async_trait]
pub trait SessionSupplier: Send + Sync {
    /// The user owning the current session, if any
    async fn current_user(&self, headers: &HeaderMap) -> Result<Option<User>, GrantError>;
}

/// Trusts identity headers injected by an authenticating reverse proxy
///
/// Anyone who can reach the server directly can set these headers. Deploy it
/// only behind a proxy that strips them from incoming requests.
#[derive(Debug, Clone)]
pub struct ForwardedUserSupplier {
    user_header: HeaderName,
    email_header: HeaderName,
}

impl ForwardedUserSupplier {
    /// Supplier reading `user_header` and, optionally, `email_header`
    ///
    /// # Errors
    /// Returns a configuration error if either name is not a valid header name
    pub fn new(user_header: &str, email_header: &str) -> AppResult<Self> {
        let parse = |name: &str| {
            HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| AppError::config(format!("Invalid header name {name}: {e}")))
        };
        Ok(Self {
            user_header: parse(user_header)?,
            email_header: parse(email_header)?,
        })
    }
}

#[async_trait]
impl SessionSupplier for ForwardedUserSupplier {
    async fn current_user(&self, headers: &HeaderMap) -> Result<Option<User>, GrantError> {
        let header_value = |name: &HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
        };

        Ok(header_value(&self.user_header).map(|id| User {
            id,
            email: header_value(&self.email_header),
        }))
    }
}

/// Delegate that sends unauthenticated users to a login page
///
/// The login page receives the original authorization request in the
/// `next` query parameter and sends the user agent back to it afterwards.
pub struct LoginRedirectDelegate<S> {
    supplier: S,
    login_url: String,
}

impl<S: SessionSupplier> LoginRedirectDelegate<S> {
    /// Delegate asking `supplier` for the user and redirecting to `login_url` otherwise
    pub fn new(supplier: S, login_url: impl Into<String>) -> Self {
        Self {
            supplier,
            login_url: login_url.into(),
        }
    }

    /// `login_url?next=<percent-encoded original request>`
    #[must_use]
    pub fn resume_url(&self, original_uri: &str) -> String {
        let separator = if self.login_url.contains('?') { '&' } else { '?' };
        format!(
            "{}{separator}{RESUME_PARAM}={}",
            self.login_url,
            urlencoding::encode(original_uri)
        )
    }
}

#[async_trait]
impl<S: SessionSupplier> AuthenticationDelegate for LoginRedirectDelegate<S> {
    async fn authenticate(
        &self,
        context: &AuthenticationContext,
    ) -> Result<AuthenticationOutcome, GrantError> {
        match self.supplier.current_user(&context.headers).await? {
            Some(user) => Ok(AuthenticationOutcome::Authenticated(user)),
            None => {
                tracing::debug!("No authenticated session, redirecting to login");
                Ok(AuthenticationOutcome::RequiresInteractiveLogin {
                    resume_url: self.resume_url(&context.original_uri),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    fn delegate() -> LoginRedirectDelegate<ForwardedUserSupplier> {
        LoginRedirectDelegate::new(
            ForwardedUserSupplier::new("x-forwarded-user", "x-forwarded-email").unwrap(),
            "/login",
        )
    }

    #[tokio::test]
    async fn test_forwarded_user_is_authenticated() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-user", HeaderValue::from_static("u1"));
        headers.insert("x-forwarded-email", HeaderValue::from_static("u1@example.com"));

        let outcome = delegate()
            .authenticate(&AuthenticationContext::new(headers, "/oauth2/authorize"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            AuthenticationOutcome::Authenticated(User {
                id: "u1".to_owned(),
                email: Some("u1@example.com".to_owned()),
            })
        );
    }

    #[tokio::test]
    async fn test_missing_session_requires_login_with_resume_url() {
        let context = AuthenticationContext::new(
            HeaderMap::new(),
            "/oauth2/authorize?response_type=code&client_id=c1",
        );

        let outcome = delegate().authenticate(&context).await.unwrap();

        assert_eq!(
            outcome,
            AuthenticationOutcome::RequiresInteractiveLogin {
                resume_url:
                    "/login?next=%2Foauth2%2Fauthorize%3Fresponse_type%3Dcode%26client_id%3Dc1"
                        .to_owned(),
            }
        );
    }

    #[test]
    fn test_resume_url_appends_to_existing_query() {
        let delegate = LoginRedirectDelegate::new(
            ForwardedUserSupplier::new("x-forwarded-user", "x-forwarded-email").unwrap(),
            "https://idp.example/login?tenant=1",
        );
        assert_eq!(
            delegate.resume_url("/a?b=c"),
            "https://idp.example/login?tenant=1&next=%2Fa%3Fb%3Dc"
        );
    }

    #[test]
    fn test_invalid_header_name_rejected() {
        assert!(ForwardedUserSupplier::new("bad header", "x-forwarded-email").is_err());
    }
}
