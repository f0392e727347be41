// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides client fixtures, deterministic clocks, token sequences and stub delegates
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used
)]
//! Shared test utilities for `oauth2_authority`

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use oauth2_authority::{
    clock::ManualClock,
    crypto::{SecureTokenGenerator, TokenGenerator},
    database::{CredentialStore, InMemoryCredentialStore},
    oauth2_server::{
        AuthenticationContext, AuthenticationDelegate, AuthenticationOutcome, ClientRegistry,
        GrantSettings, OAuth2AuthorizationServer,
    },
};
use oauth2_authority_core::{Client, GrantError, GrantType, User};

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        let _ = tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .try_init();
    });
}

pub const CLIENT_ID: &str = "c1";
pub const CLIENT_SECRET: &str = "s1";
pub const REDIRECT_URI: &str = "https://app/cb";
pub const OTHER_REDIRECT_URI: &str = "https://app/other";
pub const USER_ID: &str = "u1";
pub const ACCESS_TOKEN_TTL_SECS: i64 = 3600;

/// Confidential client `c1` with two registered redirect URIs
pub fn test_client() -> Client {
    Client {
        id: CLIENT_ID.to_owned(),
        secret: Some(CLIENT_SECRET.to_owned()),
        allowed_redirect_uris: vec![REDIRECT_URI.to_owned(), OTHER_REDIRECT_URI.to_owned()],
        access_token_ttl: Duration::seconds(ACCESS_TOKEN_TTL_SECS),
        refresh_token_ttl: Duration::days(1),
        allowed_grants: vec![GrantType::AuthorizationCode, GrantType::RefreshToken],
    }
}

/// Fixed starting instant for deterministic expiry tests
pub fn test_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap(),
    ))
}

/// Hands out predetermined values, then falls back to secure random ones
pub struct SequenceTokenGenerator {
    values: Mutex<VecDeque<String>>,
    fallback: SecureTokenGenerator,
}

impl SequenceTokenGenerator {
    pub fn new(values: &[&str]) -> Self {
        Self {
            values: Mutex::new(values.iter().map(|v| (*v).to_owned()).collect()),
            fallback: SecureTokenGenerator::new(),
        }
    }
}

impl TokenGenerator for SequenceTokenGenerator {
    fn generate(&self) -> Result<String, GrantError> {
        let next = self.values.lock().unwrap().pop_front();
        next.map_or_else(|| self.fallback.generate(), Ok)
    }
}

/// Delegate that always reports the same authenticated user
pub struct FixedUserDelegate(pub User);

#[async_trait]
impl AuthenticationDelegate for FixedUserDelegate {
    async fn authenticate(
        &self,
        _context: &AuthenticationContext,
    ) -> Result<AuthenticationOutcome, GrantError> {
        Ok(AuthenticationOutcome::Authenticated(self.0.clone()))
    }
}

/// Delegate for a user agent without a session
pub struct AnonymousDelegate;

#[async_trait]
impl AuthenticationDelegate for AnonymousDelegate {
    async fn authenticate(
        &self,
        context: &AuthenticationContext,
    ) -> Result<AuthenticationOutcome, GrantError> {
        Ok(AuthenticationOutcome::RequiresInteractiveLogin {
            resume_url: format!("/login?next={}", urlencoding::encode(&context.original_uri)),
        })
    }
}

/// Grant engine wired to test doubles
pub struct TestServer {
    pub server: Arc<OAuth2AuthorizationServer>,
    pub store: Arc<dyn CredentialStore>,
    pub clock: Arc<ManualClock>,
}

/// Builder for `TestServer`
pub struct TestServerBuilder {
    store: Arc<dyn CredentialStore>,
    delegate: Arc<dyn AuthenticationDelegate>,
    tokens: Option<Arc<dyn TokenGenerator>>,
    settings: GrantSettings,
    client: Client,
}

impl TestServerBuilder {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryCredentialStore::new()),
            delegate: Arc::new(FixedUserDelegate(User::new(USER_ID))),
            tokens: None,
            settings: GrantSettings::default(),
            client: test_client(),
        }
    }

    pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = store;
        self
    }

    pub fn delegate(mut self, delegate: Arc<dyn AuthenticationDelegate>) -> Self {
        self.delegate = delegate;
        self
    }

    pub fn tokens(mut self, values: &[&str]) -> Self {
        self.tokens = Some(Arc::new(SequenceTokenGenerator::new(values)));
        self
    }

    pub fn rotate_refresh_tokens(mut self) -> Self {
        self.settings.rotate_refresh_tokens = true;
        self
    }

    pub fn client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn build(self) -> TestServer {
        init_test_logging();
        let clock = test_clock();
        let mut server = OAuth2AuthorizationServer::new(
            ClientRegistry::new(self.client),
            Arc::clone(&self.store),
            self.delegate,
            self.settings,
        )
        .with_clock(clock.clone());
        if let Some(tokens) = self.tokens {
            server = server.with_token_generator(tokens);
        }

        TestServer {
            server: Arc::new(server),
            store: self.store,
            clock,
        }
    }
}

impl Default for TestServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
