// ABOUTME: Integration tests for the OAuth 2.0 grant engine
// ABOUTME: Covers code issuance, single-use exchange, redirect binding, refresh and revocation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use chrono::Duration;
use common::{
    AnonymousDelegate, TestServer, TestServerBuilder, CLIENT_ID, CLIENT_SECRET,
    OTHER_REDIRECT_URI, REDIRECT_URI, USER_ID,
};
use oauth2_authority::{
    clock::Clock,
    database::{CredentialStore, SqliteCredentialStore},
    oauth2_server::{
        AuthenticationContext, AuthorizeRequest, AuthorizeResponse, RevocationOutcome,
        RevocationRequest, TokenRequest,
    },
};
use oauth2_authority_core::{GrantError, GrantType, TokenKind};

fn authorize_request(redirect_uri: &str) -> AuthorizeRequest {
    AuthorizeRequest {
        response_type: Some("code".to_owned()),
        client_id: Some(CLIENT_ID.to_owned()),
        redirect_uri: Some(redirect_uri.to_owned()),
        scope: Some("read".to_owned()),
        state: Some("xyz".to_owned()),
    }
}

fn exchange_request(code: &str, redirect_uri: &str) -> TokenRequest {
    TokenRequest {
        grant_type: Some("authorization_code".to_owned()),
        code: Some(code.to_owned()),
        redirect_uri: Some(redirect_uri.to_owned()),
        client_id: Some(CLIENT_ID.to_owned()),
        client_secret: Some(CLIENT_SECRET.to_owned()),
        ..TokenRequest::default()
    }
}

fn refresh_request(refresh_token: &str) -> TokenRequest {
    TokenRequest {
        grant_type: Some("refresh_token".to_owned()),
        refresh_token: Some(refresh_token.to_owned()),
        client_id: Some(CLIENT_ID.to_owned()),
        client_secret: Some(CLIENT_SECRET.to_owned()),
        ..TokenRequest::default()
    }
}

async fn authorize(ts: &TestServer, redirect_uri: &str) -> AuthorizeResponse {
    ts.server
        .authorize(
            authorize_request(redirect_uri),
            &AuthenticationContext::default(),
        )
        .await
        .unwrap()
}

// ============================================================================
// Authorization endpoint
// ============================================================================

#[tokio::test]
async fn test_authorize_issues_one_code_bound_to_user() {
    let ts = TestServerBuilder::new().tokens(&["ABC123"]).build();

    let response = authorize(&ts, REDIRECT_URI).await;
    assert_eq!(response.code, "ABC123");
    assert_eq!(response.state.as_deref(), Some("xyz"));
    assert_eq!(
        response.redirect_location().unwrap(),
        "https://app/cb?code=ABC123&state=xyz"
    );

    let code = ts
        .store
        .get_authorization_code("ABC123")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(code.user_id, USER_ID);
    assert_eq!(code.redirect_uri, REDIRECT_URI);
    assert_eq!(code.scope.as_deref(), Some("read"));
    assert_eq!(code.expires_at, ts.clock.now() + Duration::seconds(600));
}

#[tokio::test]
async fn test_authorize_unknown_client_is_reported_directly() {
    let ts = TestServerBuilder::new().build();
    let mut request = authorize_request(REDIRECT_URI);
    request.client_id = Some("c2".to_owned());

    let failure = ts
        .server
        .authorize(request, &AuthenticationContext::default())
        .await
        .unwrap_err();

    assert_eq!(failure.error, GrantError::InvalidClient);
    assert!(failure.redirect_location().is_none());
}

#[tokio::test]
async fn test_authorize_requires_exact_redirect_uri() {
    let ts = TestServerBuilder::new().build();

    for candidate in ["https://app/cb/", "https://APP/cb", "https://app/cb?x=1", "https://evil/cb"] {
        let failure = ts
            .server
            .authorize(
                authorize_request(candidate),
                &AuthenticationContext::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(failure.error, GrantError::InvalidRedirectUri, "{candidate}");
        assert!(failure.redirect_location().is_none(), "{candidate}");
    }
}

#[tokio::test]
async fn test_authorize_unsupported_response_type_redirects_with_error() {
    let ts = TestServerBuilder::new().build();
    let mut request = authorize_request(REDIRECT_URI);
    request.response_type = Some("token".to_owned());

    let failure = ts
        .server
        .authorize(request, &AuthenticationContext::default())
        .await
        .unwrap_err();

    assert!(matches!(failure.error, GrantError::UnsupportedResponseType(_)));
    let location = failure.redirect_location().unwrap();
    assert!(location.starts_with("https://app/cb?error=unsupported_response_type"));
    assert!(location.ends_with("state=xyz"));
}

#[tokio::test]
async fn test_authorize_without_session_requires_login() {
    let ts = TestServerBuilder::new()
        .delegate(Arc::new(AnonymousDelegate))
        .tokens(&["ABC123"])
        .build();
    let context = AuthenticationContext::new(
        http::HeaderMap::new(),
        "/oauth2/authorize?response_type=code&client_id=c1",
    );

    let failure = ts
        .server
        .authorize(authorize_request(REDIRECT_URI), &context)
        .await
        .unwrap_err();

    match failure.error {
        GrantError::AuthenticationRequired { resume_url } => {
            assert!(resume_url.starts_with("/login?next=%2Foauth2%2Fauthorize"));
        }
        other => panic!("expected AuthenticationRequired, got {other:?}"),
    }
    assert!(ts
        .store
        .get_authorization_code("ABC123")
        .await
        .unwrap()
        .is_none());
}

// ============================================================================
// Authorization code exchange
// ============================================================================

#[tokio::test]
async fn test_code_exchange_mints_token_pair_once() {
    let ts = TestServerBuilder::new()
        .tokens(&["ABC123", "T1", "R1"])
        .build();
    let code = authorize(&ts, REDIRECT_URI).await.code;

    let tokens = ts
        .server
        .token(exchange_request(&code, REDIRECT_URI))
        .await
        .unwrap();
    assert_eq!(tokens.access_token, "T1");
    assert_eq!(tokens.refresh_token, "R1");
    assert_eq!(tokens.token_type, "bearer");
    assert_eq!(tokens.expires_in, 3600);
    assert_eq!(tokens.scope.as_deref(), Some("read"));

    let access = ts.store.get_access_token("T1").await.unwrap().unwrap();
    assert_eq!(access.user_id, USER_ID);
    assert_eq!(access.expires_at, ts.clock.now() + Duration::seconds(3600));
    assert!(ts.store.get_refresh_token("R1").await.unwrap().is_some());
    assert!(ts
        .store
        .get_authorization_code(&code)
        .await
        .unwrap()
        .is_none());

    let replay = ts
        .server
        .token(exchange_request(&code, REDIRECT_URI))
        .await
        .unwrap_err();
    assert!(matches!(replay, GrantError::InvalidGrant(_)));
}

async fn assert_concurrent_exchange_has_one_winner(ts: TestServer) {
    let code = authorize(&ts, REDIRECT_URI).await.code;

    let spawn_exchange = |code: String| {
        let server = Arc::clone(&ts.server);
        tokio::spawn(async move { server.token(exchange_request(&code, REDIRECT_URI)).await })
    };
    let (first, second) = tokio::join!(spawn_exchange(code.clone()), spawn_exchange(code));
    let (first, second) = (first.unwrap(), second.unwrap());

    let successes = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "first: {first:?}, second: {second:?}");
    let failure = if first.is_err() { first } else { second };
    assert!(matches!(failure, Err(GrantError::InvalidGrant(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_code_exchange_in_memory() {
    assert_concurrent_exchange_has_one_winner(TestServerBuilder::new().build()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_code_exchange_sqlite() {
    let store = SqliteCredentialStore::connect("sqlite::memory:").await.unwrap();
    store.migrate().await.unwrap();
    let ts = TestServerBuilder::new().store(Arc::new(store)).build();

    assert_concurrent_exchange_has_one_winner(ts).await;
}

#[tokio::test]
async fn test_code_bound_to_issuing_redirect_uri() {
    let ts = TestServerBuilder::new().build();
    let code = authorize(&ts, REDIRECT_URI).await.code;

    let result = ts
        .server
        .token(exchange_request(&code, OTHER_REDIRECT_URI))
        .await;

    assert!(matches!(result, Err(GrantError::InvalidGrant(_))));
}

#[tokio::test]
async fn test_expired_code_is_rejected_and_removed() {
    let ts = TestServerBuilder::new().build();
    let code = authorize(&ts, REDIRECT_URI).await.code;

    ts.clock.advance(Duration::seconds(600));
    let result = ts
        .server
        .token(exchange_request(&code, REDIRECT_URI))
        .await;
    assert!(matches!(result, Err(GrantError::InvalidGrant(_))));

    assert!(ts
        .store
        .get_authorization_code(&code)
        .await
        .unwrap()
        .is_none());

    ts.clock.advance(Duration::seconds(-600));
    let retry = ts
        .server
        .token(exchange_request(&code, REDIRECT_URI))
        .await;
    assert!(matches!(retry, Err(GrantError::InvalidGrant(_))));
}

#[tokio::test]
async fn test_out_of_range_token_lifetime_fails_without_consuming_code() {
    let mut client = common::test_client();
    client.refresh_token_ttl = Duration::MAX;
    let ts = TestServerBuilder::new().client(client).build();
    let code = authorize(&ts, REDIRECT_URI).await.code;

    let exchange = {
        let server = Arc::clone(&ts.server);
        let code = code.clone();
        tokio::spawn(async move { server.token(exchange_request(&code, REDIRECT_URI)).await })
    };
    let result = exchange.await.unwrap();

    assert!(matches!(result, Err(GrantError::ServerError(_))));
    assert!(ts
        .store
        .get_authorization_code(&code)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_token_request_client_authentication() {
    let ts = TestServerBuilder::new().build();
    let code = authorize(&ts, REDIRECT_URI).await.code;

    let mut wrong_secret = exchange_request(&code, REDIRECT_URI);
    wrong_secret.client_secret = Some("s2".to_owned());
    assert_eq!(
        ts.server.token(wrong_secret).await.unwrap_err(),
        GrantError::InvalidClient
    );

    let mut no_client = exchange_request(&code, REDIRECT_URI);
    no_client.client_id = None;
    assert_eq!(
        ts.server.token(no_client).await.unwrap_err(),
        GrantError::InvalidClient
    );

    // Failed client authentication must not burn the code
    assert!(ts
        .server
        .token(exchange_request(&code, REDIRECT_URI))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_token_request_grant_type_validation() {
    let ts = TestServerBuilder::new().build();

    let mut unknown = exchange_request("ABC123", REDIRECT_URI);
    unknown.grant_type = Some("password".to_owned());
    assert_eq!(
        ts.server.token(unknown).await.unwrap_err(),
        GrantError::UnsupportedGrantType("password".to_owned())
    );

    let mut missing = exchange_request("ABC123", REDIRECT_URI);
    missing.grant_type = None;
    assert!(matches!(
        ts.server.token(missing).await.unwrap_err(),
        GrantError::InvalidRequest(_)
    ));

    let mut no_code = exchange_request("ABC123", REDIRECT_URI);
    no_code.code = None;
    assert!(matches!(
        ts.server.token(no_code).await.unwrap_err(),
        GrantError::InvalidRequest(_)
    ));
}

#[tokio::test]
async fn test_client_without_refresh_grant_is_unauthorized() {
    let mut client = common::test_client();
    client.allowed_grants = vec![GrantType::AuthorizationCode];
    let ts = TestServerBuilder::new().client(client).build();

    assert_eq!(
        ts.server.token(refresh_request("R1")).await.unwrap_err(),
        GrantError::UnauthorizedClient("refresh_token")
    );
}

// ============================================================================
// Refresh token grant
// ============================================================================

#[tokio::test]
async fn test_refresh_mints_access_token_without_reauthentication() {
    let ts = TestServerBuilder::new()
        .tokens(&["ABC123", "T1", "R1", "T2"])
        .build();
    let code = authorize(&ts, REDIRECT_URI).await.code;
    ts.server
        .token(exchange_request(&code, REDIRECT_URI))
        .await
        .unwrap();

    ts.clock.advance(Duration::seconds(60));
    let refreshed = ts.server.token(refresh_request("R1")).await.unwrap();
    assert_eq!(refreshed.access_token, "T2");
    assert_eq!(refreshed.refresh_token, "R1");
    assert_eq!(refreshed.expires_in, 3600);
    assert_eq!(refreshed.scope.as_deref(), Some("read"));

    let access = ts.store.get_access_token("T2").await.unwrap().unwrap();
    assert_eq!(access.user_id, USER_ID);
    assert_eq!(access.expires_at, ts.clock.now() + Duration::seconds(3600));

    // Non-rotating refresh tokens stay reusable
    assert!(ts.server.token(refresh_request("R1")).await.is_ok());
}

#[tokio::test]
async fn test_refresh_rejects_unknown_and_expired_tokens() {
    let ts = TestServerBuilder::new()
        .tokens(&["ABC123", "T1", "R1"])
        .build();
    assert!(matches!(
        ts.server.token(refresh_request("nope")).await,
        Err(GrantError::InvalidGrant(_))
    ));

    let code = authorize(&ts, REDIRECT_URI).await.code;
    ts.server
        .token(exchange_request(&code, REDIRECT_URI))
        .await
        .unwrap();

    ts.clock.advance(Duration::days(1));
    assert!(matches!(
        ts.server.token(refresh_request("R1")).await,
        Err(GrantError::InvalidGrant(_))
    ));
    assert!(ts.store.get_refresh_token("R1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_rotating_refresh_retires_old_token() {
    let ts = TestServerBuilder::new()
        .tokens(&["ABC123", "T1", "R1", "T2", "R2"])
        .rotate_refresh_tokens()
        .build();
    let code = authorize(&ts, REDIRECT_URI).await.code;
    ts.server
        .token(exchange_request(&code, REDIRECT_URI))
        .await
        .unwrap();

    let rotated = ts.server.token(refresh_request("R1")).await.unwrap();
    assert_eq!(rotated.access_token, "T2");
    assert_eq!(rotated.refresh_token, "R2");

    assert!(matches!(
        ts.server.token(refresh_request("R1")).await,
        Err(GrantError::InvalidGrant(_))
    ));
    assert!(ts.server.token(refresh_request("R2")).await.is_ok());
}

// ============================================================================
// Revocation
// ============================================================================

#[tokio::test]
async fn test_revoked_refresh_token_fails_but_access_token_survives() {
    let ts = TestServerBuilder::new()
        .tokens(&["ABC123", "T1", "R1"])
        .build();
    let code = authorize(&ts, REDIRECT_URI).await.code;
    ts.server
        .token(exchange_request(&code, REDIRECT_URI))
        .await
        .unwrap();

    let request = RevocationRequest {
        refresh_token: Some("R1".to_owned()),
        ..RevocationRequest::default()
    };
    assert_eq!(
        ts.server.revoke(&request).await.unwrap(),
        RevocationOutcome::Revoked(TokenKind::RefreshToken)
    );

    assert!(matches!(
        ts.server.token(refresh_request("R1")).await,
        Err(GrantError::InvalidGrant(_))
    ));
    let principal = ts.server.resource_guard().authenticate("T1").await.unwrap();
    assert_eq!(principal.user_id, USER_ID);

    // Idempotent
    assert_eq!(
        ts.server.revoke(&request).await.unwrap(),
        RevocationOutcome::NotFound
    );
}

#[tokio::test]
async fn test_revoke_access_token_by_hint() {
    let ts = TestServerBuilder::new()
        .tokens(&["ABC123", "T1", "R1"])
        .build();
    let code = authorize(&ts, REDIRECT_URI).await.code;
    ts.server
        .token(exchange_request(&code, REDIRECT_URI))
        .await
        .unwrap();

    let request = RevocationRequest {
        token: Some("T1".to_owned()),
        token_type_hint: Some("access_token".to_owned()),
        client_id: Some(CLIENT_ID.to_owned()),
        client_secret: Some(CLIENT_SECRET.to_owned()),
        ..RevocationRequest::default()
    };
    assert_eq!(
        ts.server.revoke(&request).await.unwrap(),
        RevocationOutcome::Revoked(TokenKind::AccessToken)
    );
    assert!(matches!(
        ts.server.resource_guard().authenticate("T1").await,
        Err(GrantError::InvalidToken(_))
    ));
}

#[tokio::test]
async fn test_revoke_rejects_bad_client_credentials() {
    let ts = TestServerBuilder::new().build();
    let request = RevocationRequest {
        token: Some("R1".to_owned()),
        client_id: Some(CLIENT_ID.to_owned()),
        client_secret: Some("wrong".to_owned()),
        ..RevocationRequest::default()
    };

    assert_eq!(
        ts.server.revoke(&request).await.unwrap_err(),
        GrantError::InvalidClient
    );
    assert!(matches!(
        ts.server.revoke(&RevocationRequest::default()).await,
        Err(GrantError::InvalidRequest(_))
    ));
}

// ============================================================================
// Purge
// ============================================================================

#[tokio::test]
async fn test_purge_removes_only_expired_credentials() {
    let ts = TestServerBuilder::new()
        .tokens(&["ABC123", "T1", "R1", "CODE2"])
        .build();
    let code = authorize(&ts, REDIRECT_URI).await.code;
    ts.server
        .token(exchange_request(&code, REDIRECT_URI))
        .await
        .unwrap();
    authorize(&ts, REDIRECT_URI).await;

    ts.clock.advance(Duration::seconds(3600));
    let report = ts.server.purge_expired().await.unwrap();
    assert_eq!(report.authorization_codes, 1);
    assert_eq!(report.access_tokens, 1);
    assert_eq!(report.refresh_tokens, 0);
    assert!(ts.store.get_refresh_token("R1").await.unwrap().is_some());
}
