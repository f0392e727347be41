// ABOUTME: OAuth 2.0 authorization server for a single registered client
// ABOUTME: Provides the grant engine, client registry, authentication delegate and resource guard
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Authentication delegate boundary
pub mod authentication;
/// Client registry
pub mod client_registry;
/// OAuth 2.0 grant engine
pub mod endpoints;
/// OAuth 2.0 data models and types
pub mod models;
/// Bearer token validation for protected resources
pub mod resource_protection;
/// HTTP routes
pub mod routes;

/// Authentication delegate types
pub use authentication::{
    AuthenticationContext, AuthenticationDelegate, AuthenticationOutcome, ForwardedUserSupplier,
    LoginRedirectDelegate, SessionSupplier,
};
/// Client registry
pub use client_registry::ClientRegistry;
/// OAuth 2.0 authorization server
pub use endpoints::OAuth2AuthorizationServer;

// OAuth 2.0 data models and request/response types

/// Authorization request
pub use models::AuthorizeRequest;
/// Authorization response
pub use models::AuthorizeResponse;
/// Authorization endpoint failure
pub use models::AuthorizationFailure;
/// Grant engine settings
pub use models::GrantSettings;
/// Revocation request
pub use models::RevocationRequest;
/// Revocation outcome
pub use models::RevocationOutcome;
/// Token exchange request
pub use models::TokenRequest;
/// Token exchange response
pub use models::TokenResponse;
/// Authenticated token principal
pub use models::TokenPrincipal;

/// Resource protection
pub use resource_protection::{extract_bearer_token, BearerPrincipal, ResourceGuard};
/// HTTP routes
pub use routes::{OAuth2Routes, OAuth2State};
