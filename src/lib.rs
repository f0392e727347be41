// ABOUTME: Main library entry point for the OAuth 2.0 authorization server
// ABOUTME: Provides the authorization code and refresh token grants for a single registered client
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

// Crate-level attributes:
// - deny(unsafe_code): Zero-tolerance unsafe policy
#![deny(unsafe_code)]

//! # OAuth2 Authority
//!
//! An OAuth 2.0 authorization server core. It issues opaque authorization
//! codes, access tokens and refresh tokens for one statically configured
//! client, and validates bearer tokens presented to protected resources.
//!
//! ## Features
//!
//! - **Authorization code grant** (RFC 6749 section 4.1) with exact redirect URI binding
//!   and single-use codes
//! - **Refresh token grant** (RFC 6749 section 6) with optional rotation
//! - **Token revocation** (RFC 7009)
//! - **Bearer token protection** (RFC 6750) as an axum extractor
//! - **Pluggable end-user authentication** through the authentication delegate
//!
//! ## Architecture
//!
//! - **`oauth2_server`**: Grant engine, client registry, authentication delegate,
//!   resource guard and HTTP routes
//! - **`database`**: Credential store trait with `SQLite` and in-memory backends
//! - **`config`**: Environment-driven server configuration
//! - **`logging`**: Structured logging setup
//! - **`errors`**: Infrastructure error types; protocol errors live in
//!   `oauth2_authority_core`

/// Time source abstraction
pub mod clock;

/// Configuration management
pub mod config;

/// Application constants and defaults
pub mod constants;

/// Random credential generation and secret fingerprints
pub mod crypto;

/// Credential storage
pub mod database;

/// Unified error handling
pub mod errors;

/// Structured logging
pub mod logging;

/// OAuth 2.0 authorization server
pub mod oauth2_server;

pub use oauth2_authority_core::{GrantError, OAuth2Error, StoreError};
