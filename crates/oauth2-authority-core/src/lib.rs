// ABOUTME: Core types for the OAuth 2.0 authorization server
// ABOUTME: Foundation crate with credential models and the grant error taxonomy
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # OAuth2 Authority Core
//!
//! Shared types for the authorization server. This crate is designed to change
//! infrequently so the server crate and its tests compile against a stable base.
//!
//! ## Modules
//!
//! - **models**: Client, authorization code, access token, refresh token and user records
//! - **errors**: `GrantError` taxonomy with RFC 6749/6750 wire codes, and `StoreError`

/// Grant and storage error types with wire-level mapping
pub mod errors;

/// Credential and client data models
pub mod models;

pub use errors::{GrantError, OAuth2Error, StoreError};
pub use models::{
    AccessToken, AuthorizationCode, Client, Expiring, GrantType, RefreshToken, TokenKind, User,
};
