// ABOUTME: Error types for the authorization server core
// ABOUTME: Grant outcome taxonomy, wire-level error body, and credential store failures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Error Handling
//!
//! `GrantError` is the single tagged result type returned by every grant and
//! protection operation. Each variant maps to an RFC 6749 / RFC 6750 error
//! code and an HTTP status. `StoreError` describes credential store failures
//! and is never exposed on the wire; the grant engine logs it and reports
//! `GrantError::StorageUnavailable`.

mod grant;
#[cfg(feature = "http-response")]
mod http;
mod store;

pub use grant::{GrantError, OAuth2Error};
#[cfg(feature = "http-response")]
pub use http::BEARER_REALM;
pub use store::StoreError;
