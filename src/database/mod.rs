// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Credential Store
//!
//! Durable storage for authorization codes, access tokens and refresh tokens.
//! The store exclusively owns persisted records; the grant engine reads them per
//! request and never caches them.
//!
//! Every operation is atomic per row, and code and token values are unique.
//! Compound operations (`redeem_authorization_code`, `rotate_refresh_token`) run
//! as a single unit so that a code or refresh token is consumed at most once
//! even under concurrent requests.

mod memory;
mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use oauth2_authority_core::{AccessToken, AuthorizationCode, RefreshToken, StoreError};
use serde::Serialize;

pub use memory::InMemoryCredentialStore;
pub use sqlite::SqliteCredentialStore;

/// Rows removed by an expired-credential purge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    /// Expired authorization codes removed
    pub authorization_codes: u64,
    /// Expired access tokens removed
    pub access_tokens: u64,
    /// Expired refresh tokens removed
    pub refresh_tokens: u64,
}

impl PurgeReport {
    /// Total rows removed
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.authorization_codes + self.access_tokens + self.refresh_tokens
    }
}

/// Storage interface for issued credentials
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persist a newly issued authorization code
    async fn store_authorization_code(&self, code: &AuthorizationCode) -> Result<(), StoreError>;

    /// Look up an authorization code by value
    async fn get_authorization_code(
        &self,
        code: &str,
    ) -> Result<Option<AuthorizationCode>, StoreError>;

    /// Delete an authorization code; `false` if it was already gone
    async fn delete_authorization_code(&self, code: &str) -> Result<bool, StoreError>;

    /// Delete the code and persist the minted token pair as one unit
    ///
    /// Returns `false` and persists nothing when the code no longer exists, so
    /// exactly one of several concurrent callers observes `true`.
    async fn redeem_authorization_code(
        &self,
        code: &str,
        access_token: &AccessToken,
        refresh_token: &RefreshToken,
    ) -> Result<bool, StoreError>;

    /// Persist an access token
    async fn store_access_token(&self, token: &AccessToken) -> Result<(), StoreError>;

    /// Look up an access token by value
    async fn get_access_token(&self, token: &str) -> Result<Option<AccessToken>, StoreError>;

    /// Delete an access token; `false` if it was already gone
    async fn delete_access_token(&self, token: &str) -> Result<bool, StoreError>;

    /// Persist a refresh token
    async fn store_refresh_token(&self, token: &RefreshToken) -> Result<(), StoreError>;

    /// Look up a refresh token by value
    async fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>, StoreError>;

    /// Delete a refresh token; `false` if it was already gone
    async fn delete_refresh_token(&self, token: &str) -> Result<bool, StoreError>;

    /// Delete the old refresh token and persist the replacement pair as one unit
    ///
    /// Returns `false` and persists nothing when the old token no longer exists.
    async fn rotate_refresh_token(
        &self,
        old_refresh_token: &str,
        access_token: &AccessToken,
        refresh_token: &RefreshToken,
    ) -> Result<bool, StoreError>;

    /// Remove every credential with `expires_at <= now`
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<PurgeReport, StoreError>;

    /// Verify the backend is reachable
    async fn health_check(&self) -> Result<(), StoreError>;
}
