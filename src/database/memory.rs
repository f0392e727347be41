// ABOUTME: In-memory credential store using concurrent hash maps
// ABOUTME: Used for tests and ephemeral deployments; removal is the atomic consume step
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use oauth2_authority_core::{
    AccessToken, AuthorizationCode, Expiring, RefreshToken, StoreError,
};

use super::{CredentialStore, PurgeReport};

/// Credential store held in process memory
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    authorization_codes: DashMap<String, AuthorizationCode>,
    access_tokens: DashMap<String, AccessToken>,
    refresh_tokens: DashMap<String, RefreshToken>,
}

impl InMemoryCredentialStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_unique<T>(
        map: &DashMap<String, T>,
        key: &str,
        value: &T,
        entity: &'static str,
    ) -> Result<(), StoreError>
    where
        T: Clone,
    {
        match map.entry(key.to_owned()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate { entity }),
            Entry::Vacant(slot) => {
                slot.insert(value.clone());
                Ok(())
            }
        }
    }

    /// Insert a freshly minted pair, undoing the access token if the refresh token collides
    fn insert_pair(
        &self,
        access_token: &AccessToken,
        refresh_token: &RefreshToken,
    ) -> Result<(), StoreError> {
        Self::insert_unique(
            &self.access_tokens,
            &access_token.token,
            access_token,
            "access token",
        )?;
        if let Err(e) = Self::insert_unique(
            &self.refresh_tokens,
            &refresh_token.token,
            refresh_token,
            "refresh token",
        ) {
            self.access_tokens.remove(&access_token.token);
            return Err(e);
        }
        Ok(())
    }

    fn purge_map<T: Expiring>(map: &DashMap<String, T>, now: DateTime<Utc>) -> u64 {
        let before = map.len();
        map.retain(|_, record| !record.is_expired(now));
        (before.saturating_sub(map.len())) as u64
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn store_authorization_code(&self, code: &AuthorizationCode) -> Result<(), StoreError> {
        Self::insert_unique(
            &self.authorization_codes,
            &code.code,
            code,
            "authorization code",
        )
    }

    async fn get_authorization_code(
        &self,
        code: &str,
    ) -> Result<Option<AuthorizationCode>, StoreError> {
        Ok(self.authorization_codes.get(code).map(|r| r.value().clone()))
    }

    async fn delete_authorization_code(&self, code: &str) -> Result<bool, StoreError> {
        Ok(self.authorization_codes.remove(code).is_some())
    }

    async fn redeem_authorization_code(
        &self,
        code: &str,
        access_token: &AccessToken,
        refresh_token: &RefreshToken,
    ) -> Result<bool, StoreError> {
        let Some((key, consumed)) = self.authorization_codes.remove(code) else {
            return Ok(false);
        };

        if let Err(e) = self.insert_pair(access_token, refresh_token) {
            // Put the code back so a retry with fresh values can still redeem it
            self.authorization_codes.insert(key, consumed);
            return Err(e);
        }
        Ok(true)
    }

    async fn store_access_token(&self, token: &AccessToken) -> Result<(), StoreError> {
        Self::insert_unique(&self.access_tokens, &token.token, token, "access token")
    }

    async fn get_access_token(&self, token: &str) -> Result<Option<AccessToken>, StoreError> {
        Ok(self.access_tokens.get(token).map(|r| r.value().clone()))
    }

    async fn delete_access_token(&self, token: &str) -> Result<bool, StoreError> {
        Ok(self.access_tokens.remove(token).is_some())
    }

    async fn store_refresh_token(&self, token: &RefreshToken) -> Result<(), StoreError> {
        Self::insert_unique(&self.refresh_tokens, &token.token, token, "refresh token")
    }

    async fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>, StoreError> {
        Ok(self.refresh_tokens.get(token).map(|r| r.value().clone()))
    }

    async fn delete_refresh_token(&self, token: &str) -> Result<bool, StoreError> {
        Ok(self.refresh_tokens.remove(token).is_some())
    }

    async fn rotate_refresh_token(
        &self,
        old_refresh_token: &str,
        access_token: &AccessToken,
        refresh_token: &RefreshToken,
    ) -> Result<bool, StoreError> {
        let Some((key, consumed)) = self.refresh_tokens.remove(old_refresh_token) else {
            return Ok(false);
        };

        if let Err(e) = self.insert_pair(access_token, refresh_token) {
            self.refresh_tokens.insert(key, consumed);
            return Err(e);
        }
        Ok(true)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<PurgeReport, StoreError> {
        Ok(PurgeReport {
            authorization_codes: Self::purge_map(&self.authorization_codes, now),
            access_tokens: Self::purge_map(&self.access_tokens, now),
            refresh_tokens: Self::purge_map(&self.refresh_tokens, now),
        })
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
