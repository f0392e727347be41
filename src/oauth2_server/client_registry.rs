// ABOUTME: Registry of the single configured OAuth 2.0 client
// ABOUTME: Resolves client identity and verifies the shared secret in constant time
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use oauth2_authority_core::{Client, GrantError, GrantType};
use subtle::ConstantTimeEq;

/// Read-only registry holding the configured client
#[derive(Debug, Clone)]
pub struct ClientRegistry {
    client: Client,
}

impl ClientRegistry {
    /// Registry serving `client`
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    /// The registered client
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    /// Identify the client without authenticating it
    ///
    /// # Errors
    /// Returns `GrantError::InvalidClient` if `client_id` is not the registered id
    pub fn lookup(&self, client_id: &str) -> Result<&Client, GrantError> {
        if constant_time_eq(client_id, &self.client.id) {
            Ok(&self.client)
        } else {
            Err(GrantError::InvalidClient)
        }
    }

    /// Identify and authenticate the client
    ///
    /// A confidential client must present its exact secret. A public client
    /// must present none.
    ///
    /// # Errors
    /// Returns `GrantError::InvalidClient` on any mismatch, without saying which part failed
    pub fn resolve(
        &self,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> Result<&Client, GrantError> {
        let client = self.lookup(client_id)?;

        let authenticated = match (client.secret.as_deref(), client_secret) {
            (Some(expected), Some(presented)) => constant_time_eq(presented, expected),
            (None, None) => true,
            _ => false,
        };

        if authenticated {
            Ok(client)
        } else {
            Err(GrantError::InvalidClient)
        }
    }

    /// Exact-match test against the registered redirect URIs
    #[must_use]
    pub fn redirect_uri_registered(&self, uri: &str) -> bool {
        self.client.has_redirect_uri(uri)
    }

    /// Whether the client may use `grant`
    #[must_use]
    pub fn allows_grant(&self, grant: GrantType) -> bool {
        self.client.allows_grant(grant)
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
