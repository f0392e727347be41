// ABOUTME: Opaque credential value generation backed by the system CSPRNG
// ABOUTME: Authorization codes, access tokens and refresh tokens are 256-bit URL-safe strings
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use base64::{engine::general_purpose, Engine as _};
use oauth2_authority_core::GrantError;
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};

use crate::constants::oauth2::TOKEN_BYTES;

/// Source of unguessable credential values
pub trait TokenGenerator: Send + Sync {
    /// Produce a fresh opaque value
    ///
    /// # Errors
    /// Returns `GrantError::ServerError` if no secure value can be produced
    fn generate(&self) -> Result<String, GrantError>;
}

/// Generator using `ring`'s `SystemRandom`
#[derive(Debug, Clone)]
pub struct SecureTokenGenerator {
    rng: SystemRandom,
}

impl SecureTokenGenerator {
    /// Create a generator over the operating system RNG
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }
}

impl Default for SecureTokenGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenGenerator for SecureTokenGenerator {
    fn generate(&self) -> Result<String, GrantError> {
        let mut bytes = [0u8; TOKEN_BYTES];

        self.rng.fill(&mut bytes).map_err(|e| {
            tracing::error!(
                "CRITICAL: SystemRandom failed - cannot generate secure random bytes: {}",
                e
            );
            GrantError::ServerError("system RNG failure")
        })?;

        Ok(general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }
}

/// SHA-256 fingerprint of a secret (first 8 hex chars), safe to log
#[must_use]
pub fn secret_fingerprint(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    hex::encode(digest).chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_generated_tokens_are_url_safe_and_long_enough() {
        let generator = SecureTokenGenerator::new();
        let token = generator.generate().unwrap();

        // 32 bytes of entropy encode to 43 base64 characters without padding
        assert_eq!(token.len(), 43);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_generated_tokens_are_unique() {
        let generator = SecureTokenGenerator::new();
        let tokens: HashSet<String> = (0..256).map(|_| generator.generate().unwrap()).collect();
        assert_eq!(tokens.len(), 256);
    }

    #[test]
    fn test_secret_fingerprint_is_stable_and_short() {
        let first = secret_fingerprint("s1");
        assert_eq!(first.len(), 8);
        assert_eq!(first, secret_fingerprint("s1"));
        assert_ne!(first, secret_fingerprint("s2"));
    }
}
