// ABOUTME: Cryptography module for opaque credential generation and secret handling
// ABOUTME: Centralizes secure random token minting and secret fingerprints
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Cryptographic utilities for the authorization server

/// Random code and token generation
pub mod tokens;

pub use tokens::{secret_fingerprint, SecureTokenGenerator, TokenGenerator};
