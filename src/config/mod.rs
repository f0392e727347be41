// ABOUTME: Configuration management module for the authorization server
// ABOUTME: Builds the immutable server, client and delegate settings once at startup
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
//! Configuration module
//!
//! - **Environment**: Server, client registration and delegate configuration from
//!   environment variables

/// Environment and server configuration
pub mod environment;

pub use environment::{AuthDelegateConfig, ClientConfig, GrantConfig, ServerConfig};
