// ABOUTME: Server binary for the OAuth 2.0 authorization server
// ABOUTME: Loads configuration, prepares the credential store and serves the OAuth 2.0 routes
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # OAuth2 Authority Server Binary
//!
//! Starts the authorization server with a `SQLite` credential store and a
//! login-redirect authentication delegate fed by reverse proxy identity headers.
//!
//! The end-user identity is taken from the configured forwarded user header
//! without further checks. The listener must only be reachable through the
//! authenticating proxy, which has to strip that header from client requests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use oauth2_authority::{
    config::ServerConfig,
    database::{CredentialStore, SqliteCredentialStore},
    logging,
    oauth2_server::{
        ClientRegistry, ForwardedUserSupplier, LoginRedirectDelegate, OAuth2AuthorizationServer,
        OAuth2Routes, OAuth2State,
    },
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "oauth2-authority")]
#[command(about = "OAuth 2.0 authorization server - authorization code and refresh token grants")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Override database URL
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_from_env()?;

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }
    if let Some(database_url) = args.database_url {
        config.database_url = database_url;
    }

    info!("Starting OAuth2 authorization server");
    info!("{}", config.summary());

    let store = SqliteCredentialStore::connect(&config.database_url)
        .await
        .with_context(|| format!("Failed to open credential store {}", config.database_url))?;
    store
        .migrate()
        .await
        .context("Failed to migrate credential store schema")?;
    info!("Credential store ready");
    let store: Arc<dyn CredentialStore> = Arc::new(store);

    let supplier = ForwardedUserSupplier::new(&config.auth.user_header, &config.auth.email_header)?;
    warn!(
        user_header = %config.auth.user_header,
        "End-user identity is trusted from a forwarded header; expose this server only behind the authenticating proxy"
    );
    let delegate = Arc::new(LoginRedirectDelegate::new(
        supplier,
        config.auth.login_url.clone(),
    ));

    let server = Arc::new(OAuth2AuthorizationServer::new(
        ClientRegistry::new(config.client.to_client()),
        store,
        delegate,
        config.grant_settings(),
    ));

    if let Some(interval) = config.purge_interval {
        spawn_purge_task(Arc::clone(&server), interval);
    }

    let app = OAuth2Routes::routes(OAuth2State::new(server, &config.issuer_url));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("OAuth2 authorization server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server terminated unexpectedly")?;

    info!("OAuth2 authorization server stopped");
    Ok(())
}

/// Periodically delete expired codes and tokens
fn spawn_purge_task(server: Arc<OAuth2AuthorizationServer>, period: Duration) {
    info!("Expired credential purge every {}s", period.as_secs());
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = server.purge_expired().await {
                error!("Expired credential purge failed: {}", e);
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
