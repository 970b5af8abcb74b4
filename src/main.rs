//! aura-sso - Interactive Azure AD SSO probe for Neo4j Aura
//!
//! Signs a developer in through the browser with OAuth2 + PKCE, then runs a
//! single bearer-authenticated verification query against an Aura instance
//! and prints its result. One shot: the process exits 0 after printing, 1 on
//! the first error.

#![deny(clippy::all)]

mod aura;
mod auth;
mod config;
mod error;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use aura::AuraClient;
use auth::callback_server::CallbackServer;
use auth::oauth::{OAuth2Client, PkceChallenge};
use config::Config;

#[tokio::main]
async fn main() {
    // Load .env file (if present) before anything else
    if let Err(e) = dotenvy::dotenv() {
        // .env file is optional - only log if it's not a "file not found" error
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    init_logging();

    if let Err(e) = run().await {
        error!("{:#}", e);
        eprintln!("Failed to authenticate and connect: {:#}", e);
        std::process::exit(1);
    }
}

/// The whole flow: config, PKCE, interactive sign-in, probe query.
async fn run() -> Result<()> {
    let config = Config::from_env()?;
    info!("Configuration loaded");

    let pkce = PkceChallenge::new();
    let oauth_client = OAuth2Client::new(&config)?;

    // Bind before opening the browser so the redirect cannot race the listener
    let server = CallbackServer::bind(&config.listen_addr()?)
        .await
        .context("Failed to start the callback listener")?;

    let (auth_url, state) = oauth_client.generate_auth_url(&pkce);
    info!("Opening browser for login: {}", auth_url);
    open::that(auth_url.as_str()).context("Failed to open the browser")?;

    let id_token = auth::complete_sign_in(server, &oauth_client, &pkce, &state)
        .await
        .context("Interactive sign-in failed")?;

    let aura_client = AuraClient::new(&config.db_id)?;
    let message = aura_client
        .probe(&id_token)
        .await
        .context("Aura probe query failed")?;

    println!("{}", message);
    Ok(())
}

/// Initialize tracing/logging.
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
}
