//! Configuration loading from the process environment.
//!
//! All settings come from environment variables (optionally via a `.env`
//! file loaded in `main`). Missing values are reported upfront rather than
//! surfacing later as opaque authentication failures.

use anyhow::{Context, Result};
use std::env;
use url::Url;

/// Scopes requested during sign-in. Fixed; the probe only needs an identity token.
pub const SCOPES: [&str; 3] = ["openid", "profile", "email"];

/// Runtime configuration for one probe run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Azure AD application (client) id.
    pub client_id: String,
    /// Azure AD tenant id.
    pub tenant_id: String,
    /// Redirect URI registered on the app; the callback listener binds to its host:port.
    pub redirect_uri: String,
    /// Aura database id, e.g. `5314cd18`.
    pub db_id: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let config = Self {
            client_id: require("AZURE_APP_CLIENT_ID")?,
            tenant_id: require("AZURE_APP_TENANT_ID")?,
            redirect_uri: require("AZURE_APP_REDIRECT_URI")?,
            db_id: require("AURA_DB_ID")?,
        };

        // Fail early on a redirect URI the callback listener cannot bind
        config
            .listen_addr()
            .context("AZURE_APP_REDIRECT_URI is not a usable redirect URI")?;

        Ok(config)
    }

    /// Host:port the callback listener should bind, taken from the redirect URI.
    pub fn listen_addr(&self) -> Result<String> {
        listen_addr_of(&self.redirect_uri)
    }
}

/// Derive a bindable `host:port` from a redirect URI such as `http://localhost:3000`.
pub fn listen_addr_of(redirect_uri: &str) -> Result<String> {
    let url = Url::parse(redirect_uri)
        .with_context(|| format!("Invalid redirect URI: {redirect_uri}"))?;

    let host = url
        .host_str()
        .with_context(|| format!("Redirect URI has no host: {redirect_uri}"))?;
    let port = url
        .port_or_known_default()
        .with_context(|| format!("Redirect URI has no port: {redirect_uri}"))?;

    Ok(format!("{host}:{port}"))
}

fn require(name: &str) -> Result<String> {
    let value =
        env::var(name).with_context(|| format!("Required environment variable {name} is not set"))?;
    if value.is_empty() {
        anyhow::bail!("Required environment variable {name} is empty");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_addr_default_port() {
        assert_eq!(listen_addr_of("http://localhost:3000").unwrap(), "localhost:3000");
        assert_eq!(listen_addr_of("http://127.0.0.1:8080/callback").unwrap(), "127.0.0.1:8080");
        // No explicit port falls back to the scheme default
        assert_eq!(listen_addr_of("http://localhost").unwrap(), "localhost:80");
    }

    #[test]
    fn test_listen_addr_rejects_garbage() {
        assert!(listen_addr_of("not a uri").is_err());
    }
}
