//! Error types for the aura-sso probe.
//!
//! Uses `thiserror` for library-style errors with automatic `Display` and `Error` implementations.

use thiserror::Error;

/// Authentication-related errors.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("OAuth2 authorization failed: {0}")]
    OAuthFailed(String),

    #[error("Invalid authorization code")]
    InvalidAuthCode,

    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("State validation failed (possible CSRF attack)")]
    StateValidationFailed,

    #[error("Timed out waiting for the OAuth callback")]
    CallbackTimeout,

    #[error("Callback listener error: {0}")]
    Listener(#[from] std::io::Error),
}

/// Errors from the Aura probe query.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Aura request failed: {0}")]
    RequestFailed(String),

    #[error("Unauthorized: Aura rejected the identity token")]
    Unauthorized,

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Failed to parse query response: {0}")]
    ParseFailed(String),
}
