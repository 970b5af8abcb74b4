//! OAuth2 client with PKCE support for Azure AD authentication.

use crate::config::{Config, SCOPES};
use crate::error::AuthError;
use anyhow::{Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Default Azure AD authority host.
const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// HTTP request timeout.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// HTTP connection timeout.
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// PKCE code verifier and challenge pair.
///
/// Generated fresh for every run; reusing a verifier across runs would defeat
/// the replay protection PKCE exists for.
#[derive(Debug, Zeroize, ZeroizeOnDrop)]
pub struct PkceChallenge {
    /// The code verifier (kept locally, sent in the token exchange).
    pub verifier: String,
    /// The code challenge (SHA256 of the verifier, sent in the auth request).
    pub challenge: String,
}

impl PkceChallenge {
    /// Generate a new PKCE challenge pair from 64 random bytes.
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        let verifier_bytes: Vec<u8> = (0..64).map(|_| rng.gen()).collect();
        let verifier = URL_SAFE_NO_PAD.encode(&verifier_bytes);

        Self {
            challenge: challenge_for(&verifier),
            verifier,
        }
    }
}

impl Default for PkceChallenge {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute the S256 challenge for a verifier: BASE64URL(SHA256(verifier)).
fn challenge_for(verifier: &str) -> String {
    use sha2::{Digest, Sha256};
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// OAuth2 client for Azure AD authentication.
pub struct OAuth2Client {
    client_id: String,
    tenant: String,
    redirect_uri: String,
    scopes: Vec<String>,
    authority: String,
    http_client: reqwest::Client,
}

impl OAuth2Client {
    /// Create a new OAuth2 client from configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client_id: config.client_id.clone(),
            tenant: config.tenant_id.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scopes: SCOPES.iter().map(|s| s.to_string()).collect(),
            authority: DEFAULT_AUTHORITY.to_string(),
            http_client,
        })
    }

    /// Point the client at a different authority host. Tests use this to
    /// stand in a stub identity provider.
    #[cfg(test)]
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into();
        self
    }

    /// Generate the authorization URL for browser-based sign-in.
    ///
    /// Returns the URL and a CSRF state token that must be verified in the callback.
    pub fn generate_auth_url(&self, pkce: &PkceChallenge) -> (Url, String) {
        // Random state for CSRF protection
        let mut rng = rand::thread_rng();
        let state_bytes: Vec<u8> = (0..16).map(|_| rng.gen()).collect();
        let state = URL_SAFE_NO_PAD.encode(&state_bytes);

        let auth_endpoint = format!("{}/{}/oauth2/v2.0/authorize", self.authority, self.tenant);

        let mut url = Url::parse(&auth_endpoint).expect("Invalid auth endpoint");

        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_mode", "query")
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", &state)
            .append_pair("code_challenge", &pkce.challenge)
            .append_pair("code_challenge_method", "S256");

        (url, state)
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: &str,
    ) -> Result<TokenResponse, AuthError> {
        let token_endpoint = format!("{}/{}/oauth2/v2.0/token", self.authority, self.tenant);

        let params = [
            ("client_id", self.client_id.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code_verifier", pkce_verifier),
            ("scope", &self.scopes.join(" ")),
        ];

        let response = self
            .http_client
            .post(&token_endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::TokenExchangeFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            // Log error details for debugging (doesn't expose to user)
            let error_body = response.text().await.unwrap_or_default();
            tracing::error!("Token exchange failed: HTTP {} - {}", status, error_body);
            return Err(AuthError::TokenExchangeFailed(format!(
                "HTTP {}",
                status.as_u16()
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::TokenExchangeFailed(e.to_string()))?;

        Ok(token_response)
    }
}

/// Token response from Azure AD.
#[derive(Debug, serde::Deserialize)]
#[allow(dead_code)]
pub struct TokenResponse {
    /// The identity token asserting who signed in; the probe's bearer credential.
    pub id_token: Option<String>,
    pub token_type: String,
    pub expires_in: u64,
    #[serde(default)]
    pub scope: String,
}

/// Parse an OAuth callback URL to extract code and state.
pub fn parse_callback_url(url_string: &str) -> Result<(String, String), AuthError> {
    let url = Url::parse(url_string).map_err(|_| AuthError::InvalidAuthCode)?;

    let params: HashMap<_, _> = url.query_pairs().collect();

    // Check for error response
    if let Some(error) = params.get("error") {
        let description = params
            .get("error_description")
            .map(|s| s.to_string())
            .unwrap_or_else(|| error.to_string());
        return Err(AuthError::OAuthFailed(description));
    }

    let code = params
        .get("code")
        .ok_or(AuthError::InvalidAuthCode)?
        .to_string();

    let state = params
        .get("state")
        .ok_or(AuthError::StateValidationFailed)?
        .to_string();

    Ok((code, state))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            client_id: "test-client".into(),
            tenant_id: "test-tenant".into(),
            redirect_uri: "http://localhost:3000".into(),
            db_id: "5314cd18".into(),
        }
    }

    #[test]
    fn test_pkce_challenge_matches_verifier() {
        let pkce = PkceChallenge::new();

        // 64 random bytes → 86 base64url chars, well beyond RFC 7636's 43 minimum
        assert_eq!(pkce.verifier.len(), 86);

        // challenge == BASE64URL(SHA256(verifier)), computed independently
        use sha2::{Digest, Sha256};
        let expected = URL_SAFE_NO_PAD.encode(Sha256::digest(pkce.verifier.as_bytes()));
        assert_eq!(pkce.challenge, expected);
    }

    #[test]
    fn test_pkce_fresh_per_generation() {
        let a = PkceChallenge::new();
        let b = PkceChallenge::new();
        assert_ne!(a.verifier, b.verifier);
        assert_ne!(a.challenge, b.challenge);
    }

    #[test]
    fn test_auth_url_parameters() {
        let client = OAuth2Client::new(&test_config()).unwrap();
        let pkce = PkceChallenge::new();
        let (url, state) = client.generate_auth_url(&pkce);

        assert!(url.as_str().starts_with(
            "https://login.microsoftonline.com/test-tenant/oauth2/v2.0/authorize"
        ));

        let params: HashMap<_, _> = url.query_pairs().collect();
        assert_eq!(params["client_id"], "test-client");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["redirect_uri"], "http://localhost:3000");
        assert_eq!(params["scope"], "openid profile email");
        assert_eq!(params["state"], state.as_str());
        assert_eq!(params["code_challenge"], pkce.challenge.as_str());
        assert_eq!(params["code_challenge_method"], "S256");
    }

    #[test]
    fn test_parse_callback_success() {
        let url = "http://localhost:3000/?code=abc123&state=xyz789";
        let (code, state) = parse_callback_url(url).unwrap();
        assert_eq!(code, "abc123");
        assert_eq!(state, "xyz789");
    }

    #[test]
    fn test_parse_callback_error() {
        let url = "http://localhost:3000/?error=access_denied&error_description=User%20cancelled";
        let result = parse_callback_url(url);
        assert!(matches!(result, Err(AuthError::OAuthFailed(desc)) if desc == "User cancelled"));
    }

    #[test]
    fn test_parse_callback_missing_code() {
        let url = "http://localhost:3000/?state=xyz789";
        let result = parse_callback_url(url);
        assert!(matches!(result, Err(AuthError::InvalidAuthCode)));
    }

    #[tokio::test]
    async fn test_exchange_code_sends_verifier() {
        use wiremock::matchers::{body_string_contains, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/test-tenant/oauth2/v2.0/token"))
            .and(body_string_contains("code=abc123"))
            .and(body_string_contains("code_verifier=ver456"))
            .and(body_string_contains("grant_type=authorization_code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id_token": "tok123",
                "token_type": "Bearer",
                "expires_in": 3599,
                "scope": "openid profile email"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OAuth2Client::new(&test_config())
            .unwrap()
            .with_authority(server.uri());

        let token = client.exchange_code("abc123", "ver456").await.unwrap();
        assert_eq!(token.id_token.as_deref(), Some("tok123"));
    }

    #[tokio::test]
    async fn test_exchange_code_provider_rejection() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/test-tenant/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant"
            })))
            .mount(&server)
            .await;

        let client = OAuth2Client::new(&test_config())
            .unwrap()
            .with_authority(server.uri());

        let result = client.exchange_code("bad", "ver").await;
        assert!(matches!(result, Err(AuthError::TokenExchangeFailed(msg)) if msg == "HTTP 400"));
    }
}
