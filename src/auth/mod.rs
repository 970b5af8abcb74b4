//! Azure AD authentication module.
//!
//! OAuth2 authorization-code flow with PKCE: authorization URL generation,
//! the local callback listener, and the code-for-token exchange.

pub mod callback_server;
pub mod oauth;

use crate::error::AuthError;
use callback_server::{send_error_page, send_success_page, CallbackServer, CALLBACK_TIMEOUT};
use oauth::{parse_callback_url, OAuth2Client, PkceChallenge};
use tracing::info;
use zeroize::Zeroizing;

/// Wait for the browser redirect and exchange its code for an identity token.
///
/// The caller has already bound `server`, generated the auth URL with
/// `expected_state`, and opened the browser. The browser connection is
/// answered with a success or error page once the exchange settles, and the
/// listener is dropped either way. Bounded by [`CALLBACK_TIMEOUT`].
pub async fn complete_sign_in(
    server: CallbackServer,
    client: &OAuth2Client,
    pkce: &PkceChallenge,
    expected_state: &str,
) -> Result<Zeroizing<String>, AuthError> {
    let (url, mut stream) = tokio::time::timeout(CALLBACK_TIMEOUT, server.recv_callback())
        .await
        .map_err(|_| AuthError::CallbackTimeout)??;

    let (code, state) = match parse_callback_url(&url) {
        Ok(parsed) => parsed,
        Err(e) => {
            send_error_page(&mut stream, &e.to_string()).await;
            return Err(e);
        }
    };

    if state != expected_state {
        send_error_page(&mut stream, "State mismatch.").await;
        return Err(AuthError::StateValidationFailed);
    }

    match client.exchange_code(&code, &pkce.verifier).await {
        Ok(token_response) => match token_response.id_token {
            Some(id_token) => {
                send_success_page(&mut stream).await;
                info!("Sign-in successful, identity token acquired");
                Ok(Zeroizing::new(id_token))
            }
            None => {
                send_error_page(&mut stream, "Provider returned no identity token.").await;
                Err(AuthError::TokenExchangeFailed(
                    "token response missing id_token".to_string(),
                ))
            }
        },
        Err(e) => {
            send_error_page(&mut stream, "Error retrieving token.").await;
            Err(e)
        }
    }
}
