//! Local HTTP callback listener for OAuth authentication.
//!
//! Binds a temporary localhost listener on the host:port of the redirect
//! URI, waits for the single browser redirect carrying the authorization
//! code, and hands the connection back so the caller can answer the browser
//! once the token exchange has settled.

use crate::error::AuthError;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

/// How long to wait for the browser redirect before giving up.
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(120);

/// One-shot callback listener.
pub struct CallbackServer {
    listener: TcpListener,
}

impl CallbackServer {
    /// Bind the listener on `addr` (host:port taken from the redirect URI).
    pub async fn bind(addr: &str) -> Result<Self, AuthError> {
        let listener = TcpListener::bind(addr).await?;
        info!("OAuth callback listener bound on {}", addr);
        Ok(Self { listener })
    }

    /// The bound socket address (useful when binding port 0 in tests).
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, AuthError> {
        Ok(self.listener.local_addr()?)
    }

    /// Wait for a redirect that carries a `code` or `error` query parameter.
    ///
    /// Returns the reconstructed callback URL and the still-open connection;
    /// the caller answers the browser with [`send_success_page`] or
    /// [`send_error_page`] after the token exchange. Requests without either
    /// parameter (stray probes, `/favicon.ico`) are answered with 404 and the
    /// listener keeps waiting.
    pub async fn recv_callback(&self) -> Result<(String, TcpStream), AuthError> {
        loop {
            let (mut stream, peer_addr) = self.listener.accept().await?;
            debug!("Connection from {}", peer_addr);

            let Some(path) = read_request_path(&mut stream).await else {
                send_response(&mut stream, 400, "Bad Request").await;
                continue;
            };

            if !path.contains("code=") && !path.contains("error=") {
                // Not the redirect we are waiting for; stay in AwaitingRedirect
                send_response(&mut stream, 404, "Not Found").await;
                continue;
            }

            info!("OAuth callback received");
            let local = self.local_addr()?;
            return Ok((format!("http://{local}{path}"), stream));
        }
    }
}

/// Read one HTTP request and return the path of a GET, or `None` for anything else.
async fn read_request_path(stream: &mut TcpStream) -> Option<String> {
    let mut buffer = [0; 4096];
    let bytes_read = match stream.read(&mut buffer).await {
        Ok(n) => n,
        Err(e) => {
            debug!("Failed to read request: {}", e);
            return None;
        }
    };

    let request = String::from_utf8_lossy(&buffer[..bytes_read]);
    let request_line = request.lines().next()?;
    debug!("Received request: {}", request_line);

    let mut parts = request_line.split_whitespace();
    let method = parts.next()?;
    let path = parts.next()?;

    if method != "GET" {
        return None;
    }

    Some(path.to_string())
}

/// Answer the browser after a successful sign-in.
pub async fn send_success_page(stream: &mut TcpStream) {
    let html = "<!DOCTYPE html>\
<html><head><title>Login successful</title></head>\
<body><h1>Login successful</h1>\
<p>You may close this window.</p></body></html>";
    send_html(stream, html).await;
}

/// Answer the browser after a failed sign-in.
pub async fn send_error_page(stream: &mut TcpStream, description: &str) {
    let html = format!(
        "<!DOCTYPE html>\
<html><head><title>Login failed</title></head>\
<body><h1>Login failed</h1>\
<p>{description}</p>\
<p>You may close this window and try again.</p></body></html>"
    );
    send_html(stream, &html).await;
}

async fn send_html(stream: &mut TcpStream, html: &str) {
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        html.len(),
        html
    );

    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.flush().await;
}

async fn send_response(stream: &mut TcpStream, status: u16, message: &str) {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        message,
        message.len(),
        message
    );

    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.flush().await;
}
