//! HTTP remote implementation using `reqwest`.
//!
//! This module provides [`HttpRemote`], a [`RemoteClient`] implementation
//! that sends each [`Request`] as a JSON HTTP request to a base URL. Both
//! `http://` and `https://` URLs are supported (TLS via `rustls`).
//!
//! # Feature gate
//!
//! This module is only available when the `transport-http` feature is enabled
//! (it is enabled by default).
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), lobby_session_client::SessionError> {
//! use lobby_session_client::protocol::{Method, Request, PATH_LOBBY};
//! use lobby_session_client::{HttpRemote, RemoteClient};
//!
//! let remote = HttpRemote::new("http://localhost:8000")?;
//! let lobbies = remote.request(Request::new(Method::Get, PATH_LOBBY)).await?;
//! println!("open lobbies: {lobbies}");
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::SessionError;
use crate::protocol::{Method, Request};
use crate::remote::RemoteClient;

/// A [`RemoteClient`] backed by a `reqwest` HTTP client.
///
/// # Construction
///
/// Use [`HttpRemote::new`] for a client with default settings, or
/// [`HttpRemote::from_client`] to bring a preconfigured `reqwest::Client`
/// (proxies, custom TLS roots, default headers).
///
/// # Cancel Safety
///
/// Dropping the future returned by [`request`](RemoteClient::request) aborts
/// the HTTP exchange; the connection pool stays usable.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemote {
    /// Create a remote for the server at `base_url` (e.g. `"http://localhost:8000"`).
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::TransportFailure`] if the URL is not `http(s)`
    /// or the HTTP client cannot be initialised.
    pub fn new(base_url: impl Into<String>) -> Result<Self, SessionError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| SessionError::TransportFailure(format!("http client init failed: {e}")))?;
        Self::from_client(client, base_url)
    }

    /// Create a remote that uses an existing `reqwest::Client`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::TransportFailure`] if the URL is not `http(s)`.
    pub fn from_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
    ) -> Result<Self, SessionError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(SessionError::TransportFailure(format!(
                "unsupported server URL: {base_url}"
            )));
        }
        tracing::debug!(url = %base_url, "HTTP remote configured");
        Ok(Self { client, base_url })
    }

    /// Create a remote whose requests time out after `timeout`.
    ///
    /// Timeouts surface as [`SessionError::Timeout`].
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SessionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SessionError::TransportFailure(format!("http client init failed: {e}")))?;
        Self::from_client(client, base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

fn method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
    }
}

fn transport_error(e: &reqwest::Error) -> SessionError {
    if e.is_timeout() {
        SessionError::Timeout
    } else {
        SessionError::TransportFailure(e.to_string())
    }
}

/// Pull a human-readable reason out of an error body.
///
/// Understands `{"detail": "..."}`, `{"message": "..."}` and `{"error": "..."}`,
/// and falls back to a short plain-text body.
fn rejection_message(body: &[u8]) -> Option<String> {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        return ["detail", "message", "error"]
            .iter()
            .find_map(|key| value.get(key).and_then(Value::as_str))
            .map(str::to_string);
    }
    let text = std::str::from_utf8(body).ok()?.trim();
    (!text.is_empty() && text.len() <= 200).then(|| text.to_string())
}

#[async_trait]
impl RemoteClient for HttpRemote {
    async fn request(&self, request: Request) -> Result<Value, SessionError> {
        let url = self.url(request.path);
        tracing::debug!(method = %request.method, url = %url, "sending HTTP request");

        let mut builder = self.client.request(method(request.method), &url);
        if let Some(token) = &request.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| transport_error(&e))?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| transport_error(&e))?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            tracing::debug!(url = %url, "server refused the token");
            return Err(SessionError::AuthInvalid);
        }
        if !status.is_success() {
            tracing::debug!(url = %url, status = status.as_u16(), "request rejected");
            return Err(SessionError::rejected(
                status.as_u16(),
                rejection_message(&body),
            ));
        }
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_urls() {
        assert!(matches!(
            HttpRemote::new("ws://localhost:8000"),
            Err(SessionError::TransportFailure(_))
        ));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let remote = HttpRemote::new("http://localhost:8000/").unwrap();
        assert_eq!(remote.url("/lobby/join"), "http://localhost:8000/lobby/join");
    }

    #[test]
    fn rejection_message_variants() {
        assert_eq!(
            rejection_message(br#"{"detail":"Lobby is full"}"#).as_deref(),
            Some("Lobby is full")
        );
        assert_eq!(
            rejection_message(br#"{"message":"nope"}"#).as_deref(),
            Some("nope")
        );
        assert_eq!(rejection_message(b"Not Found").as_deref(), Some("Not Found"));
        assert_eq!(rejection_message(b"{\"detail\":[{\"loc\":1}]}"), None);
        assert_eq!(rejection_message(b""), None);
    }
}
