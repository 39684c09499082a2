//! Access Token Capability
//!
//! Single responsibility: Supply the websocket URL and the access token.
//!
//! Token storage and refresh belong to the caller. The socket core only asks
//! whether the token is expired, triggers a refresh if so, and reads the
//! current token when it is time to authenticate.

use async_trait::async_trait;
use url::Url;

use crate::error::{ConnectError, RefreshError};

const WEBSOCKET_PATH: &str = "/api/websocket";

/// Credentials and endpoint for one Home Assistant instance.
#[async_trait]
pub trait AuthProvider: Send {
    /// Websocket endpoint, e.g. `wss://example.org/api/websocket`.
    fn ws_url(&self) -> &str;

    /// The current access token. May be stale if [`AuthProvider::expired`].
    fn access_token(&self) -> &str;

    /// Whether the access token must be refreshed before use.
    fn expired(&self) -> bool;

    /// Obtain a fresh access token.
    async fn refresh_access_token(&mut self) -> Result<(), RefreshError>;
}

/// A long-lived access token, as created from a Home Assistant user profile.
///
/// These tokens never expire, so refresh is never attempted by the
/// handshake. Calling it directly always fails.
#[derive(Clone)]
pub struct LongLivedToken {
    ws_url: String,
    token: String,
}

impl LongLivedToken {
    /// Build from the instance URL (`http://host:8123`) and a token.
    pub fn new(hass_url: &str, token: impl Into<String>) -> Result<Self, ConnectError> {
        Ok(Self {
            ws_url: websocket_url(hass_url)?,
            token: token.into(),
        })
    }
}

impl std::fmt::Debug for LongLivedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LongLivedToken")
            .field("ws_url", &self.ws_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl AuthProvider for LongLivedToken {
    fn ws_url(&self) -> &str {
        &self.ws_url
    }

    fn access_token(&self) -> &str {
        &self.token
    }

    fn expired(&self) -> bool {
        false
    }

    async fn refresh_access_token(&mut self) -> Result<(), RefreshError> {
        Err(RefreshError(
            "long-lived access tokens cannot be refreshed".into(),
        ))
    }
}

/// Derive the websocket endpoint from a Home Assistant instance URL.
///
/// `http://` becomes `ws://`, `https://` becomes `wss://`, and the websocket
/// API path is appended. URLs already using a websocket scheme keep it.
/// An empty or non-http(s)/ws(s) URL is a configuration error.
pub fn websocket_url(hass_url: &str) -> Result<String, ConnectError> {
    let trimmed = hass_url.trim();
    if trimmed.is_empty() {
        return Err(ConnectError::HostRequired);
    }

    let mut url = Url::parse(trimmed).map_err(|_| ConnectError::HostRequired)?;
    if url.host_str().is_none() {
        return Err(ConnectError::HostRequired);
    }

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        _ => return Err(ConnectError::HostRequired),
    };
    url.set_scheme(scheme)
        .map_err(|_| ConnectError::HostRequired)?;

    let path = url.path().trim_end_matches('/').to_string();
    if !path.ends_with(WEBSOCKET_PATH) {
        url.set_path(&format!("{}{}", path, WEBSOCKET_PATH));
    }
    url.set_query(None);
    url.set_fragment(None);

    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_url_from_http() {
        assert_eq!(
            websocket_url("http://homeassistant.local:8123").unwrap(),
            "ws://homeassistant.local:8123/api/websocket"
        );
        assert_eq!(
            websocket_url("https://example.org/").unwrap(),
            "wss://example.org/api/websocket"
        );
    }

    #[test]
    fn test_websocket_url_keeps_existing_path() {
        assert_eq!(
            websocket_url("wss://example.org/api/websocket").unwrap(),
            "wss://example.org/api/websocket"
        );
        assert_eq!(
            websocket_url("https://example.org/ha").unwrap(),
            "wss://example.org/ha/api/websocket"
        );
    }

    #[test]
    fn test_websocket_url_requires_host() {
        assert_eq!(websocket_url(""), Err(ConnectError::HostRequired));
        assert_eq!(websocket_url("   "), Err(ConnectError::HostRequired));
        assert_eq!(websocket_url("homeassistant"), Err(ConnectError::HostRequired));
        assert_eq!(websocket_url("ftp://example.org"), Err(ConnectError::HostRequired));
    }

    #[tokio::test]
    async fn test_long_lived_token_never_expires() {
        let mut auth = LongLivedToken::new("http://localhost:8123", "abc").unwrap();
        assert!(!auth.expired());
        assert_eq!(auth.access_token(), "abc");
        assert_eq!(auth.ws_url(), "ws://localhost:8123/api/websocket");
        assert!(auth.refresh_access_token().await.is_err());
    }

    #[test]
    fn test_debug_redacts_token() {
        let auth = LongLivedToken::new("http://localhost:8123", "secret").unwrap();
        assert!(!format!("{:?}", auth).contains("secret"));
    }
}
