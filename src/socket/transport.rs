//! WebSocket Transport Layer
//!
//! Single responsibility: Open a websocket and deliver its lifecycle as a
//! stream of events. No knowledge of authentication or retries.
//!
//! A transport is created unopened. The first call to `next_event` performs
//! the connection and yields either `Open` or `Error`. After that it yields
//! text messages until a single terminal `Close` or `Error`, then `None`.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};
use tokio_tungstenite::{
    connect_async_tls_with_config,
    tungstenite::protocol::{frame::coding::CloseCode, CloseFrame, Message},
    Connector as TlsConnector, MaybeTlsStream, WebSocketStream,
};
use tracing::debug;

use crate::error::TransportError;

/// Close code for an orderly shutdown.
pub const NORMAL_CLOSE: u16 = 1000;

/// Close code for a connection that dropped without a close frame.
const ABNORMAL_CLOSE: u16 = 1006;

/// Close code used when the peer sent a close frame without a status.
const NO_STATUS_CLOSE: u16 = 1005;

/// How long to wait for the peer to answer our close frame.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Lifecycle event delivered by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Open,
    Message(String),
    Close {
        code: u16,
        reason: String,
        was_clean: bool,
    },
    Error(Option<String>),
}

/// A message-oriented socket.
#[async_trait]
pub trait Transport: Send {
    /// Wait for the next event. `None` once the transport has finished.
    async fn next_event(&mut self) -> Option<TransportEvent>;

    /// Send a text frame.
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Begin closing. The resulting `Close` is delivered by `next_event`.
    async fn close(&mut self);
}

/// Factory for transports.
pub trait Connector: Send + Sync {
    type Transport: Transport;

    /// Create an unopened transport for `url`.
    fn open(&self, url: &str, ignore_certificates: bool) -> Self::Transport;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum WsState {
    Pending {
        url: String,
        ignore_certificates: bool,
    },
    Open(WsStream),
    Closed,
}

/// Connects [`WsTransport`]s with `tokio-tungstenite`.
#[derive(Debug, Clone, Copy)]
pub struct WsConnector {
    close_timeout: Duration,
}

impl Default for WsConnector {
    fn default() -> Self {
        Self {
            close_timeout: CLOSE_TIMEOUT,
        }
    }
}

impl WsConnector {
    /// Give up on an unanswered close after `close_timeout` instead of
    /// [`CLOSE_TIMEOUT`].
    pub fn with_close_timeout(close_timeout: Duration) -> Self {
        Self { close_timeout }
    }
}

impl Connector for WsConnector {
    type Transport = WsTransport;

    fn open(&self, url: &str, ignore_certificates: bool) -> WsTransport {
        WsTransport {
            state: WsState::Pending {
                url: url.to_string(),
                ignore_certificates,
            },
            queued: None,
            close_timeout: self.close_timeout,
            close_deadline: None,
        }
    }
}

/// A websocket over TCP, optionally TLS.
pub struct WsTransport {
    state: WsState,
    /// Terminal event produced by `close()` before the socket opened
    queued: Option<TransportEvent>,
    close_timeout: Duration,
    /// Set once we sent a close frame; the peer must answer before this
    close_deadline: Option<Instant>,
}

impl std::fmt::Debug for WsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            WsState::Pending { url, .. } => format!("pending({})", url),
            WsState::Open(_) => "open".to_string(),
            WsState::Closed => "closed".to_string(),
        };
        f.debug_struct("WsTransport").field("state", &state).finish()
    }
}

impl WsTransport {
    /// Whether the underlying websocket is currently open.
    pub fn is_open(&self) -> bool {
        matches!(self.state, WsState::Open(_))
    }

    /// Give up the websocket stream, if open.
    pub fn into_inner(self) -> Option<WebSocketStream<MaybeTlsStream<TcpStream>>> {
        match self.state {
            WsState::Open(ws) => Some(ws),
            _ => None,
        }
    }

    async fn connect(url: &str, ignore_certificates: bool) -> Result<WsStream, String> {
        debug!(url = %url, ignore_certificates, "Connecting to WebSocket");

        let connector = if ignore_certificates {
            Some(insecure_connector().map_err(|e| e.to_string())?)
        } else {
            None
        };

        let (ws, _) = connect_async_tls_with_config(url, None, false, connector)
            .await
            .map_err(|e| format!("WebSocket connect failed: {}", e))?;

        debug!(url = %url, "WebSocket connected");
        Ok(ws)
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn next_event(&mut self) -> Option<TransportEvent> {
        if let Some(event) = self.queued.take() {
            return Some(event);
        }

        match std::mem::replace(&mut self.state, WsState::Closed) {
            WsState::Pending {
                url,
                ignore_certificates,
            } => match Self::connect(&url, ignore_certificates).await {
                Ok(ws) => {
                    self.state = WsState::Open(ws);
                    Some(TransportEvent::Open)
                }
                Err(message) => Some(TransportEvent::Error(Some(message))),
            },
            WsState::Open(mut ws) => {
                let event = match self.close_deadline {
                    Some(deadline) => match timeout_at(deadline, next_ws_event(&mut ws)).await {
                        Ok(event) => event,
                        Err(_) => {
                            debug!("Peer did not answer the close frame, dropping websocket");
                            return Some(TransportEvent::Close {
                                code: ABNORMAL_CLOSE,
                                reason: "close timed out".into(),
                                was_clean: false,
                            });
                        }
                    },
                    None => next_ws_event(&mut ws).await,
                };
                if !matches!(event, TransportEvent::Message(_)) {
                    return Some(event);
                }
                self.state = WsState::Open(ws);
                Some(event)
            }
            WsState::Closed => None,
        }
    }

    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        match &mut self.state {
            WsState::Open(ws) => ws
                .send(Message::Text(text))
                .await
                .map_err(|e| TransportError::Send(e.to_string())),
            _ => Err(TransportError::NotOpen),
        }
    }

    async fn close(&mut self) {
        match &mut self.state {
            WsState::Open(ws) => {
                if self.close_deadline.is_some() {
                    return;
                }
                // Keep reading until the peer acknowledges with its own close frame
                let deadline = Instant::now() + self.close_timeout;
                self.close_deadline = Some(deadline);
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: "".into(),
                };
                match timeout_at(deadline, ws.close(Some(frame))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => debug!(error = %e, "Failed to send close frame"),
                    Err(_) => debug!("Timed out sending close frame"),
                }
            }
            WsState::Pending { .. } => {
                self.state = WsState::Closed;
                self.queued = Some(TransportEvent::Close {
                    code: ABNORMAL_CLOSE,
                    reason: "closed before open".into(),
                    was_clean: false,
                });
            }
            WsState::Closed => {}
        }
    }
}

/// Read frames until something the handshake cares about arrives.
async fn next_ws_event(ws: &mut WsStream) -> TransportEvent {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return TransportEvent::Message(text),
            Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                Ok(text) => return TransportEvent::Message(text),
                Err(_) => {
                    debug!("Skipping non-UTF-8 binary frame");
                    continue;
                }
            },
            Some(Ok(Message::Close(frame))) => {
                let (code, reason) = match frame {
                    Some(frame) => (u16::from(frame.code), frame.reason.into_owned()),
                    None => (NO_STATUS_CLOSE, String::new()),
                };
                return TransportEvent::Close {
                    code,
                    reason,
                    was_clean: true,
                };
            }
            // Pong is handled automatically by tungstenite
            Some(Ok(_)) => continue,
            Some(Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed)) => {
                return TransportEvent::Close {
                    code: u16::from(CloseCode::Normal),
                    reason: String::new(),
                    was_clean: true,
                }
            }
            Some(Err(e)) => return TransportEvent::Error(Some(e.to_string())),
            None => {
                return TransportEvent::Close {
                    code: ABNORMAL_CLOSE,
                    reason: String::new(),
                    was_clean: false,
                }
            }
        }
    }
}

/// TLS connector that accepts any server certificate.
fn insecure_connector() -> Result<TlsConnector, TransportError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| TransportError::Tls(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate { provider }))
        .with_no_client_auth();
    Ok(TlsConnector::Rustls(Arc::new(config)))
}

#[derive(Debug)]
struct AcceptAnyCertificate {
    provider: Arc<rustls::crypto::CryptoProvider>,
}

impl rustls::client::danger::ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
