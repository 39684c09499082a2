//! End-to-end handshake over a real websocket
//!
//! A minimal auth-phase server runs on a local port with `tokio-tungstenite`,
//! and `create_socket` connects to it through `WsConnector`. The TLS variant
//! presents a freshly generated self-signed certificate.

use futures_util::{SinkExt, StreamExt};
use hass_socket::socket::{create_socket, ConnectOptions, LongLivedToken, RetryBudget, WsConnector};
use hass_socket::{ConnectError, Host, TracingStatus};
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

const VALID_TOKEN: &str = "valid-token";

/// What the server does with each accepted connection, in order.
#[derive(Clone, Copy)]
enum Behavior {
    /// Complete the auth phase, accepting only `VALID_TOKEN`
    Authenticate,
    /// Accept the websocket, then drop the TCP connection
    Drop,
    /// Reject the token, then keep the connection open without reading
    RejectAndHang,
}

async fn serve<S>(mut ws: WebSocketStream<S>, behavior: Behavior)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Behavior::Drop = behavior {
        drop(ws);
        return;
    }

    ws.send(Message::Text(
        r#"{"type":"auth_required","ha_version":"2024.1.0"}"#.into(),
    ))
    .await
    .unwrap();

    let request = ws.next().await.unwrap().unwrap().into_text().unwrap();
    let request: serde_json::Value = serde_json::from_str(&request).unwrap();
    assert_eq!(request["type"], "auth");

    let accepted = matches!(behavior, Behavior::Authenticate) && request["access_token"] == VALID_TOKEN;
    let reply = if accepted {
        r#"{"type":"auth_ok","ha_version":"2024.1.0"}"#
    } else {
        r#"{"type":"auth_invalid","message":"Invalid access token or password"}"#
    };
    ws.send(Message::Text(reply.into())).await.unwrap();

    if let Behavior::RejectAndHang = behavior {
        // Never answer the client's close frame
        tokio::time::sleep(Duration::from_secs(60)).await;
        return;
    }

    // Drain until the client closes, flushing our close reply
    while let Some(Ok(_)) = ws.next().await {}
}

async fn spawn_server(behaviors: Vec<Behavior>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        for behavior in behaviors {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            serve(ws, behavior).await;
        }
    });

    addr
}

fn self_signed_acceptor() -> TlsAcceptor {
    let certified =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string(), "127.0.0.1".to_string()])
            .unwrap();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der()));

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![certified.cert.der().clone()], key)
        .unwrap();
    TlsAcceptor::from(Arc::new(config))
}

/// Serve `connections` TLS connections with a self-signed certificate.
async fn spawn_tls_server(connections: usize) -> SocketAddr {
    let acceptor = self_signed_acceptor();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        for _ in 0..connections {
            let (stream, _) = listener.accept().await.unwrap();
            // A verifying client aborts the TLS handshake
            let Ok(tls) = acceptor.accept(stream).await else {
                continue;
            };
            let ws = tokio_tungstenite::accept_async(tls).await.unwrap();
            serve(ws, Behavior::Authenticate).await;
        }
    });

    addr
}

fn options(max_retries: RetryBudget) -> ConnectOptions {
    ConnectOptions {
        ignore_certificates: false,
        max_retries,
        retry_delay: Duration::from_millis(10),
    }
}

fn host() -> Host {
    Host::without_reconnect(Arc::new(TracingStatus))
}

#[tokio::test]
async fn test_authenticates_against_local_server() {
    let addr = spawn_server(vec![Behavior::Authenticate]).await;
    let mut auth = LongLivedToken::new(&format!("http://{}", addr), VALID_TOKEN).unwrap();

    let session = create_socket(
        &mut auth,
        &WsConnector::default(),
        &options(RetryBudget::Limited(0)),
        &host(),
    )
    .await
    .unwrap();

    assert_eq!(session.ha_version(), "2024.1.0");
    assert!(session.transport().is_open());
    session.close().await;
}

#[tokio::test]
async fn test_rejected_token_is_invalid_auth() {
    let addr = spawn_server(vec![Behavior::Authenticate, Behavior::Authenticate]).await;
    let mut auth = LongLivedToken::new(&format!("http://{}", addr), "wrong-token").unwrap();

    let result = create_socket(
        &mut auth,
        &WsConnector::default(),
        &options(RetryBudget::Unlimited),
        &host(),
    )
    .await;

    assert_eq!(result.unwrap_err(), ConnectError::InvalidAuth);
}

#[tokio::test]
async fn test_unanswered_close_times_out_as_invalid_auth() {
    let addr = spawn_server(vec![Behavior::RejectAndHang]).await;
    let mut auth = LongLivedToken::new(&format!("http://{}", addr), VALID_TOKEN).unwrap();
    let connector = WsConnector::with_close_timeout(Duration::from_millis(200));

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        create_socket(&mut auth, &connector, &options(RetryBudget::Unlimited), &host()),
    )
    .await
    .expect("create_socket resolves once the close times out");

    assert_eq!(result.unwrap_err(), ConnectError::InvalidAuth);
}

#[tokio::test]
async fn test_dropped_connection_is_retried() {
    let addr = spawn_server(vec![Behavior::Drop, Behavior::Authenticate]).await;
    let mut auth = LongLivedToken::new(&format!("http://{}", addr), VALID_TOKEN).unwrap();

    let session = create_socket(
        &mut auth,
        &WsConnector::default(),
        &options(RetryBudget::Limited(1)),
        &host(),
    )
    .await
    .unwrap();

    assert_eq!(session.ha_version(), "2024.1.0");
}

#[tokio::test]
async fn test_refused_connection_exhausts_budget() {
    // Reserve a port, then free it so nothing is listening
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut auth = LongLivedToken::new(&format!("http://{}", addr), VALID_TOKEN).unwrap();

    let result = create_socket(
        &mut auth,
        &WsConnector::default(),
        &options(RetryBudget::Limited(1)),
        &host(),
    )
    .await;

    assert_eq!(result.unwrap_err(), ConnectError::CannotConnect);
}

#[tokio::test]
async fn test_ignore_certificates_accepts_self_signed_server() {
    let addr = spawn_tls_server(1).await;
    let mut auth = LongLivedToken::new(&format!("https://{}", addr), VALID_TOKEN).unwrap();
    let opts = ConnectOptions {
        ignore_certificates: true,
        ..options(RetryBudget::Limited(0))
    };

    let session = create_socket(&mut auth, &WsConnector::default(), &opts, &host())
        .await
        .unwrap();

    assert_eq!(session.ha_version(), "2024.1.0");
    assert!(session.transport().is_open());
    session.close().await;
}

#[tokio::test]
async fn test_self_signed_server_is_rejected_by_default() {
    let addr = spawn_tls_server(1).await;
    let mut auth = LongLivedToken::new(&format!("https://{}", addr), VALID_TOKEN).unwrap();

    let result = create_socket(
        &mut auth,
        &WsConnector::default(),
        &options(RetryBudget::Limited(0)),
        &host(),
    )
    .await;

    assert_eq!(result.unwrap_err(), ConnectError::CannotConnect);
}
