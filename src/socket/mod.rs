//! Home Assistant Socket Connection Module
//!
//! Establishes an authenticated websocket to Home Assistant, retrying
//! transient failures and giving up immediately on rejected credentials.
//!
//! # Architecture
//!
//! | Module      | Responsibility                                      |
//! |-------------|-----------------------------------------------------|
//! | `transport` | Websocket open/send/close and event delivery        |
//! | `protocol`  | JSON auth-phase messages                            |
//! | `auth`      | Access token capability and websocket URL           |
//! | `handshake` | One attempt: open, authenticate, classify the end   |
//! | `session`   | An authenticated, ready-to-use connection           |
//! | `client`    | Retry loop, budget, reconnect signal                |
//!
//! # Flow
//!
//! ```text
//! create_socket ──┬── needs_reconnect? ──> ConnectionLost
//!                 │
//!                 ├── attempt ──> Session            (auth_ok)
//!                 │         └──> AttemptEnd          (close / error)
//!                 │
//!                 └── invalid auth? ──> InvalidAuth
//!                     budget left?  ──> sleep, next attempt
//!                     otherwise     ──> CannotConnect
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use hass_socket::socket::{create_socket, ConnectOptions, LongLivedToken, WsConnector};
//! use hass_socket::{Host, TracingStatus};
//!
//! let mut auth = LongLivedToken::new("http://homeassistant.local:8123", token)?;
//! let host = Host::without_reconnect(Arc::new(TracingStatus));
//! let session = create_socket(&mut auth, &WsConnector::default(), &ConnectOptions::default(), &host).await?;
//! println!("Home Assistant {}", session.ha_version());
//! ```

mod auth;
mod client;
mod handshake;
mod protocol;
mod session;
mod transport;

pub use auth::{websocket_url, AuthProvider, LongLivedToken};
pub use client::{create_socket, ConnectOptions, RetryBudget};
pub use handshake::{AttemptEnd, CredentialFailure, Handshake, HandshakeAction, HandshakeState};
pub use protocol::{AuthMessage, IncomingMessage};
pub use session::Session;
pub use transport::{Connector, Transport, TransportEvent, WsConnector, WsTransport, CLOSE_TIMEOUT, NORMAL_CLOSE};
