//! hass-socket - Authenticated Home Assistant websocket connections
//!
//! Opens the Home Assistant websocket API, completes the access-token
//! handshake, and hands back a ready-to-use connection.
//!
//! ## Failure Handling
//!
//! | Failure                        | Retried? | Result           |
//! |--------------------------------|----------|------------------|
//! | Network drop, TLS error, close | Yes      | `CannotConnect`  |
//! | `auth_invalid`, refresh failed | No       | `InvalidAuth`    |
//! | Host reconnect signal raised   | No       | `ConnectionLost` |
//! | Missing / unusable URL         | No       | `HostRequired`   |
//!
//! The command protocol that follows `auth_ok` is not part of this crate.

pub mod config;
pub mod error;
pub mod host;
pub mod socket;

// Re-exports
pub use config::Config;
pub use error::{error_code_name, ConnectError};
pub use host::{ConnectionStatus, Host, LogLevel, StatusSink, TracingStatus};
pub use socket::{create_socket, ConnectOptions, RetryBudget, Session};
