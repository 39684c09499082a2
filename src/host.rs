//! Host Integration
//!
//! The application embedding this crate owns the status display and the
//! "needs reconnect" flag. The socket core only writes status updates and
//! reads the flag; it never controls either.

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Connection status as shown by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Ok,
    Connecting,
    Disconnected,
    ConnectionFailure,
    BadConfig,
    UnknownError,
    UnknownWarning,
    AuthenticationFailure,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Connecting => "connecting",
            Self::Disconnected => "disconnected",
            Self::ConnectionFailure => "connection_failure",
            Self::BadConfig => "bad_config",
            Self::UnknownError => "unknown_error",
            Self::UnknownWarning => "unknown_warning",
            Self::AuthenticationFailure => "authentication_failure",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a host log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Status and log sink provided by the host.
///
/// Both calls are fire-and-forget. Implementations must not block.
pub trait StatusSink: Send + Sync {
    /// Report a status transition, with an optional human-readable detail.
    fn update_status(&self, status: ConnectionStatus, detail: Option<&str>);

    /// Write a log line to the host's log. Defaults to `tracing`.
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => debug!("{}", message),
            LogLevel::Info => info!("{}", message),
            LogLevel::Warn => warn!("{}", message),
            LogLevel::Error => error!("{}", message),
        }
    }
}

/// A sink that only records status changes in the trace log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingStatus;

impl StatusSink for TracingStatus {
    fn update_status(&self, status: ConnectionStatus, detail: Option<&str>) {
        match detail {
            Some(detail) => info!(status = %status, detail = %detail, "Status changed"),
            None => info!(status = %status, "Status changed"),
        }
    }
}

/// Everything the socket core needs from its owner.
#[derive(Clone)]
pub struct Host {
    status: Arc<dyn StatusSink>,
    needs_reconnect: watch::Receiver<bool>,
}

impl Host {
    /// Create a host context from a status sink and the reconnect signal.
    ///
    /// The host sends `true` on the matching `watch::Sender` when the whole
    /// operation must be abandoned and restarted.
    pub fn new(status: Arc<dyn StatusSink>, needs_reconnect: watch::Receiver<bool>) -> Self {
        Self {
            status,
            needs_reconnect,
        }
    }

    /// A host whose reconnect signal can never be raised.
    pub fn without_reconnect(status: Arc<dyn StatusSink>) -> Self {
        let (_tx, rx) = watch::channel(false);
        Self::new(status, rx)
    }

    /// Current value of the reconnect signal.
    pub fn needs_reconnect(&self) -> bool {
        *self.needs_reconnect.borrow()
    }

    pub fn update_status(&self, status: ConnectionStatus, detail: Option<&str>) {
        self.status.update_status(status, detail);
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        self.status.log(level, message);
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("needs_reconnect", &self.needs_reconnect())
            .finish_non_exhaustive()
    }
}
