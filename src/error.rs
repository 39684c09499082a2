//! Error types for hass-socket

use thiserror::Error;

/// Terminal classification of a connection attempt sequence.
///
/// This is the only error `create_socket` ever returns. Raw transport
/// failures are folded into one of these kinds before they leave an attempt.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectError {
    /// Retry budget exhausted without ever authenticating
    #[error("Cannot connect to Home Assistant")]
    CannotConnect,

    /// Server rejected the credentials, or the token refresh failed
    #[error("Invalid authentication")]
    InvalidAuth,

    /// The host asked for a restart before or between attempts
    #[error("Connection lost")]
    ConnectionLost,

    /// No usable Home Assistant URL was configured
    #[error("Home Assistant host is required")]
    HostRequired,
}

impl ConnectError {
    /// Numeric code used by the upstream websocket library.
    pub fn code(&self) -> i32 {
        match self {
            Self::CannotConnect => 1,
            Self::InvalidAuth => 2,
            Self::ConnectionLost => 3,
            Self::HostRequired => 4,
        }
    }

    /// Stable upper-case name, suitable for status reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CannotConnect => "ERR_CANNOT_CONNECT",
            Self::InvalidAuth => "ERR_INVALID_AUTH",
            Self::ConnectionLost => "ERR_CONNECTION_LOST",
            Self::HostRequired => "ERR_HASS_HOST_REQUIRED",
        }
    }

    /// Reverse of [`ConnectError::code`].
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::CannotConnect),
            2 => Some(Self::InvalidAuth),
            3 => Some(Self::ConnectionLost),
            4 => Some(Self::HostRequired),
            _ => None,
        }
    }
}

/// Render a numeric error code the way status reports show it.
pub fn error_code_name(code: i32) -> String {
    match ConnectError::from_code(code) {
        Some(err) => err.name().to_string(),
        None => format!("UNKNOWN {}", code),
    }
}

/// Failure reported by a transport operation.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Transport is not open")]
    NotOpen,

    #[error("Failed to send: {0}")]
    Send(String),

    #[error("TLS setup failed: {0}")]
    Tls(String),
}

/// Failure reported by an auth provider's refresh operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Access token refresh failed: {0}")]
pub struct RefreshError(pub String);

/// Failure loading or saving configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
