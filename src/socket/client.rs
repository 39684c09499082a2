//! Connection Retry Loop
//!
//! Single responsibility: Turn a series of handshake attempts into exactly one
//! outcome, a `Session` or a `ConnectError`.
//!
//! # Retry Policy
//!
//! Before each attempt:
//! 1. If the host raised its reconnect signal, give up with `ConnectionLost`
//! 2. Report `connecting` and run one handshake
//!
//! When an attempt ends without authenticating:
//! 1. Report `unknown_error` with the diagnostic, if any
//! 2. Rejected credentials fail with `InvalidAuth`; waiting will not fix them
//! 3. An exhausted budget fails with `CannotConnect`
//! 4. Otherwise spend one retry, sleep `retry_delay`, and try again
//!
//! Attempts never overlap. The previous transport is dropped before the
//! delay starts, so no event from one attempt reaches the next.

use std::time::Duration;
use tracing::{debug, info, warn};

use super::auth::AuthProvider;
use super::handshake::perform;
use super::session::Session;
use super::transport::Connector;
use crate::error::ConnectError;
use crate::host::{ConnectionStatus, Host, LogLevel};

/// How many attempts may follow the first one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryBudget {
    Limited(u32),
    Unlimited,
}

impl RetryBudget {
    /// Interpret a signed retry count; any negative value means unlimited.
    pub fn from_signed(retries: i64) -> Self {
        if retries < 0 {
            Self::Unlimited
        } else {
            Self::Limited(u32::try_from(retries).unwrap_or(u32::MAX))
        }
    }

    /// Signed form, `-1` for unlimited.
    pub fn to_signed(self) -> i64 {
        match self {
            Self::Limited(n) => i64::from(n),
            Self::Unlimited => -1,
        }
    }

    /// Spend one retry. `None` when the budget is exhausted.
    pub fn consume(self) -> Option<Self> {
        match self {
            Self::Unlimited => Some(Self::Unlimited),
            Self::Limited(0) => None,
            Self::Limited(n) => Some(Self::Limited(n - 1)),
        }
    }
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self::Limited(3)
    }
}

/// Options for [`create_socket`].
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Accept server certificates that fail validation
    pub ignore_certificates: bool,
    /// Attempts allowed after the first
    pub max_retries: RetryBudget,
    /// Fixed delay between attempts
    pub retry_delay: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            ignore_certificates: false,
            max_retries: RetryBudget::default(),
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Establish an authenticated connection.
///
/// Returns only when a session is ready or the operation has definitively
/// failed. The reconnect signal is checked before each attempt; an attempt
/// already in flight always runs to completion.
///
/// # Errors
/// - `ConnectionLost`: the host asked for a restart
/// - `InvalidAuth`: the server rejected the token, or refresh failed
/// - `CannotConnect`: every allowed attempt failed
pub async fn create_socket<A, C>(
    auth: &mut A,
    connector: &C,
    options: &ConnectOptions,
    host: &Host,
) -> Result<Session<C::Transport>, ConnectError>
where
    A: AuthProvider + ?Sized,
    C: Connector + ?Sized,
{
    let url = auth.ws_url().to_string();
    host.log(
        LogLevel::Debug,
        &format!("[Auth phase] Initializing WebSocket connection to Home Assistant: {}", url),
    );

    let mut remaining = options.max_retries;
    let mut attempt = 0u32;

    loop {
        if host.needs_reconnect() {
            debug!("Reconnect requested, abandoning connection attempts");
            return Err(ConnectError::ConnectionLost);
        }

        attempt += 1;
        host.log(
            LogLevel::Debug,
            &format!("[Auth phase] Connecting to Home Assistant...: {}", url),
        );
        host.update_status(ConnectionStatus::Connecting, None);

        let mut transport = connector.open(&url, options.ignore_certificates);
        let end = match perform(&mut transport, &mut *auth, host).await {
            Ok(ha_version) => {
                info!(attempt, ha_version = %ha_version, "Authenticated with Home Assistant");
                return Ok(Session::new(transport, ha_version));
            }
            Err(end) => end,
        };
        drop(transport);

        host.update_status(ConnectionStatus::UnknownError, end.diagnostic.as_deref());
        if let Some(diagnostic) = &end.diagnostic {
            host.log(LogLevel::Debug, &format!("Connection closed: {}", diagnostic));
        }

        if end.invalid_auth {
            warn!(attempt, "Authentication invalid, not retrying");
            return Err(ConnectError::InvalidAuth);
        }

        remaining = match remaining.consume() {
            Some(next) => next,
            None => {
                warn!(attempt, "Retry budget exhausted");
                return Err(ConnectError::CannotConnect);
            }
        };

        debug!(
            attempt,
            remaining = remaining.to_signed(),
            delay_ms = options.retry_delay.as_millis() as u64,
            "Retrying connection"
        );
        tokio::time::sleep(options.retry_delay).await;
    }
}
