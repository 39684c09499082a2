//! Authentication Handshake
//!
//! Single responsibility: Drive one connection attempt from socket open to an
//! authenticated session or a classified end.
//!
//! # State Machine
//!
//! ```text
//! ┌──────────────┐  Open   ┌────────────────────┐  auth_ok  ┌───────────────┐
//! │ AwaitingOpen │────────>│ AwaitingAuthResult │──────────>│ Authenticated │
//! └──────────────┘         └────────────────────┘           └───────────────┘
//!        │                          │
//!        │ Close / Error            │ Close / Error
//!        ↓                          ↓
//!   ┌────────┐                 ┌────────┐
//!   │ Failed │                 │ Failed │
//!   └────────┘                 └────────┘
//! ```
//!
//! `Handshake` performs no I/O. Each event returns a [`HandshakeAction`] that
//! the driver (`perform`) executes against the transport and auth provider.
//! Rejected credentials never end the attempt directly: they set a marker and
//! close the transport, so every attempt leaves through the close path.

use tracing::{debug, warn};

use super::auth::AuthProvider;
use super::protocol::{AuthMessage, IncomingMessage};
use super::transport::{Transport, TransportEvent, NORMAL_CLOSE};
use crate::error::{RefreshError, TransportError};
use crate::host::{Host, LogLevel};

/// Handshake state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Transport created, waiting for it to open
    AwaitingOpen,
    /// Auth request sent (or about to be), waiting for the verdict
    AwaitingAuthResult,
    /// Server accepted the token
    Authenticated,
    /// Attempt ended without authenticating
    Failed,
}

/// How an attempt ended when it did not authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptEnd {
    /// Credentials were rejected or could not be refreshed
    pub invalid_auth: bool,
    /// Human-readable reason, absent for a clean close
    pub diagnostic: Option<String>,
}

/// Work the driver must carry out after feeding an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeAction {
    /// Nothing to do, keep waiting for events
    Wait,
    /// Refresh the token if expired, then send the auth request
    Authenticate,
    /// Close the transport; the close event will end the attempt
    Close,
    /// A message the auth phase does not understand; log it and keep waiting
    Unhandled(String),
    /// Authenticated with the given server version
    Resolve { ha_version: String },
    /// Attempt is over
    End(AttemptEnd),
}

/// Why sending credentials failed before the server could answer.
#[derive(Debug)]
pub enum CredentialFailure {
    Refresh(RefreshError),
    Send(TransportError),
}

/// Per-attempt handshake state machine.
#[derive(Debug, Clone)]
pub struct Handshake {
    state: HandshakeState,
    invalid_auth: bool,
    /// An error was reported; a following close is the same failure
    errored: bool,
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new()
    }
}

impl Handshake {
    pub fn new() -> Self {
        Self {
            state: HandshakeState::AwaitingOpen,
            invalid_auth: false,
            errored: false,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Whether credentials were invalidated during this attempt.
    pub fn invalid_auth(&self) -> bool {
        self.invalid_auth
    }

    fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            HandshakeState::Authenticated | HandshakeState::Failed
        )
    }

    /// Feed one transport event.
    pub fn on_event(&mut self, event: TransportEvent) -> HandshakeAction {
        if self.is_terminal() {
            debug!(state = ?self.state, event = ?event, "Ignoring event after handshake finished");
            return HandshakeAction::Wait;
        }

        match event {
            TransportEvent::Open => {
                if self.state != HandshakeState::AwaitingOpen {
                    return HandshakeAction::Wait;
                }
                self.state = HandshakeState::AwaitingAuthResult;
                HandshakeAction::Authenticate
            }
            TransportEvent::Message(text) => self.on_message(&text),
            TransportEvent::Close { code, reason, .. } => {
                if self.errored {
                    return HandshakeAction::Wait;
                }
                let diagnostic = (code != 0 && code != NORMAL_CLOSE).then(|| {
                    format!("Connection closed with code {} and reason {}", code, reason)
                });
                self.end(diagnostic)
            }
            TransportEvent::Error(message) => {
                self.errored = true;
                let mut diagnostic = String::from("Disconnected with a WebSocket error");
                if let Some(message) = message.filter(|m| !m.is_empty()) {
                    diagnostic.push_str(" with message: ");
                    diagnostic.push_str(&message);
                }
                self.end(Some(diagnostic))
            }
        }
    }

    /// The credentials could not be delivered.
    ///
    /// A refresh failure invalidates authentication for this attempt. Either
    /// way the transport is closed and the attempt ends via its close event.
    pub fn on_credential_failure(&mut self, failure: &CredentialFailure) -> HandshakeAction {
        if self.is_terminal() {
            return HandshakeAction::Wait;
        }
        if let CredentialFailure::Refresh(_) = failure {
            self.invalid_auth = true;
        }
        HandshakeAction::Close
    }

    fn on_message(&mut self, text: &str) -> HandshakeAction {
        let message = match IncomingMessage::decode(text) {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "Auth phase message did not decode");
                return HandshakeAction::Unhandled(text.to_string());
            }
        };

        if self.state != HandshakeState::AwaitingAuthResult {
            debug!(message = %text, "[Auth phase] Message before open, ignoring");
            return HandshakeAction::Wait;
        }

        match message {
            IncomingMessage::AuthInvalid { message } => {
                warn!(reason = ?message, "Home Assistant rejected the access token");
                self.invalid_auth = true;
                HandshakeAction::Close
            }
            IncomingMessage::AuthOk { ha_version } => {
                self.state = HandshakeState::Authenticated;
                HandshakeAction::Resolve { ha_version }
            }
            // Sent by the server on connect; the auth request already went out on open
            IncomingMessage::AuthRequired { .. } => HandshakeAction::Wait,
            IncomingMessage::Other => HandshakeAction::Unhandled(text.to_string()),
        }
    }

    fn end(&mut self, diagnostic: Option<String>) -> HandshakeAction {
        self.state = HandshakeState::Failed;
        HandshakeAction::End(AttemptEnd {
            invalid_auth: self.invalid_auth,
            diagnostic,
        })
    }
}

/// Run one attempt over `transport` until it authenticates or ends.
///
/// Returns the server version on success. The transport is left open and
/// owned by the caller.
pub(crate) async fn perform<T, A>(
    transport: &mut T,
    auth: &mut A,
    host: &Host,
) -> Result<String, AttemptEnd>
where
    T: Transport + ?Sized,
    A: AuthProvider + ?Sized,
{
    let mut handshake = Handshake::new();

    loop {
        let event = match transport.next_event().await {
            Some(event) => event,
            None => TransportEvent::Close {
                code: 1006,
                reason: "transport ended".into(),
                was_clean: false,
            },
        };

        if let TransportEvent::Message(text) = &event {
            host.log(
                LogLevel::Debug,
                &format!("[Auth phase] Received a message: {}", text),
            );
        }

        let mut action = handshake.on_event(event);
        loop {
            action = match action {
                HandshakeAction::Wait => break,
                HandshakeAction::Authenticate => match send_credentials(transport, auth).await {
                    Ok(()) => HandshakeAction::Wait,
                    Err(failure) => {
                        debug!(failure = ?failure, "Could not deliver credentials");
                        handshake.on_credential_failure(&failure)
                    }
                },
                HandshakeAction::Close => {
                    transport.close().await;
                    HandshakeAction::Wait
                }
                HandshakeAction::Unhandled(text) => {
                    host.log(
                        LogLevel::Debug,
                        &format!("[Auth phase] Unhandled message: {}", text),
                    );
                    HandshakeAction::Wait
                }
                HandshakeAction::Resolve { ha_version } => return Ok(ha_version),
                HandshakeAction::End(end) => return Err(end),
            };
        }
    }
}

async fn send_credentials<T, A>(transport: &mut T, auth: &mut A) -> Result<(), CredentialFailure>
where
    T: Transport + ?Sized,
    A: AuthProvider + ?Sized,
{
    if auth.expired() {
        debug!("Access token expired, refreshing");
        auth.refresh_access_token()
            .await
            .map_err(CredentialFailure::Refresh)?;
    }

    let request = AuthMessage::new(auth.access_token())
        .encode()
        .map_err(|e| CredentialFailure::Send(TransportError::Send(e.to_string())))?;

    transport
        .send(request)
        .await
        .map_err(CredentialFailure::Send)
}
