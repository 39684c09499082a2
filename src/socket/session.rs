//! Authenticated Session
//!
//! A `Session` can only be produced by a successful handshake. If you have
//! one, the server has accepted the access token and the transport is ready
//! for the command protocol. The socket core never touches it again.

use super::transport::Transport;

/// An authenticated connection and the server version it reported.
#[derive(Debug)]
pub struct Session<T> {
    transport: T,
    ha_version: String,
}

impl<T: Transport> Session<T> {
    pub(crate) fn new(transport: T, ha_version: String) -> Self {
        Self {
            transport,
            ha_version,
        }
    }

    /// Home Assistant version reported in `auth_ok`.
    pub fn ha_version(&self) -> &str {
        &self.ha_version
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Take ownership of the transport, e.g. to hand it to a command client.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Close the connection.
    pub async fn close(mut self) {
        self.transport.close().await;
    }
}
