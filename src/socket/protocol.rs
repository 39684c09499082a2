//! Auth-Phase Wire Protocol
//!
//! Single responsibility: Encode and decode the JSON text frames exchanged
//! before the connection is authenticated.
//!
//! # Wire Format
//!
//! ```text
//! server → client   {"type": "auth_required", "ha_version": "2024.1.0"}
//! client → server   {"type": "auth", "access_token": "..."}
//! server → client   {"type": "auth_ok", "ha_version": "2024.1.0"}
//!                 | {"type": "auth_invalid", "message": "Invalid access token"}
//! ```
//!
//! Anything after `auth_ok` belongs to the command protocol and is not
//! handled here.

use serde::{Deserialize, Serialize};

/// Outbound authentication request.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename = "auth")]
pub struct AuthMessage<'a> {
    pub access_token: &'a str,
}

impl<'a> AuthMessage<'a> {
    pub fn new(access_token: &'a str) -> Self {
        Self { access_token }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Inbound message during the auth phase.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IncomingMessage {
    AuthRequired {
        #[serde(default)]
        ha_version: Option<String>,
    },
    AuthOk {
        #[serde(default)]
        ha_version: String,
    },
    AuthInvalid {
        #[serde(default)]
        message: Option<String>,
    },
    /// Any other message type
    #[serde(other)]
    Other,
}

impl IncomingMessage {
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_auth() {
        let json = AuthMessage::new("token-123").encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "auth");
        assert_eq!(value["access_token"], "token-123");
    }

    #[test]
    fn test_decode_auth_phase_messages() {
        assert_eq!(
            IncomingMessage::decode(r#"{"type":"auth_required","ha_version":"2024.1"}"#).unwrap(),
            IncomingMessage::AuthRequired {
                ha_version: Some("2024.1".into())
            }
        );
        assert_eq!(
            IncomingMessage::decode(r#"{"type":"auth_ok","ha_version":"2024.1"}"#).unwrap(),
            IncomingMessage::AuthOk {
                ha_version: "2024.1".into()
            }
        );
        assert_eq!(
            IncomingMessage::decode(r#"{"type":"auth_invalid","message":"nope"}"#).unwrap(),
            IncomingMessage::AuthInvalid {
                message: Some("nope".into())
            }
        );
    }

    #[test]
    fn test_decode_unknown_type() {
        assert_eq!(
            IncomingMessage::decode(r#"{"type":"event","id":4}"#).unwrap(),
            IncomingMessage::Other
        );
    }

    #[test]
    fn test_decode_rejects_untyped() {
        assert!(IncomingMessage::decode(r#"{"id":4}"#).is_err());
        assert!(IncomingMessage::decode("not json").is_err());
    }
}
