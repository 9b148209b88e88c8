//! Correlation envelope for request/reply exchanges.
//!
//! In correlated mode an outbound payload is wrapped so the endpoint can
//! echo the request ID back with its reply.
//!
//! # Format
//!
//! ```json
//! { "id": 7, "data": "hello" }
//! ```
//!
//! Binary payloads are base64-encoded and flagged:
//!
//! ```json
//! { "id": 8, "data": "AAEC", "binary": true }
//! ```

// ============================================================================
// Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

use super::Payload;

// ============================================================================
// Envelope
// ============================================================================

/// A payload tagged with the request ID it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Correlation ID.
    pub id: RequestId,

    /// Text body, or base64 when `binary` is set.
    pub data: String,

    /// Whether `data` holds base64-encoded bytes.
    #[serde(default, skip_serializing_if = "is_false")]
    pub binary: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Envelope {
    /// Wraps a payload under the given request ID.
    #[must_use]
    pub fn wrap(id: RequestId, payload: &Payload) -> Self {
        match payload {
            Payload::Text(text) => Self {
                id,
                data: text.clone(),
                binary: false,
            },
            Payload::Binary(bytes) => Self {
                id,
                data: STANDARD.encode(bytes),
                binary: true,
            },
        }
    }

    /// Serializes the envelope into a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_payload(&self) -> Result<Payload> {
        Ok(Payload::Text(serde_json::to_string(self)?))
    }

    /// Attempts to read an envelope from an inbound payload.
    ///
    /// Returns `None` for binary frames and for text that is not an envelope.
    #[must_use]
    pub fn parse(payload: &Payload) -> Option<Self> {
        payload
            .as_text()
            .and_then(|text| serde_json::from_str(text).ok())
    }

    /// Unwraps the carried payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if binary data is not valid base64.
    pub fn into_payload(self) -> Result<Payload> {
        if self.binary {
            STANDARD
                .decode(self.data.as_bytes())
                .map(Payload::Binary)
                .map_err(|e| Error::protocol(format!("Invalid base64 in reply {}: {e}", self.id)))
        } else {
            Ok(Payload::Text(self.data))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_envelope_format() {
        let envelope = Envelope::wrap(RequestId::new(7), &Payload::from("hello"));
        let payload = envelope.to_payload().expect("serialize");

        assert_eq!(payload.as_text(), Some(r#"{"id":7,"data":"hello"}"#));
    }

    #[test]
    fn test_binary_envelope_is_flagged() {
        let envelope = Envelope::wrap(RequestId::new(8), &Payload::from(vec![0u8, 1, 2]));
        assert!(envelope.binary);
        assert_eq!(envelope.data, "AAEC");

        let payload = envelope.into_payload().expect("decode");
        assert_eq!(payload, Payload::Binary(vec![0, 1, 2]));
    }

    #[test]
    fn test_parse_reply() {
        let reply = Payload::from(r#"{"id": 3, "data": "pong"}"#);
        let envelope = Envelope::parse(&reply).expect("envelope");

        assert_eq!(envelope.id, RequestId::new(3));
        assert_eq!(envelope.into_payload().expect("text"), Payload::from("pong"));
    }

    #[test]
    fn test_parse_rejects_plain_messages() {
        assert!(Envelope::parse(&Payload::from("pong")).is_none());
        assert!(Envelope::parse(&Payload::from(r#"{"data": "no id"}"#)).is_none());
        assert!(Envelope::parse(&Payload::from(vec![b'{', b'}'])).is_none());
    }

    #[test]
    fn test_invalid_base64_is_protocol_error() {
        let envelope = Envelope {
            id: RequestId::new(1),
            data: "***".into(),
            binary: true,
        };
        assert!(matches!(
            envelope.into_payload(),
            Err(Error::Protocol { .. })
        ));
    }
}
