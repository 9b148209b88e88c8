//! Broker event types.
//!
//! Every transport notification is translated into one [`BrokerEvent`] and
//! broadcast on the matching [`Channel`].
//!
//! # Channels
//!
//! | Channel | Emitted when | Payload |
//! |---------|--------------|---------|
//! | `OPENED` | transport reports successful connect | none |
//! | `CLOSED` | transport reports disconnect | none |
//! | `ERROR` | transport reports an error | [`TransportError`] |
//! | `MESSAGE` | transport delivers inbound data | [`MessageEvent`] |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// Payload
// ============================================================================

/// Opaque message body, written to and read from the socket unmodified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
}

impl Payload {
    /// Returns the text content, if this is a text payload.
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    /// Returns the raw bytes of either variant.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    /// Returns the payload size in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Returns `true` if the payload is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` for binary payloads.
    #[inline]
    #[must_use]
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self::Binary(bytes.to_vec())
    }
}

// ============================================================================
// BinaryType
// ============================================================================

/// Representation requested for inbound binary data.
///
/// Set on the socket before any data arrives and stamped on every
/// [`MessageEvent`] so consumers know how the endpoint was configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BinaryType {
    /// Opaque blob (the WebSocket default).
    #[default]
    Blob,
    /// Contiguous byte buffer.
    ArrayBuffer,
}

impl BinaryType {
    /// Returns the canonical lowercase name.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::ArrayBuffer => "arraybuffer",
        }
    }
}

impl fmt::Display for BinaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Channel
// ============================================================================

/// Broker channel names. The string forms are part of the public contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Transport connected.
    Opened,
    /// Transport disconnected.
    Closed,
    /// Transport error.
    Error,
    /// Inbound data.
    Message,
}

impl Channel {
    /// All channels, in declaration order.
    pub const ALL: [Channel; 4] = [Self::Opened, Self::Closed, Self::Error, Self::Message];

    /// Returns the verbatim channel name.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Opened => "OPENED",
            Self::Closed => "CLOSED",
            Self::Error => "ERROR",
            Self::Message => "MESSAGE",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TransportError / MessageEvent
// ============================================================================

/// Raw error notification from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    /// Human-readable error data.
    pub data: String,
}

impl TransportError {
    /// Creates a transport error.
    #[inline]
    #[must_use]
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.data)
    }
}

/// Raw inbound message notification from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    /// Message body.
    pub data: Payload,
    /// Binary representation configured on the socket.
    pub binary_type: BinaryType,
}

impl MessageEvent {
    /// Creates a message event.
    #[inline]
    #[must_use]
    pub fn new(data: impl Into<Payload>, binary_type: BinaryType) -> Self {
        Self {
            data: data.into(),
            binary_type,
        }
    }
}

// ============================================================================
// BrokerEvent
// ============================================================================

/// An event delivered to broker listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    /// Broadcast on [`Channel::Opened`].
    Opened,
    /// Broadcast on [`Channel::Closed`].
    Closed,
    /// Broadcast on [`Channel::Error`].
    Error(TransportError),
    /// Broadcast on [`Channel::Message`].
    Message(MessageEvent),
}

impl BrokerEvent {
    /// Returns the channel this event is broadcast on.
    #[inline]
    #[must_use]
    pub const fn channel(&self) -> Channel {
        match self {
            Self::Opened => Channel::Opened,
            Self::Closed => Channel::Closed,
            Self::Error(_) => Channel::Error,
            Self::Message(_) => Channel::Message,
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
    fn test_channel_names_are_verbatim() {
        let names: Vec<_> = Channel::ALL.iter().map(Channel::as_str).collect();
        assert_eq!(names, ["OPENED", "CLOSED", "ERROR", "MESSAGE"]);
    }

    #[test]
    fn test_event_channel_mapping() {
        assert_eq!(BrokerEvent::Opened.channel(), Channel::Opened);
        assert_eq!(BrokerEvent::Closed.channel(), Channel::Closed);
        assert_eq!(
            BrokerEvent::Error(TransportError::new("boom")).channel(),
            Channel::Error
        );
        assert_eq!(
            BrokerEvent::Message(MessageEvent::new("pong", BinaryType::Blob)).channel(),
            Channel::Message
        );
    }

    #[test]
    fn test_payload_accessors() {
        let text = Payload::from("pong");
        assert_eq!(text.as_text(), Some("pong"));
        assert_eq!(text.len(), 4);
        assert!(!text.is_binary());

        let binary = Payload::from(vec![0u8, 1, 2]);
        assert_eq!(binary.as_text(), None);
        assert_eq!(binary.as_bytes(), &[0, 1, 2]);
        assert!(binary.is_binary());
    }

    #[test]
    fn test_binary_type_default_is_blob() {
        assert_eq!(BinaryType::default(), BinaryType::Blob);
        assert_eq!(BinaryType::ArrayBuffer.to_string(), "arraybuffer");
    }
}
