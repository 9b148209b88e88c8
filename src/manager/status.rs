//! Connection status.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// ConnectionStatus
// ============================================================================

/// The manager's belief about the transport's state.
///
/// | From | To | Trigger |
/// |------|----|---------|
/// | any | `CONNECTED` | transport open |
/// | any | `DISCONNECTED` | transport error or close |
/// | `DISCONNECTED` | `RECONNECTING` | reconnect timer armed after close |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// Transport reported open.
    Connected,
    /// No open transport.
    #[default]
    Disconnected,
    /// A reconnect attempt is scheduled or in progress.
    Reconnecting,
}

impl ConnectionStatus {
    /// Returns the canonical uppercase name.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "CONNECTED",
            Self::Disconnected => "DISCONNECTED",
            Self::Reconnecting => "RECONNECTING",
        }
    }

    /// Returns `true` if the status is [`Connected`](Self::Connected).
    #[inline]
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_disconnected() {
        assert_eq!(ConnectionStatus::default(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionStatus::Connected.to_string(), "CONNECTED");
        assert_eq!(ConnectionStatus::Disconnected.to_string(), "DISCONNECTED");
        assert_eq!(ConnectionStatus::Reconnecting.to_string(), "RECONNECTING");
    }

    #[test]
    fn test_is_connected() {
        assert!(ConnectionStatus::Connected.is_connected());
        assert!(!ConnectionStatus::Reconnecting.is_connected());
    }
}
