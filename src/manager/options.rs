//! Connection options.
//!
//! Provides a type-safe interface for configuring an open attempt.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use ws_relay::{BinaryType, ConnectionOptions, ReplyMode};
//!
//! let options = ConnectionOptions::new("wss://echo.example/ws")
//!     .with_binary_type(BinaryType::ArrayBuffer)
//!     .with_reconnect_on_close(true)
//!     .with_reconnect_delay(Duration::from_millis(500))
//!     .with_reply_mode(ReplyMode::NextMessage);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::protocol::BinaryType;

// ============================================================================
// Constants
// ============================================================================

/// Fixed delay before a reconnect attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(1000);

// ============================================================================
// ReplyMode
// ============================================================================

/// How `send_message(_, true)` matches a reply to its send.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReplyMode {
    /// Wrap the payload in an [`Envelope`](crate::protocol::Envelope) and
    /// resolve only on a reply echoing the same request ID.
    #[default]
    Correlated,
    /// Send the payload unmodified and resolve with whatever message
    /// arrives next, related or not. Suited to plain echo endpoints.
    NextMessage,
}

// ============================================================================
// ConnectionOptions
// ============================================================================

/// Configuration for [`ConnectionManager::open_connection`].
///
/// [`ConnectionManager::open_connection`]: crate::ConnectionManager::open_connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Endpoint URL (`ws://` or `wss://`).
    pub url: String,

    /// Binary representation for inbound data.
    pub binary_type: Option<BinaryType>,

    /// Reopen the same URL after every transport close.
    pub reconnect_on_close: bool,

    /// Delay before each reconnect attempt.
    pub reconnect_delay: Duration,

    /// Consecutive reconnect attempts allowed without a successful open.
    /// `None` retries forever.
    pub max_reconnect_attempts: Option<u32>,

    /// Reply matching for sends that wait for a response.
    pub reply_mode: ReplyMode,
}

// ============================================================================
// Constructors
// ============================================================================

impl ConnectionOptions {
    /// Creates options for `url` with defaults: no reconnect, 1s delay,
    /// unbounded attempts, correlated replies.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            binary_type: None,
            reconnect_on_close: false,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_reconnect_attempts: None,
            reply_mode: ReplyMode::default(),
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ConnectionOptions {
    /// Sets the binary representation.
    #[inline]
    #[must_use]
    pub fn with_binary_type(mut self, binary_type: BinaryType) -> Self {
        self.binary_type = Some(binary_type);
        self
    }

    /// Enables or disables reconnect on close.
    #[inline]
    #[must_use]
    pub fn with_reconnect_on_close(mut self, enabled: bool) -> Self {
        self.reconnect_on_close = enabled;
        self
    }

    /// Sets the reconnect delay.
    #[inline]
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Caps consecutive reconnect attempts.
    #[inline]
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = Some(attempts);
        self
    }

    /// Sets the reply mode.
    #[inline]
    #[must_use]
    pub fn with_reply_mode(mut self, mode: ReplyMode) -> Self {
        self.reply_mode = mode;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ConnectionOptions {
    /// Checks the options and returns the parsed URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the URL is empty, unparseable,
    /// or not a `ws`/`wss` URL.
    pub fn validate(&self) -> Result<Url> {
        let raw = self.url.trim();
        if raw.is_empty() {
            return Err(Error::invalid_argument("url must not be empty"));
        }

        let url = Url::parse(raw)
            .map_err(|e| Error::invalid_argument(format!("invalid url '{raw}': {e}")))?;

        match url.scheme() {
            "ws" | "wss" => Ok(url),
            scheme => Err(Error::invalid_argument(format!(
                "unsupported scheme '{scheme}', expected ws or wss"
            ))),
        }
    }

    /// Options for an automatic reconnect: same settings, reconnect forced on.
    #[inline]
    #[must_use]
    pub(crate) fn for_reconnect(&self) -> Self {
        Self {
            reconnect_on_close: true,
            ..self.clone()
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
    fn test_defaults() {
        let options = ConnectionOptions::new("ws://localhost:9000");
        assert_eq!(options.binary_type, None);
        assert!(!options.reconnect_on_close);
        assert_eq!(options.reconnect_delay, Duration::from_millis(1000));
        assert_eq!(options.max_reconnect_attempts, None);
        assert_eq!(options.reply_mode, ReplyMode::Correlated);
    }

    #[test]
    fn test_builder_chain() {
        let options = ConnectionOptions::new("wss://example.test/ws")
            .with_binary_type(BinaryType::ArrayBuffer)
            .with_reconnect_on_close(true)
            .with_max_reconnect_attempts(3)
            .with_reply_mode(ReplyMode::NextMessage);

        assert_eq!(options.binary_type, Some(BinaryType::ArrayBuffer));
        assert!(options.reconnect_on_close);
        assert_eq!(options.max_reconnect_attempts, Some(3));
        assert_eq!(options.reply_mode, ReplyMode::NextMessage);
    }

    #[test]
    fn test_validate_accepts_ws_and_wss() {
        assert!(ConnectionOptions::new("ws://127.0.0.1:1").validate().is_ok());
        let url = ConnectionOptions::new("wss://example.test/ws")
            .validate()
            .expect("valid");
        assert_eq!(url.host_str(), Some("example.test"));
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        for url in ["", "   ", "not a url", "https://example.test"] {
            let err = ConnectionOptions::new(url).validate().unwrap_err();
            assert!(matches!(err, Error::InvalidArgument { .. }), "{url}");
        }
    }

    #[test]
    fn test_for_reconnect_forces_flag() {
        let options = ConnectionOptions::new("ws://localhost:1")
            .with_binary_type(BinaryType::ArrayBuffer)
            .for_reconnect();
        assert!(options.reconnect_on_close);
        assert_eq!(options.binary_type, Some(BinaryType::ArrayBuffer));
    }
}
