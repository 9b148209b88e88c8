//! Error types for the connection manager.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use ws_relay::{ConnectionManager, Payload, Result};
//!
//! async fn example(manager: &ConnectionManager) -> Result<()> {
//!     let reply = manager.send_message("ping", true).await?;
//!     println!("{reply:?}");
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Connection | [`Error::ConnectFailed`], [`Error::NotConnected`], [`Error::AlreadyConnected`], [`Error::ConnectionClosed`], [`Error::ChannelClosed`] |
//! | Messaging | [`Error::SendFailed`], [`Error::RequestTimeout`], [`Error::Protocol`] |
//! | Configuration | [`Error::InvalidArgument`] |
//! | External | [`Error::Json`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;

use crate::identifiers::RequestId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// The transport reported an error while an open attempt was pending.
    ///
    /// Terminal for that attempt, even if a later reconnect succeeds.
    #[error("Failed to connect to WebSocket at {url}: {message}")]
    ConnectFailed {
        /// Target URL of the failed attempt.
        url: String,
        /// Transport error description.
        message: String,
    },

    /// No socket handle exists.
    ///
    /// Returned before the first open, or after the handle was discarded
    /// on close.
    #[error("Connection not yet established")]
    NotConnected,

    /// An open was requested while a socket handle is still active.
    #[error("Connection already active for {url}")]
    AlreadyConnected {
        /// URL of the active connection.
        url: String,
    },

    /// The socket closed before a pending operation completed.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Messaging Errors
    // ========================================================================
    /// The transport reported an error while a send was awaiting a response.
    #[error("Failed to send message: {message}")]
    SendFailed {
        /// Transport error payload.
        message: String,
    },

    /// A correlated request was not answered in time.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Protocol violation or resource limit.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid connection options.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A pending operation was abandoned before it could settle.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a connect failed error.
    #[inline]
    pub fn connect_failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectFailed {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates an already connected error.
    #[inline]
    pub fn already_connected(url: impl Into<String>) -> Self {
        Self::AlreadyConnected { url: url.into() }
    }

    /// Creates a send failed error.
    #[inline]
    pub fn send_failed(message: impl Into<String>) -> Self {
        Self::SendFailed {
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RequestTimeout { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectFailed { .. }
                | Self::NotConnected
                | Self::AlreadyConnected { .. }
                | Self::ConnectionClosed
                | Self::ChannelClosed(_)
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on retry.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConnectFailed { .. } | Self::RequestTimeout { .. } | Self::SendFailed { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_connected_display() {
        assert_eq!(
            Error::NotConnected.to_string(),
            "Connection not yet established"
        );
    }

    #[test]
    fn test_connect_failed_mentions_url() {
        let err = Error::connect_failed("wss://example.test/ws", "refused");
        assert!(err.to_string().contains("wss://example.test/ws"));
        assert!(err.is_connection_error());
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_send_failed_carries_payload() {
        let err = Error::send_failed("boom");
        assert_eq!(err.to_string(), "Failed to send message: boom");
        assert!(!err.is_connection_error());
    }

    #[test]
    fn test_is_timeout() {
        let timeout_err = Error::request_timeout(RequestId::new(7), 500);
        let other_err = Error::protocol("test");

        assert!(timeout_err.is_timeout());
        assert!(!other_err.is_timeout());
        assert_eq!(timeout_err.to_string(), "Request 7 timed out after 500ms");
    }

    #[test]
    fn test_invalid_argument_not_recoverable() {
        let err = Error::invalid_argument("empty url");
        assert!(!err.is_recoverable());
        assert!(!err.is_connection_error());
    }

    #[tokio::test]
    async fn test_from_recv_error() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        drop(tx);

        let err: Error = rx.await.unwrap_err().into();
        assert!(matches!(err, Error::ChannelClosed(_)));
        assert!(err.is_connection_error());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
