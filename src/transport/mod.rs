//! WebSocket transport layer.
//!
//! The connection manager never touches a socket library directly. It asks
//! a [`Transport`] for a [`Socket`] and receives notifications through an
//! [`EventHandler`].
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────┐   open(request, handler)   ┌──────────────────┐
//! │ ConnectionManager │───────────────────────────►│    Transport     │
//! │                   │                            │                  │
//! │  Socket handle    │◄── send / close ───────────│  socket task     │
//! │  EventHandler     │◄── Open/Message/Error/Close│  (tokio)         │
//! └───────────────────┘                            └──────────────────┘
//! ```
//!
//! # Notification Order
//!
//! Open precedes any Message; any Message precedes the Error/Close that ends
//! the session. A failed connect produces Error followed by Close.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | tokio-tungstenite client socket and event loop |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use url::Url;

use crate::error::Result;
use crate::protocol::{BinaryType, MessageEvent, Payload, TransportError};

// ============================================================================
// Submodules
// ============================================================================

/// tokio-tungstenite client socket and event loop.
pub mod connection;

#[cfg(test)]
pub(crate) mod scripted;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::TungsteniteTransport;

// ============================================================================
// Types
// ============================================================================

/// A low-level notification from a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Connection established.
    Open,
    /// Inbound data.
    Message(MessageEvent),
    /// Transport error.
    Error(TransportError),
    /// Connection ended.
    Close,
}

/// Callback receiving socket notifications.
///
/// Invoked from the socket's task, in the order the socket observes them.
pub type EventHandler = Arc<dyn Fn(TransportEvent) + Send + Sync>;

/// Parameters for opening a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRequest {
    /// Endpoint URL.
    pub url: Url,
    /// Binary representation, fixed before any data arrives.
    pub binary_type: BinaryType,
}

// ============================================================================
// Traits
// ============================================================================

/// Factory for sockets.
pub trait Transport: Send + Sync + 'static {
    /// Starts opening a socket.
    ///
    /// Must return without waiting for the handshake; the outcome is
    /// reported through `handler`.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot even be started.
    fn open(&self, request: OpenRequest, handler: EventHandler) -> Result<Box<dyn Socket>>;
}

/// Handle to an open or opening socket.
pub trait Socket: Send + Sync {
    /// Queues a payload for sending, unmodified.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`](crate::Error::ConnectionClosed)
    /// if the socket task has ended.
    fn send(&self, payload: Payload) -> Result<()>;

    /// Requests the socket to close. The Close notification follows later.
    fn close(&self);
}
