//! ws-relay - Client-side manager for a single WebSocket endpoint.
//!
//! This library opens and closes one WebSocket connection, reconnects it
//! automatically, sends messages (optionally awaiting a reply) and fans out
//! lifecycle and data events to any number of listeners.
//!
//! # Architecture
//!
//! - **Connection Manager**: owns the socket handle, status and target URL;
//!   drives open/close/reconnect transitions
//! - **Broker**: per-manager publish/subscribe registry for `OPENED`,
//!   `CLOSED`, `ERROR` and `MESSAGE` events
//! - **Transport**: trait seam over the socket library, with a
//!   `tokio-tungstenite` implementation
//!
//! # Quick Start
//!
//! ```no_run
//! use ws_relay::{Channel, ConnectionManager, ConnectionOptions, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let manager = ConnectionManager::new();
//!
//!     manager.broker().on(Channel::Message, |event| {
//!         println!("inbound: {event:?}");
//!     });
//!
//!     manager
//!         .open_connection(
//!             ConnectionOptions::new("ws://127.0.0.1:9000").with_reconnect_on_close(true),
//!         )
//!         .await?;
//!
//!     let reply = manager.send_message("Hello WebSocket", true).await?;
//!     println!("reply: {reply:?}");
//!
//!     manager.close_connection().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`broker`] | Publish/subscribe registry |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`manager`] | Connection manager, options and status |
//! | [`protocol`] | Payloads, events and the correlation envelope |
//! | [`transport`] | Socket abstraction and tokio-tungstenite transport |

// ============================================================================
// Modules
// ============================================================================

/// Publish/subscribe registry.
pub mod broker;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Connection manager, options and status.
///
/// Use [`ConnectionManager::new()`] to create a manager.
pub mod manager;

/// Payloads, broker events and the correlation envelope.
pub mod protocol;

/// Socket abstraction.
///
/// Implement [`transport::Transport`] to run the manager over another
/// socket library.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Broker types
pub use broker::{Broker, Listener, Subscription};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ListenerId, RequestId};

// Manager types
pub use manager::{ConnectionManager, ConnectionOptions, ConnectionStatus, ReplyMode};

// Protocol types
pub use protocol::{BinaryType, BrokerEvent, Channel, Envelope, MessageEvent, Payload, TransportError};

// Transport types
pub use transport::{Socket, Transport, TransportEvent, TungsteniteTransport};
