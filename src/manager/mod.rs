//! Connection manager module.
//!
//! This module provides the main entry point: a manager that owns one
//! WebSocket connection.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ConnectionManager`] | Open/close/reconnect and send/await-response |
//! | [`ConnectionOptions`] | Per-open configuration |
//! | [`ConnectionStatus`] | `CONNECTED` / `DISCONNECTED` / `RECONNECTING` |
//! | [`ReplyMode`] | How waiting sends are matched to replies |
//!
//! # Example
//!
//! ```no_run
//! use ws_relay::{ConnectionManager, ConnectionOptions, Result};
//!
//! # async fn example() -> Result<()> {
//! let manager = ConnectionManager::new();
//! manager
//!     .open_connection(ConnectionOptions::new("wss://echo.example/ws"))
//!     .await?;
//!
//! let reply = manager.request("ping").await?;
//! println!("{reply:?}");
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Core manager implementation.
pub mod core;

/// Connection options.
pub mod options;

/// Connection status.
pub mod status;

// ============================================================================
// Re-exports
// ============================================================================

pub use core::ConnectionManager;
pub use options::{ConnectionOptions, DEFAULT_RECONNECT_DELAY, ReplyMode};
pub use status::ConnectionStatus;
