//! Message and event types.
//!
//! # Overview
//!
//! | Type | Direction | Purpose |
//! |------|-----------|---------|
//! | `Payload` | both | Opaque message body |
//! | `BrokerEvent` | Transport → listeners | Lifecycle and inbound data |
//! | `Envelope` | both | Request ID wrapper for correlated replies |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `envelope` | Correlation envelope |
//! | `event` | Channels, payloads and broker events |

// ============================================================================
// Submodules
// ============================================================================

/// Correlation envelope.
pub mod envelope;

/// Broker event types.
pub mod event;

// ============================================================================
// Re-exports
// ============================================================================

pub use envelope::Envelope;
pub use event::{BinaryType, BrokerEvent, Channel, MessageEvent, Payload, TransportError};
