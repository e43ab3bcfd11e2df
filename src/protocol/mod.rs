//! DevTools protocol message types.
//!
//! This module defines the JSON wire format exchanged with the browser's
//! remote-debugging endpoint.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Command` | Driver → Browser | Method call with correlation id |
//! | `Response` | Browser → Driver | Result or error for one command |
//! | `Event` | Browser → Driver | Unsolicited notification |
//!
//! Commands and responses are correlated by an integer `id`; events carry a
//! `method` and no `id`. Decoding discriminates on field presence, never on
//! arrival order.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Typed method calls by protocol domain |
//! | `event` | Typed views of inbound events |
//! | `message` | Wire envelopes and the codec |

// ============================================================================
// Submodules
// ============================================================================

/// Typed method calls organized by protocol domain.
pub mod command;

/// Typed views of inbound events.
pub mod event;

/// Wire envelopes and the codec.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{MethodCall, NetworkCommand, PageCommand, PdfOptions, TargetCommand};
pub use event::{DataFrame, LifecycleEvent, ParsedEvent};
pub use message::{Command, Event, Message, Response, ResponseError};
