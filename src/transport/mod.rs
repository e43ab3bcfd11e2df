//! WebSocket transport layer.
//!
//! This module owns the long-lived duplex connection to the browser's
//! remote-debugging endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                           ┌──────────────────┐
//! │  Session (Rust)  │         WebSocket         │  Browser         │
//! │                  │◄─────────────────────────►│  (DevTools       │
//! │  Connection      │     ws://127.0.0.1:PORT   │   endpoint)      │
//! └──────────────────┘                           └──────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Connection::connect` - Dial the endpoint printed by the browser
//! 2. Dispatcher task - sole reader of the socket; fans responses out to
//!    pending callers and events out to the session's event stream
//! 3. `Connection::send_*` - Correlated command execution with timeout
//! 4. `Connection::shutdown` - Close once, cancel all pending work

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection, dispatcher loop, and command correlation.
pub mod connection;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, EventStream};
