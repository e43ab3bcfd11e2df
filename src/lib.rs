//! Headless Chromium driver for HTML-to-PDF conversion.
//!
//! This crate launches a Chromium-family browser, speaks its JSON
//! remote-debugging protocol over WebSocket, waits until a page is
//! genuinely finished loading, and prints it to PDF.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────┐   launch    ┌───────────┐   WebSocket   ┌──────────┐
//! │ Launcher  │────────────►│  Session  │◄─────────────►│ Browser  │
//! └───────────┘             └─────┬─────┘               └──────────┘
//!       │                         │
//!       │ locator: find binary    │ transport: correlate commands,
//!       │ options: build argv     │            fan out events
//!       │                         │ lifecycle: track page readiness
//!       │                         │ protocol:  encode/decode messages
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use chromium_printer::{Launcher, PdfOptions};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let launcher = Launcher::builder().build();
//! let session = launcher.launch().await?;
//!
//! let pdf = session
//!     .render_pdf("https://example.com/invoice/42", &PdfOptions::a4())
//!     .await?;
//! std::fs::write("invoice.pdf", pdf)?;
//!
//! session.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`launcher`] | Executable discovery and process launching |
//! | [`transport`] | WebSocket connection and command correlation |
//! | [`protocol`] | Message codec and typed commands/events |
//! | [`session`] | Page sessions and load tracking |
//! | [`logging`] | Thread-safe per-conversion trace log |
//! | [`identifiers`] | Strongly typed protocol identifiers |
//! | [`error`] | Error type shared across the crate |
//!
//! # Concurrency
//!
//! Each session owns its own browser process and connection; sessions
//! share nothing except, optionally, a [`LogSink`]. Running conversions
//! concurrently is a matter of launching more sessions.

// ============================================================================
// Modules
// ============================================================================

pub mod error;
pub mod identifiers;
pub mod launcher;
pub mod logging;
pub mod protocol;
pub mod session;
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use identifiers::{CommandId, FrameId, InstanceId, LoaderId, SessionId, TargetId};
pub use launcher::{ChromiumOptions, Launcher, LauncherBuilder};
pub use logging::{LogSink, SessionLog};
pub use protocol::PdfOptions;
pub use session::{ReadySignal, Session, SessionConfig, TimeoutPolicy};
