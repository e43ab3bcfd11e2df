//! Error types for the Chromium print driver.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use chromium_printer::{Result, Session};
//!
//! async fn example(session: &Session) -> Result<Vec<u8>> {
//!     session.navigate_and_wait_for_ready("https://example.com", None).await?;
//!     session.print_to_pdf(&Default::default()).await
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Discovery | [`Error::UnsupportedPlatform`], [`Error::BinaryNotFound`] |
//! | Launch | [`Error::Launch`] |
//! | Connection | [`Error::Connection`], [`Error::SessionClosed`] |
//! | Protocol | [`Error::MalformedMessage`], [`Error::CommandFailed`], [`Error::Protocol`] |
//! | Timeouts | [`Error::RequestTimeout`], [`Error::PageLoadTimeout`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::path::PathBuf;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::CommandId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Discovery Errors
    // ========================================================================
    /// The current platform has no known browser install convention.
    ///
    /// Fatal for automatic discovery only; an explicit binary path still
    /// works on any platform.
    #[error("Unsupported platform for browser discovery: {os}")]
    UnsupportedPlatform {
        /// Operating system name reported by the toolchain.
        os: String,
    },

    /// No browser binary at the given or discovered path.
    ///
    /// Returned when the configured path does not exist, or when discovery
    /// found nothing and no explicit path was supplied.
    #[error("Chromium binary not found: {path}")]
    BinaryNotFound {
        /// Path where the browser was expected.
        path: PathBuf,
    },

    // ========================================================================
    // Launch Errors
    // ========================================================================
    /// Browser process failed to start or never exposed an endpoint.
    ///
    /// Fatal for this conversion only.
    #[error("Failed to launch browser: {message}")]
    Launch {
        /// Description of the launch failure.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection to the debugging endpoint failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Session torn down while work was still pending.
    ///
    /// Every request still in flight at teardown resolves with this.
    #[error("Session closed")]
    SessionClosed,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Inbound message could not be decoded.
    ///
    /// The dispatcher logs the raw text and drops the message; the session
    /// continues.
    #[error("Malformed protocol message: {message}")]
    MalformedMessage {
        /// Description of the decode failure.
        message: String,
    },

    /// The browser answered a command with an error payload.
    #[error("Command {id} failed: {message}")]
    CommandFailed {
        /// Correlation id of the failed command.
        id: CommandId,
        /// Error message from the browser.
        message: String,
    },

    /// Protocol violation or unexpected response shape.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // Timeout Errors
    // ========================================================================
    /// No response arrived for a command within its deadline.
    ///
    /// The pending entry is removed; a late response is silently discarded.
    #[error("Command {id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// Correlation id of the timed-out command.
        id: CommandId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Page never reached the configured readiness signal.
    ///
    /// Conversion-level failure unless the caller opted into best-effort
    /// partial-load printing.
    #[error("Page load timed out after {timeout_ms}ms: {url}")]
    PageLoadTimeout {
        /// URL being loaded.
        url: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an unsupported platform error for the build target.
    #[inline]
    pub fn unsupported_platform() -> Self {
        Self::UnsupportedPlatform {
            os: std::env::consts::OS.to_string(),
        }
    }

    /// Creates a binary not found error.
    #[inline]
    pub fn binary_not_found(path: impl Into<PathBuf>) -> Self {
        Self::BinaryNotFound { path: path.into() }
    }

    /// Creates a launch error.
    #[inline]
    pub fn launch(message: impl Into<String>) -> Self {
        Self::Launch {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a malformed message error.
    #[inline]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedMessage {
            message: message.into(),
        }
    }

    /// Creates a command failed error.
    #[inline]
    pub fn command_failed(id: CommandId, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            id,
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(id: CommandId, timeout_ms: u64) -> Self {
        Self::RequestTimeout { id, timeout_ms }
    }

    /// Creates a page load timeout error.
    #[inline]
    pub fn page_load_timeout(url: impl Into<String>, timeout_ms: u64) -> Self {
        Self::PageLoadTimeout {
            url: url.into(),
            timeout_ms,
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
        matches!(
            self,
            Self::RequestTimeout { .. } | Self::PageLoadTimeout { .. }
        )
    }

    /// Returns `true` if the underlying connection is unusable.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::SessionClosed | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on retry within the same session.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::RequestTimeout { .. }
                | Self::PageLoadTimeout { .. }
                | Self::MalformedMessage { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::connection("refused");
        assert_eq!(err.to_string(), "Connection failed: refused");
    }

    #[test]
    fn test_page_load_timeout_display() {
        let err = Error::page_load_timeout("https://example.com", 30_000);
        assert_eq!(
            err.to_string(),
            "Page load timed out after 30000ms: https://example.com"
        );
    }

    #[test]
    fn test_is_timeout() {
        let request = Error::request_timeout(CommandId::new(3), 5000);
        let page = Error::page_load_timeout("https://example.com", 1000);
        let other = Error::SessionClosed;

        assert!(request.is_timeout());
        assert!(page.is_timeout());
        assert!(!other.is_timeout());
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::connection("x").is_connection_error());
        assert!(Error::SessionClosed.is_connection_error());
        assert!(!Error::malformed("x").is_connection_error());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::malformed("bad json").is_recoverable());
        assert!(!Error::SessionClosed.is_recoverable());
        assert!(!Error::unsupported_platform().is_recoverable());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "no such file");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("not json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
