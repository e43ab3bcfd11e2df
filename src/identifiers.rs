//! Type-safe identifiers for protocol entities.
//!
//! Newtype wrappers prevent mixing incompatible IDs at compile time.
//!
//! | Type | Wire shape | Purpose |
//! |------|------------|---------|
//! | [`CommandId`] | integer | Request/response correlation |
//! | [`FrameId`] | string | Navigable document context |
//! | [`LoaderId`] | string | One navigation of a frame |
//! | [`TargetId`] | string | Browser-level page target |
//! | [`SessionId`] | string | Flat-mode protocol session |
//! | [`InstanceId`] | string | Per-conversion log tag |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// CommandId
// ============================================================================

/// Correlation identifier for one protocol command.
///
/// Assigned by the connection from a per-session counter: strictly
/// increasing, starting at 1, never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(u64);

impl CommandId {
    /// Creates a command ID from a raw sequence value.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw sequence value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// String identifiers
// ============================================================================

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates the identifier from its wire string.
            #[inline]
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the wire string.
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id! {
    /// Identifier of a frame (top-level page or sub-frame).
    FrameId
}

string_id! {
    /// Identifier of one navigation of a frame.
    ///
    /// Changes each time the frame begins a new navigation; used to
    /// distinguish current-navigation signals from stale ones.
    LoaderId
}

string_id! {
    /// Browser-level identifier of a page target.
    TargetId
}

string_id! {
    /// Flat-mode protocol session identifier returned by target attach.
    SessionId
}

// ============================================================================
// InstanceId
// ============================================================================

/// Per-conversion tag attached to log lines.
///
/// Allows demultiplexing of concurrent conversions sharing one log
/// destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceId(String);

impl InstanceId {
    /// Generates a fresh random instance identifier.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Creates an instance identifier from a caller-supplied tag.
    #[inline]
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the tag string.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
