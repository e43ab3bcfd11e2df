//! Typed views of inbound events.
//!
//! The dispatcher forwards raw [`Event`]s; the load tracker consumes them
//! through [`ParsedEvent::parse`], which extracts only what load tracking
//! needs:
//!
//! | Method | Parsed as |
//! |--------|-----------|
//! | `Page.lifecycleEvent` | [`ParsedEvent::Lifecycle`] |
//! | `Network.responseReceived` | [`ParsedEvent::DataReceived`] (with frame metadata) |
//! | `Network.dataReceived` | [`ParsedEvent::DataReceived`] (without frame metadata) |
//! | anything else | [`ParsedEvent::Unknown`] |
//!
//! The two network shapes are deliberately one variant: the richer one
//! carries frame identity, the simpler one does not, and the tracker treats
//! the frame fields as optional extended metadata.

// ============================================================================
// Imports
// ============================================================================

use crate::identifiers::{FrameId, LoaderId};

use super::message::Event;

// ============================================================================
// ParsedEvent
// ============================================================================

/// Typed event union consumed by the load tracker.
#[derive(Debug, Clone)]
pub enum ParsedEvent {
    /// A page lifecycle transition.
    Lifecycle(LifecycleEvent),

    /// Network data observed for some frame.
    DataReceived(DataFrame),

    /// Event outside the tracked subset; ignored by the tracker.
    Unknown {
        /// Event method.
        method: String,
    },
}

impl ParsedEvent {
    /// Parses a raw event into the tracked subset.
    #[must_use]
    pub fn parse(event: &Event) -> Self {
        match event.method.as_str() {
            "Page.lifecycleEvent" => Self::Lifecycle(LifecycleEvent {
                frame_id: FrameId::new(get_str(event, "frameId")),
                loader_id: get_opt_str(event, "loaderId").map(LoaderId::new),
                name: get_str(event, "name"),
                timestamp: event
                    .params
                    .get("timestamp")
                    .and_then(|v| v.as_f64())
                    .unwrap_or_default(),
            }),

            "Network.responseReceived" => {
                let response = event.params.get("response");
                Self::DataReceived(DataFrame {
                    frame_id: get_opt_str(event, "frameId").map(FrameId::new),
                    loader_id: get_opt_str(event, "loaderId").map(LoaderId::new),
                    url: response
                        .and_then(|r| r.get("url"))
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    mime_type: response
                        .and_then(|r| r.get("mimeType"))
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    security_state: response
                        .and_then(|r| r.get("securityState"))
                        .and_then(|v| v.as_str())
                        .map(str::to_string),
                })
            }

            "Network.dataReceived" => Self::DataReceived(DataFrame {
                frame_id: None,
                loader_id: None,
                url: String::new(),
                mime_type: String::new(),
                security_state: None,
            }),

            _ => Self::Unknown {
                method: event.method.clone(),
            },
        }
    }
}

// ============================================================================
// LifecycleEvent
// ============================================================================

/// One page lifecycle transition.
///
/// Arrival order is the only order; no ordering relative to network events
/// is guaranteed. The loader id is inline when the browser supplies it;
/// otherwise the tracker resolves it from the most recent [`DataFrame`]
/// seen for the same frame.
#[derive(Debug, Clone)]
pub struct LifecycleEvent {
    /// Frame the transition belongs to.
    pub frame_id: FrameId,

    /// Navigation the transition belongs to, when carried inline.
    pub loader_id: Option<LoaderId>,

    /// Transition name: `init`, `DOMContentLoaded`, `load`,
    /// `networkAlmostIdle`, `networkIdle`, ...
    pub name: String,

    /// Monotonic protocol timestamp.
    pub timestamp: f64,
}

impl LifecycleEvent {
    /// Returns `true` for `load` or any stronger signal.
    #[inline]
    #[must_use]
    pub fn is_load_class(&self) -> bool {
        matches!(
            self.name.as_str(),
            "load" | "networkAlmostIdle" | "networkIdle"
        )
    }

    /// Returns `true` for the network-idle signal.
    #[inline]
    #[must_use]
    pub fn is_network_idle(&self) -> bool {
        self.name == "networkIdle"
    }
}

// ============================================================================
// DataFrame
// ============================================================================

/// Network data observed for a frame.
///
/// Confirms which navigation (loader) a frame is currently serving; the
/// frame fields are optional extended metadata not present on the simpler
/// wire shape.
#[derive(Debug, Clone)]
pub struct DataFrame {
    /// Frame the data belongs to.
    pub frame_id: Option<FrameId>,

    /// Navigation the data belongs to.
    pub loader_id: Option<LoaderId>,

    /// Resource URL.
    pub url: String,

    /// Resource MIME type.
    pub mime_type: String,

    /// Security state of the connection that produced the data.
    pub security_state: Option<String>,
}

// ============================================================================
// Helpers
// ============================================================================

fn get_str(event: &Event, key: &str) -> String {
    event
        .params
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn get_opt_str(event: &Event, key: &str) -> Option<String> {
    event
        .params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn event(raw: &str) -> Event {
        serde_json::from_str(raw).expect("valid event json")
    }

    #[test]
    fn test_parse_lifecycle_event() {
        let raw = r#"{
            "method": "Page.lifecycleEvent",
            "params": {
                "frameId": "F1",
                "loaderId": "L1",
                "name": "load",
                "timestamp": 123.5
            }
        }"#;

        match ParsedEvent::parse(&event(raw)) {
            ParsedEvent::Lifecycle(lifecycle) => {
                assert_eq!(lifecycle.frame_id, FrameId::from("F1"));
                assert_eq!(lifecycle.loader_id, Some(LoaderId::from("L1")));
                assert_eq!(lifecycle.name, "load");
                assert!(lifecycle.is_load_class());
                assert!(!lifecycle.is_network_idle());
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_parse_lifecycle_without_loader() {
        let raw = r#"{
            "method": "Page.lifecycleEvent",
            "params": { "frameId": "F1", "name": "networkIdle" }
        }"#;

        match ParsedEvent::parse(&event(raw)) {
            ParsedEvent::Lifecycle(lifecycle) => {
                assert_eq!(lifecycle.loader_id, None);
                assert!(lifecycle.is_network_idle());
                assert!(lifecycle.is_load_class());
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_parse_rich_data_received() {
        let raw = r#"{
            "method": "Network.responseReceived",
            "params": {
                "frameId": "F1",
                "loaderId": "L1",
                "response": {
                    "url": "https://example.com/style.css",
                    "mimeType": "text/css",
                    "securityState": "secure"
                }
            }
        }"#;

        match ParsedEvent::parse(&event(raw)) {
            ParsedEvent::DataReceived(frame) => {
                assert_eq!(frame.frame_id, Some(FrameId::from("F1")));
                assert_eq!(frame.loader_id, Some(LoaderId::from("L1")));
                assert_eq!(frame.mime_type, "text/css");
                assert_eq!(frame.security_state.as_deref(), Some("secure"));
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_parse_simple_data_received() {
        let raw = r#"{
            "method": "Network.dataReceived",
            "params": { "requestId": "R1", "dataLength": 512 }
        }"#;

        match ParsedEvent::parse(&event(raw)) {
            ParsedEvent::DataReceived(frame) => {
                assert_eq!(frame.frame_id, None);
                assert_eq!(frame.loader_id, None);
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_parse_unknown() {
        let raw = r#"{"method":"Runtime.consoleAPICalled","params":{}}"#;
        match ParsedEvent::parse(&event(raw)) {
            ParsedEvent::Unknown { method } => assert_eq!(method, "Runtime.consoleAPICalled"),
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_dom_content_loaded_is_not_load_class() {
        let raw = r#"{
            "method": "Page.lifecycleEvent",
            "params": { "frameId": "F1", "loaderId": "L1", "name": "DOMContentLoaded" }
        }"#;
        match ParsedEvent::parse(&event(raw)) {
            ParsedEvent::Lifecycle(lifecycle) => assert!(!lifecycle.is_load_class()),
            other => panic!("unexpected parse: {other:?}"),
        }
    }
}
