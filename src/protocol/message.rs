//! Wire envelopes and the message codec.
//!
//! One UTF-8 JSON object per transport unit. Outgoing [`Command`]s carry an
//! integer correlation id; inbound text decodes to a [`Message`], either a
//! [`Response`] (has `id`) or an [`Event`] (has `method`, no `id`).
//!
//! Unknown and extra fields are ignored for forward compatibility with
//! newer protocol revisions. Text that is not valid JSON, or that carries
//! neither discriminating field, decodes to [`Error::MalformedMessage`];
//! the dispatcher logs and drops such messages without ending the session.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::{CommandId, SessionId};

use super::command::MethodCall;

// ============================================================================
// Command
// ============================================================================

/// An outgoing method call.
///
/// # Format
///
/// ```json
/// {
///   "id": 4,
///   "method": "Page.navigate",
///   "params": { "url": "https://example.com" },
///   "sessionId": "8D3F..."
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Command {
    /// Correlation identifier, unique within the session.
    pub id: CommandId,

    /// Method and params.
    #[serde(flatten)]
    pub call: MethodCall,

    /// Flat-mode session routing; browser-level commands omit it.
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

impl Command {
    /// Creates a command with the given correlation id.
    #[inline]
    #[must_use]
    pub fn new(id: CommandId, call: MethodCall, session_id: Option<SessionId>) -> Self {
        Self {
            id,
            call,
            session_id,
        }
    }

    /// Encodes the command as one wire unit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Response
// ============================================================================

/// A response to one command.
///
/// Carries either `result` or `error`; both decode tolerantly so a
/// malformed peer cannot crash the dispatcher.
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    /// Matches the command `id`.
    pub id: CommandId,

    /// Result payload (if success).
    #[serde(default)]
    pub result: Option<Value>,

    /// Error payload (if failure).
    #[serde(default)]
    pub error: Option<ResponseError>,

    /// Session the command was routed to.
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<SessionId>,
}

impl Response {
    /// Returns `true` if the browser reported an error.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Extracts the result payload, surfacing a browser error as
    /// [`Error::CommandFailed`].
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            Some(err) => Err(Error::command_failed(self.id, err.message)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }

    /// Gets a string value from the result.
    ///
    /// Returns `None` if the key is absent or not a string.
    #[inline]
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.result
            .as_ref()
            .and_then(|v| v.get(key))
            .and_then(|v| v.as_str())
    }
}

/// Error payload inside a [`Response`].
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseError {
    /// Protocol-defined error code.
    #[serde(default)]
    pub code: i64,

    /// Human-readable error message.
    #[serde(default)]
    pub message: String,
}

// ============================================================================
// Event
// ============================================================================

/// An unsolicited notification from the browser.
///
/// # Format
///
/// ```json
/// {
///   "method": "Page.lifecycleEvent",
///   "params": { "frameId": "F1", "loaderId": "L1", "name": "load" },
///   "sessionId": "8D3F..."
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    /// Event name in `Domain.eventName` format.
    pub method: String,

    /// Event-specific data.
    #[serde(default)]
    pub params: Value,

    /// Session the event originated from; browser-level events omit it.
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<SessionId>,
}

impl Event {
    /// Returns the domain name from the method.
    #[inline]
    #[must_use]
    pub fn domain(&self) -> &str {
        self.method.split('.').next().unwrap_or_default()
    }
}

// ============================================================================
// Message
// ============================================================================

/// Inbound message union.
#[derive(Debug, Clone)]
pub enum Message {
    /// Reply to a previously sent command.
    Response(Response),
    /// Unsolicited notification.
    Event(Event),
}

impl Message {
    /// Decodes one wire unit.
    ///
    /// Discrimination is by field presence: an `id` marks a response, a
    /// `method` without `id` marks an event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedMessage`] for invalid JSON or a message
    /// carrying neither discriminating field.
    pub fn decode(raw: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| Error::malformed(format!("invalid JSON: {e}")))?;

        if value.get("id").is_some() {
            let response: Response = serde_json::from_value(value)
                .map_err(|e| Error::malformed(format!("bad response shape: {e}")))?;
            return Ok(Self::Response(response));
        }

        if value.get("method").is_some() {
            let event: Event = serde_json::from_value(value)
                .map_err(|e| Error::malformed(format!("bad event shape: {e}")))?;
            return Ok(Self::Event(event));
        }

        Err(Error::malformed("message has neither id nor method"))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::command::PageCommand;

    #[test]
    fn test_command_encoding() {
        let command = Command::new(
            CommandId::new(1),
            MethodCall::Page(PageCommand::Navigate {
                url: "https://example.com".to_string(),
            }),
            Some(SessionId::from("S1")),
        );

        let json = command.encode().expect("encode");
        let value: Value = serde_json::from_str(&json).expect("valid json");

        assert_eq!(value["id"], 1);
        assert_eq!(value["method"], "Page.navigate");
        assert_eq!(value["params"]["url"], "https://example.com");
        assert_eq!(value["sessionId"], "S1");
    }

    #[test]
    fn test_command_without_session_omits_field() {
        let command = Command::new(
            CommandId::new(2),
            MethodCall::Page(PageCommand::Enable),
            None,
        );
        let json = command.encode().expect("encode");
        assert!(!json.contains("sessionId"));
    }

    #[test]
    fn test_decode_success_response() {
        let raw = r#"{"id":7,"result":{"frameId":"F1","loaderId":"L1"},"sessionId":"S1"}"#;
        match Message::decode(raw).expect("decode") {
            Message::Response(response) => {
                assert_eq!(response.id, CommandId::new(7));
                assert!(!response.is_error());
                assert_eq!(response.get_str("loaderId"), Some("L1"));
            }
            Message::Event(_) => panic!("expected response"),
        }
    }

    #[test]
    fn test_decode_error_response() {
        let raw = r#"{"id":3,"error":{"code":-32000,"message":"Cannot navigate"}}"#;
        match Message::decode(raw).expect("decode") {
            Message::Response(response) => {
                assert!(response.is_error());
                let err = response.into_result().unwrap_err();
                assert!(matches!(err, Error::CommandFailed { .. }));
                assert!(err.to_string().contains("Cannot navigate"));
            }
            Message::Event(_) => panic!("expected response"),
        }
    }

    #[test]
    fn test_decode_event() {
        let raw = r#"{"method":"Page.lifecycleEvent","params":{"name":"load"},"sessionId":"S1"}"#;
        match Message::decode(raw).expect("decode") {
            Message::Event(event) => {
                assert_eq!(event.method, "Page.lifecycleEvent");
                assert_eq!(event.domain(), "Page");
                assert_eq!(event.params["name"], "load");
            }
            Message::Response(_) => panic!("expected event"),
        }
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let raw = r#"{"id":1,"result":{},"futureField":{"nested":true},"another":42}"#;
        assert!(matches!(
            Message::decode(raw),
            Ok(Message::Response(_))
        ));

        let raw = r#"{"method":"Page.somethingNew","params":{},"extra":"yes"}"#;
        assert!(matches!(Message::decode(raw), Ok(Message::Event(_))));
    }

    #[test]
    fn test_decode_malformed() {
        let err = Message::decode("{not json").unwrap_err();
        assert!(matches!(err, Error::MalformedMessage { .. }));

        let err = Message::decode(r#"{"params":{}}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedMessage { .. }));
    }

    #[test]
    fn test_event_with_id_is_a_response() {
        // Presence of id wins regardless of other fields.
        let raw = r#"{"id":9,"result":{"method":"decoy"}}"#;
        assert!(matches!(Message::decode(raw), Ok(Message::Response(_))));
    }
}
