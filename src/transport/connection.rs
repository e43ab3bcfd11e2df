//! WebSocket connection, dispatcher loop, and command correlation.
//!
//! The connection spawns one tokio task that is the only reader of the
//! socket. It handles:
//!
//! - Outgoing commands from the session API
//! - Incoming responses, matched to pending callers by correlation id
//! - Incoming events, fanned out to the session's event stream
//!
//! Correlation ids come from a per-connection counter: strictly
//! increasing, starting at 1, never reused. A pending entry is registered
//! before the socket write and unregistered when the write fails, when the
//! caller times out, or when the matching response arrives. At teardown
//! every still-pending caller resolves with [`Error::SessionClosed`].
//!
//! No caller ever awaits inside the dispatch critical section; waiting
//! happens on a caller-owned oneshot channel.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{CommandId, SessionId};
use crate::logging::SessionLog;
use crate::protocol::{Command, Event, Message, MethodCall, Response};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for command execution.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum pending commands before rejecting new ones.
const MAX_PENDING_COMMANDS: usize = 64;

// ============================================================================
// Types
// ============================================================================

/// Map of command ids to response channels.
type PendingMap = FxHashMap<CommandId, oneshot::Sender<Result<Response>>>;

/// Socket type produced by the client handshake.
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Inbound event stream handed to the session.
///
/// Infinite and non-restartable; ends when the connection closes.
pub type EventStream = mpsc::UnboundedReceiver<Event>;

// ============================================================================
// DispatchCommand
// ============================================================================

/// Internal commands for the dispatcher loop.
enum DispatchCommand {
    /// Send a command and route its response to `response_tx`.
    Send {
        command: Command,
        response_tx: oneshot::Sender<Result<Response>>,
    },
    /// Remove a timed-out pending entry.
    RemovePending(CommandId),
    /// Shut the connection down.
    Shutdown,
}

// ============================================================================
// Connection
// ============================================================================

/// Duplex connection to the browser's debugging endpoint.
///
/// Cheap to clone; all clones share the dispatcher and the pending table.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync`. Sending suspends only the calling task,
/// never the dispatcher.
pub struct Connection {
    /// Channel into the dispatcher loop.
    command_tx: mpsc::UnboundedSender<DispatchCommand>,
    /// Pending table (shared with the dispatcher).
    pending: Arc<Mutex<PendingMap>>,
    /// Correlation id sequence; next value to hand out.
    sequence: Arc<AtomicU64>,
    /// Per-conversion diagnostic log.
    log: SessionLog,
}

impl Clone for Connection {
    fn clone(&self) -> Self {
        Self {
            command_tx: self.command_tx.clone(),
            pending: Arc::clone(&self.pending),
            sequence: Arc::clone(&self.sequence),
            log: self.log.clone(),
        }
    }
}

impl Connection {
    /// Dials the debugging endpoint and spawns the dispatcher task.
    ///
    /// Returns the connection plus the event stream that the session's
    /// load tracker consumes. The socket has exactly one reader for its
    /// whole life: the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WebSocket`] if the handshake fails.
    pub async fn connect(ws_url: &str, log: SessionLog) -> Result<(Self, EventStream)> {
        let (ws_stream, _) = connect_async(ws_url).await?;
        debug!(url = %ws_url, "Connected to debugging endpoint");
        log.line(&format!("connected to {ws_url}"));

        Ok(Self::from_stream(ws_stream, log))
    }

    /// Wraps an established socket and spawns the dispatcher.
    fn from_stream(ws_stream: WsStream, log: SessionLog) -> (Self, EventStream) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let pending: Arc<Mutex<PendingMap>> = Arc::new(Mutex::new(PendingMap::default()));

        tokio::spawn(Self::run_dispatcher(
            ws_stream,
            command_rx,
            Arc::clone(&pending),
            event_tx,
            log.clone(),
        ));

        (
            Self {
                command_tx,
                pending,
                sequence: Arc::new(AtomicU64::new(1)),
                log,
            },
            event_rx,
        )
    }

    /// Sends a command and waits for its response with the default timeout.
    ///
    /// # Errors
    ///
    /// - [`Error::SessionClosed`] if the connection is down
    /// - [`Error::RequestTimeout`] if no response arrives in time
    /// - [`Error::Protocol`] if too many commands are already pending
    pub async fn send(&self, call: MethodCall, session_id: Option<SessionId>) -> Result<Response> {
        self.send_with_timeout(call, session_id, DEFAULT_COMMAND_TIMEOUT)
            .await
    }

    /// Sends a command and waits for its response with a custom timeout.
    ///
    /// The pending entry is registered before the socket write; on timeout
    /// it is removed so a late response is silently discarded instead of
    /// leaking.
    ///
    /// # Errors
    ///
    /// Same as [`Connection::send`].
    pub async fn send_with_timeout(
        &self,
        call: MethodCall,
        session_id: Option<SessionId>,
        command_timeout: Duration,
    ) -> Result<Response> {
        {
            let pending = self.pending.lock();
            if pending.len() >= MAX_PENDING_COMMANDS {
                warn!(
                    pending = pending.len(),
                    max = MAX_PENDING_COMMANDS,
                    "Too many pending commands"
                );
                return Err(Error::protocol(format!(
                    "too many pending commands: {}/{}",
                    pending.len(),
                    MAX_PENDING_COMMANDS
                )));
            }
        }

        let id = self.next_id();
        let command = Command::new(id, call, session_id);
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(DispatchCommand::Send {
                command,
                response_tx,
            })
            .map_err(|_| Error::SessionClosed)?;

        match timeout(command_timeout, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::SessionClosed),
            Err(_) => {
                // Timed out; drop the pending entry so a late response is
                // discarded rather than resolving a vanished caller.
                let _ = self.command_tx.send(DispatchCommand::RemovePending(id));
                let timeout_ms = command_timeout.as_millis() as u64;
                self.log
                    .line(&format!("command {id} timed out after {timeout_ms}ms"));
                Err(Error::request_timeout(id, timeout_ms))
            }
        }
    }

    /// Returns the number of commands awaiting a response.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Shuts the connection down.
    ///
    /// Idempotent; the socket is closed exactly once and every pending
    /// caller resolves with [`Error::SessionClosed`].
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(DispatchCommand::Shutdown);
    }

    /// Hands out the next correlation id.
    fn next_id(&self) -> CommandId {
        CommandId::new(self.sequence.fetch_add(1, Ordering::Relaxed))
    }

    /// Dispatcher loop: sole reader of the socket.
    async fn run_dispatcher(
        ws_stream: WsStream,
        mut command_rx: mpsc::UnboundedReceiver<DispatchCommand>,
        pending: Arc<Mutex<PendingMap>>,
        event_tx: mpsc::UnboundedSender<Event>,
        log: SessionLog,
    ) {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                // Inbound messages from the browser
                message = ws_read.next() => {
                    match message {
                        Some(Ok(WsMessage::Text(text))) => {
                            Self::route_inbound(&text, &pending, &event_tx, &log);
                        }

                        Some(Ok(WsMessage::Close(_))) => {
                            debug!("WebSocket closed by browser");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket read error");
                            log.line(&format!("transport error: {e}"));
                            break;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Commands from the session API
                command = command_rx.recv() => {
                    match command {
                        Some(DispatchCommand::Send { command, response_tx }) => {
                            Self::write_command(command, response_tx, &mut ws_write, &pending)
                                .await;
                        }

                        Some(DispatchCommand::RemovePending(id)) => {
                            pending.lock().remove(&id);
                            debug!(%id, "Removed timed-out pending entry");
                        }

                        Some(DispatchCommand::Shutdown) => {
                            debug!("Shutdown requested");
                            let _ = ws_write.close().await;
                            break;
                        }

                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        Self::fail_pending(&pending, &log);
        debug!("Dispatcher terminated");
    }

    /// Routes one inbound text frame.
    ///
    /// Malformed messages and responses with no pending caller are logged
    /// and dropped; they never end the session.
    fn route_inbound(
        text: &str,
        pending: &Arc<Mutex<PendingMap>>,
        event_tx: &mpsc::UnboundedSender<Event>,
        log: &SessionLog,
    ) {
        match Message::decode(text) {
            Ok(Message::Response(response)) => {
                let tx = pending.lock().remove(&response.id);
                match tx {
                    Some(tx) => {
                        trace!(id = %response.id, "Response routed");
                        let _ = tx.send(Ok(response));
                    }
                    None => {
                        warn!(id = %response.id, "Response for unknown command");
                        log.line(&format!(
                            "discarded response for unknown command {}",
                            response.id
                        ));
                    }
                }
            }

            Ok(Message::Event(event)) => {
                trace!(method = %event.method, "Event routed");
                // Receiver gone means the session stopped listening;
                // remaining events are dropped on the floor.
                let _ = event_tx.send(event);
            }

            Err(e) => {
                warn!(error = %e, text = %text, "Dropped malformed message");
                log.line(&format!("dropped malformed message: {e}"));
            }
        }
    }

    /// Serializes and writes one command.
    async fn write_command(
        command: Command,
        response_tx: oneshot::Sender<Result<Response>>,
        ws_write: &mut SplitSink<WsStream, WsMessage>,
        pending: &Arc<Mutex<PendingMap>>,
    ) {
        let id = command.id;

        let json = match command.encode() {
            Ok(j) => j,
            Err(e) => {
                let _ = response_tx.send(Err(e));
                return;
            }
        };

        // Register before the write so the response cannot race past us.
        pending.lock().insert(id, response_tx);

        if let Err(e) = ws_write.send(WsMessage::Text(json.into())).await {
            // Send failed: unregister and notify the caller directly.
            if let Some(tx) = pending.lock().remove(&id) {
                let _ = tx.send(Err(Error::connection(e.to_string())));
            }
            return;
        }

        trace!(%id, "Command sent");
    }

    /// Fails every pending caller with [`Error::SessionClosed`].
    fn fail_pending(pending: &Arc<Mutex<PendingMap>>, log: &SessionLog) {
        let drained: Vec<_> = pending.lock().drain().collect();
        let count = drained.len();

        for (_, tx) in drained {
            let _ = tx.send(Err(Error::SessionClosed));
        }

        if count > 0 {
            debug!(count, "Cancelled pending commands at teardown");
            log.line(&format!("session closed with {count} pending commands"));
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{Value, json};
    use tokio::net::TcpListener;
    use tokio_test::assert_ok;
    use tokio_tungstenite::accept_async;

    use crate::protocol::PageCommand;

    /// Routes dispatcher diagnostics into the test harness output.
    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("chromium_printer=trace")
            .with_test_writer()
            .try_init();
    }

    /// Spawns a single-connection fake browser endpoint.
    ///
    /// `greetings` are pushed right after the handshake; `on_message` maps
    /// each inbound command to zero or more reply frames.
    async fn fake_browser<F>(greetings: Vec<String>, mut on_message: F) -> String
    where
        F: FnMut(Value) -> Vec<String> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = accept_async(stream).await.expect("handshake");

            for greeting in greetings {
                if ws.send(WsMessage::Text(greeting.into())).await.is_err() {
                    return;
                }
            }

            while let Some(Ok(message)) = ws.next().await {
                if let WsMessage::Text(text) = message {
                    let value: Value = serde_json::from_str(&text).expect("command json");
                    for reply in on_message(value) {
                        if ws.send(WsMessage::Text(reply.into())).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });

        format!("ws://{addr}")
    }

    fn navigate() -> MethodCall {
        MethodCall::Page(PageCommand::Navigate {
            url: "https://example.com".to_string(),
        })
    }

    #[tokio::test]
    async fn test_ids_strictly_increasing_from_one() {
        init_tracing();
        let url = fake_browser(vec![], |command| {
            vec![json!({ "id": command["id"], "result": {} }).to_string()]
        })
        .await;

        let (connection, _events) = Connection::connect(&url, SessionLog::disabled())
            .await
            .expect("connect");

        let first = connection.send(navigate(), None).await.expect("first");
        let second = connection.send(navigate(), None).await.expect("second");
        let third = connection.send(navigate(), None).await.expect("third");

        assert_eq!(first.id, CommandId::new(1));
        assert_eq!(second.id, CommandId::new(2));
        assert_eq!(third.id, CommandId::new(3));
        assert_eq!(connection.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_id_response_discarded_without_crosstalk() {
        let url = fake_browser(vec![], |command| {
            vec![
                // Stale response first; must not corrupt the real caller.
                json!({ "id": 999, "result": { "stale": true } }).to_string(),
                json!({ "id": command["id"], "result": { "ok": true } }).to_string(),
            ]
        })
        .await;

        let (connection, _events) = Connection::connect(&url, SessionLog::disabled())
            .await
            .expect("connect");

        let response = connection.send(navigate(), None).await.expect("send");
        assert_eq!(response.id, CommandId::new(1));
        assert_eq!(
            response.result.expect("result")["ok"],
            Value::Bool(true)
        );
        assert_eq!(connection.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_timeout_removes_pending_entry() {
        // Browser that never answers.
        let url = fake_browser(vec![], |_| vec![]).await;

        let (connection, _events) = Connection::connect(&url, SessionLog::disabled())
            .await
            .expect("connect");

        let err = connection
            .send_with_timeout(navigate(), None, Duration::from_millis(200))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::RequestTimeout { .. }));

        // Cleanup travels through the dispatcher; give it a beat.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(connection.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_messages_do_not_end_session() {
        let url = fake_browser(
            vec![
                "{oops".to_string(),
                json!({ "params": { "orphan": true } }).to_string(),
            ],
            |command| vec![json!({ "id": command["id"], "result": {} }).to_string()],
        )
        .await;

        let (connection, _events) = Connection::connect(&url, SessionLog::disabled())
            .await
            .expect("connect");

        // Garbage already arrived; the session must still work.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let response = tokio_test::assert_ok!(connection.send(navigate(), None).await);
        assert!(!response.is_error());
    }

    #[tokio::test]
    async fn test_events_fan_out_to_stream() {
        let lifecycle = json!({
            "method": "Page.lifecycleEvent",
            "params": { "frameId": "F1", "loaderId": "L1", "name": "load" },
            "sessionId": "S1"
        })
        .to_string();

        let url = fake_browser(vec![lifecycle], |_| vec![]).await;

        let (_connection, mut events) = Connection::connect(&url, SessionLog::disabled())
            .await
            .expect("connect");

        let event = events.recv().await.expect("event");
        assert_eq!(event.method, "Page.lifecycleEvent");
        assert_eq!(event.session_id, Some(SessionId::from("S1")));
    }

    #[tokio::test]
    async fn test_shutdown_fails_pending_with_session_closed() {
        let url = fake_browser(vec![], |_| vec![]).await;

        let (connection, _events) = Connection::connect(&url, SessionLog::disabled())
            .await
            .expect("connect");

        let waiter = {
            let connection = connection.clone();
            tokio::spawn(async move {
                connection
                    .send_with_timeout(navigate(), None, Duration::from_secs(30))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(connection.pending_count(), 1);

        connection.shutdown();
        // Idempotent.
        connection.shutdown();

        let result = waiter.await.expect("join");
        assert!(matches!(result, Err(Error::SessionClosed)));
        assert_eq!(connection.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_browser_side_error_response_surfaces() {
        let url = fake_browser(vec![], |command| {
            vec![
                json!({
                    "id": command["id"],
                    "error": { "code": -32000, "message": "Cannot navigate to invalid URL" }
                })
                .to_string(),
            ]
        })
        .await;

        let (connection, _events) = Connection::connect(&url, SessionLog::disabled())
            .await
            .expect("connect");

        let response = connection.send(navigate(), None).await.expect("send");
        let err = response.into_result().unwrap_err();
        assert!(matches!(err, Error::CommandFailed { .. }));
    }
}
