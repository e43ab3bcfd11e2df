//! Conversion session: the upward API of the driver.
//!
//! A [`Session`] owns one browser process and one transport connection,
//! and exposes the three operations the conversion pipeline needs:
//!
//! - [`Session::navigate_and_wait_for_ready`] - navigate and block until
//!   the page reaches the configured readiness signal
//! - [`Session::print_to_pdf`] - trigger the PDF print and return bytes
//! - [`Session::close`] - tear everything down exactly once
//!
//! Many sessions run concurrently; each has its own process, connection,
//! and event stream, so they share nothing but the log sink.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `lifecycle` | Load-tracking state machine |

// ============================================================================
// Submodules
// ============================================================================

/// Page load tracking.
pub mod lifecycle;

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use parking_lot::Mutex;
use serde_json::Value;
use tempfile::TempDir;
use tokio::process::Child;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::identifiers::{FrameId, LoaderId, SessionId, TargetId};
use crate::logging::SessionLog;
use crate::protocol::{
    Event, MethodCall, NetworkCommand, PageCommand, ParsedEvent, PdfOptions, TargetCommand,
};
use crate::transport::{Connection, EventStream};

pub use lifecycle::{FrameTreeSnapshot, LoadState, LoadTracker, ReadySignal};

// ============================================================================
// Constants
// ============================================================================

/// Bounded wait for the best-effort target close during teardown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// TimeoutPolicy
// ============================================================================

/// What [`Session::render_pdf`] does when the page misses its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutPolicy {
    /// Fail the conversion with [`Error::PageLoadTimeout`].
    #[default]
    Abort,

    /// Print whatever has rendered so far.
    PrintPartial,
}

// ============================================================================
// SessionConfig
// ============================================================================

/// Per-session tuning.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Which lifecycle signal means "safe to print".
    pub ready_signal: ReadySignal,

    /// Default deadline for reaching readiness after a navigation.
    pub page_load_timeout: Duration,

    /// Deadline for individual protocol commands.
    pub command_timeout: Duration,

    /// Deadline policy for [`Session::render_pdf`].
    pub timeout_policy: TimeoutPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ready_signal: ReadySignal::default(),
            page_load_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(30),
            timeout_policy: TimeoutPolicy::default(),
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// One conversion's browser session.
///
/// Owns the browser process, its transport connection, and the inbound
/// event stream. Created by [`crate::launcher::Launcher::launch`].
pub struct Session {
    /// Transport connection (shared with the dispatcher task).
    connection: Connection,

    /// Inbound events; drained only by the navigation wait loop.
    events: AsyncMutex<EventStream>,

    /// Flat-mode protocol session of the attached page target.
    session_id: SessionId,

    /// The page target itself.
    target_id: TargetId,

    /// Browser process, if this session launched one.
    child: Mutex<Option<Child>>,

    /// Throwaway profile directory, removed at close.
    profile_dir: Mutex<Option<TempDir>>,

    /// Per-session tuning.
    config: SessionConfig,

    /// Per-conversion diagnostic log.
    log: SessionLog,

    /// Set once by `close`.
    closed: AtomicBool,
}

impl Session {
    /// Attaches a fresh page target over an established connection.
    ///
    /// Creates the target, attaches in flat mode, and enables the Page
    /// and Network domains plus lifecycle notifications.
    pub(crate) async fn attach(
        connection: Connection,
        events: EventStream,
        child: Option<Child>,
        profile_dir: Option<TempDir>,
        config: SessionConfig,
        log: SessionLog,
    ) -> Result<Self> {
        let created = Self::execute_on(
            &connection,
            MethodCall::Target(TargetCommand::CreateTarget {
                url: "about:blank".to_string(),
            }),
            None,
            config.command_timeout,
        )
        .await?;
        let target_id = created
            .get("targetId")
            .and_then(Value::as_str)
            .map(TargetId::new)
            .ok_or_else(|| Error::protocol("createTarget response missing targetId"))?;

        let attached = Self::execute_on(
            &connection,
            MethodCall::Target(TargetCommand::AttachToTarget {
                target_id: target_id.clone(),
                flatten: true,
            }),
            None,
            config.command_timeout,
        )
        .await?;
        let session_id = attached
            .get("sessionId")
            .and_then(Value::as_str)
            .map(SessionId::new)
            .ok_or_else(|| Error::protocol("attachToTarget response missing sessionId"))?;

        debug!(target = %target_id, session = %session_id, "Page target attached");

        let session = Self {
            connection,
            events: AsyncMutex::new(events),
            session_id,
            target_id,
            child: Mutex::new(child),
            profile_dir: Mutex::new(profile_dir),
            config,
            log,
            closed: AtomicBool::new(false),
        };

        session.execute(MethodCall::Page(PageCommand::Enable)).await?;
        session
            .execute(MethodCall::Page(PageCommand::SetLifecycleEventsEnabled {
                enabled: true,
            }))
            .await?;
        session
            .execute(MethodCall::Network(NetworkCommand::Enable))
            .await?;

        session
            .log
            .line(&format!("attached to target {}", session.target_id));
        Ok(session)
    }

    /// Navigates to a URL and waits until the page is safe to print.
    ///
    /// `timeout` overrides the session's default page-load deadline.
    ///
    /// # Errors
    ///
    /// - [`Error::PageLoadTimeout`] if readiness is not reached in time
    /// - [`Error::SessionClosed`] if the connection dies while waiting
    pub async fn navigate_and_wait_for_ready(
        &self,
        url: &str,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let deadline_after = timeout.unwrap_or(self.config.page_load_timeout);
        self.log.line(&format!("navigating to {url}"));

        let mut tracker = LoadTracker::new(self.config.ready_signal);

        let navigated = self
            .execute(MethodCall::Page(PageCommand::Navigate {
                url: url.to_string(),
            }))
            .await?;
        if let Some(error_text) = navigated
            .get("errorText")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
        {
            return Err(Error::protocol(format!("navigation failed: {error_text}")));
        }

        let snapshot = self
            .frame_tree_snapshot(navigated.get("loaderId").and_then(Value::as_str))
            .await?;
        tracker.begin_navigation(snapshot);

        let deadline = Instant::now() + deadline_after;
        let mut events = self.events.lock().await;

        loop {
            match timeout_at(deadline, events.recv()).await {
                Ok(Some(event)) => {
                    if !self.is_ours(&event) {
                        continue;
                    }
                    if tracker.on_event(&ParsedEvent::parse(&event)) == LoadState::Ready {
                        info!(url = %url, "Page ready");
                        self.log.line(&format!("page ready: {url}"));
                        return Ok(());
                    }
                }

                Ok(None) => return Err(Error::SessionClosed),

                Err(_) => {
                    tracker.on_deadline_elapsed();
                    let timeout_ms = deadline_after.as_millis() as u64;
                    warn!(url = %url, timeout_ms, "Page load deadline expired");
                    self.log
                        .line(&format!("page load timed out after {timeout_ms}ms: {url}"));
                    return Err(Error::page_load_timeout(url, timeout_ms));
                }
            }
        }
    }

    /// Loads in-memory HTML via a `data:` URL and waits for readiness.
    ///
    /// Lets callers print documents that never touch a server.
    pub async fn set_content(&self, html: &str) -> Result<()> {
        let data_url = format!("data:text/html;base64,{}", BASE64.encode(html));
        self.navigate_and_wait_for_ready(&data_url, None).await
    }

    /// Prints the current page to PDF and returns the document bytes.
    ///
    /// Callers should reach readiness first; printing mid-load yields
    /// whatever has rendered.
    pub async fn print_to_pdf(&self, options: &PdfOptions) -> Result<Vec<u8>> {
        let result = self
            .execute(MethodCall::Page(PageCommand::PrintToPdf(options.clone())))
            .await?;

        let data = result
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::protocol("printToPDF response missing data"))?;
        let bytes = BASE64
            .decode(data)
            .map_err(|e| Error::protocol(format!("printToPDF payload not base64: {e}")))?;

        self.log.line(&format!("printed {} PDF bytes", bytes.len()));
        Ok(bytes)
    }

    /// Navigates, waits for readiness, and prints, in one call.
    ///
    /// On a missed deadline the session's [`TimeoutPolicy`] decides
    /// between failing the conversion and printing partial content.
    pub async fn render_pdf(&self, url: &str, options: &PdfOptions) -> Result<Vec<u8>> {
        match self.navigate_and_wait_for_ready(url, None).await {
            Ok(()) => {}
            Err(err @ Error::PageLoadTimeout { .. }) => match self.config.timeout_policy {
                TimeoutPolicy::Abort => return Err(err),
                TimeoutPolicy::PrintPartial => {
                    self.log.line("deadline expired; printing partial content");
                }
            },
            Err(err) => return Err(err),
        }

        self.print_to_pdf(options).await
    }

    /// Tears the session down.
    ///
    /// Idempotent. Cancels all pending commands, ends the event stream,
    /// kills the browser process, and removes the temporary profile.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // Best effort: ask the browser to drop the target before the
        // transport goes away.
        let _ = Self::execute_on(
            &self.connection,
            MethodCall::Target(TargetCommand::CloseTarget {
                target_id: self.target_id.clone(),
            }),
            None,
            CLOSE_TIMEOUT,
        )
        .await;

        self.connection.shutdown();

        let child = self.child.lock().take();
        if let Some(mut child) = child {
            if let Err(e) = child.kill().await {
                debug!(error = %e, "Browser process already gone");
            }
        }

        self.profile_dir.lock().take();
        self.log.line("session closed");
        Ok(())
    }

    /// Returns the per-conversion log handle.
    #[inline]
    #[must_use]
    pub fn log(&self) -> &SessionLog {
        &self.log
    }

    /// Queries the frame tree and builds the navigation anchor.
    ///
    /// The loader id from the navigate response wins when the browser
    /// supplied one; the snapshot fills it in otherwise.
    async fn frame_tree_snapshot(&self, navigate_loader: Option<&str>) -> Result<FrameTreeSnapshot> {
        let tree = self
            .execute(MethodCall::Page(PageCommand::GetFrameTree))
            .await?;
        let frame = tree
            .pointer("/frameTree/frame")
            .ok_or_else(|| Error::protocol("getFrameTree response missing frame"))?;

        let frame_id = frame
            .get("id")
            .and_then(Value::as_str)
            .map(FrameId::new)
            .ok_or_else(|| Error::protocol("frame tree missing frame id"))?;
        let loader_id = navigate_loader
            .or_else(|| frame.get("loaderId").and_then(Value::as_str))
            .map(LoaderId::new)
            .ok_or_else(|| Error::protocol("frame tree missing loader id"))?;
        let url = frame
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(FrameTreeSnapshot {
            frame_id,
            loader_id,
            url,
        })
    }

    /// Runs one command in this session's scope.
    async fn execute(&self, call: MethodCall) -> Result<Value> {
        Self::execute_on(
            &self.connection,
            call,
            Some(self.session_id.clone()),
            self.config.command_timeout,
        )
        .await
    }

    /// Runs one command on a connection and unwraps the result payload.
    async fn execute_on(
        connection: &Connection,
        call: MethodCall,
        session_id: Option<SessionId>,
        command_timeout: Duration,
    ) -> Result<Value> {
        connection
            .send_with_timeout(call, session_id, command_timeout)
            .await?
            .into_result()
    }

    /// Returns `true` if an event belongs to this session.
    ///
    /// Browser-level events carry no session id and pass through.
    fn is_ours(&self, event: &Event) -> bool {
        event
            .session_id
            .as_ref()
            .is_none_or(|id| *id == self.session_id)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::SeqCst) {
            self.connection.shutdown();
            if let Some(child) = self.child.lock().as_mut() {
                let _ = child.start_kill();
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    const PDF_BYTES: &[u8] = b"%PDF-1.4 fake document";

    /// Fake browser speaking just enough of the protocol for a session.
    ///
    /// `lifecycle_frames` are pushed right after answering
    /// `Page.navigate`; leave empty to simulate a page that never loads.
    async fn fake_browser(lifecycle_frames: Vec<String>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = accept_async(stream).await.expect("handshake");
            let mut lifecycle_frames = Some(lifecycle_frames);

            while let Some(Ok(message)) = ws.next().await {
                let WsMessage::Text(text) = message else {
                    continue;
                };
                let command: serde_json::Value =
                    serde_json::from_str(&text).expect("command json");
                let id = &command["id"];

                let result = match command["method"].as_str().expect("method") {
                    "Target.createTarget" => json!({ "targetId": "T1" }),
                    "Target.attachToTarget" => json!({ "sessionId": "S1" }),
                    "Page.navigate" => json!({ "frameId": "F1", "loaderId": "L9" }),
                    "Page.getFrameTree" => json!({
                        "frameTree": {
                            "frame": {
                                "id": "F1",
                                "loaderId": "L9",
                                "url": "https://example.com"
                            }
                        }
                    }),
                    "Page.printToPDF" => json!({ "data": BASE64.encode(PDF_BYTES) }),
                    // Page.enable, Network.enable, lifecycle toggle,
                    // Target.closeTarget
                    _ => json!({}),
                };

                let reply = json!({ "id": id, "result": result }).to_string();
                if ws.send(WsMessage::Text(reply.into())).await.is_err() {
                    return;
                }

                if command["method"] == "Page.navigate"
                    && let Some(frames) = lifecycle_frames.take()
                {
                    for frame in frames {
                        if ws.send(WsMessage::Text(frame.into())).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });

        format!("ws://{addr}")
    }

    fn lifecycle_frame(session: &str, loader: &str, name: &str) -> String {
        json!({
            "method": "Page.lifecycleEvent",
            "params": { "frameId": "F1", "loaderId": loader, "name": name },
            "sessionId": session
        })
        .to_string()
    }

    async fn attach_to(url: &str, config: SessionConfig) -> Session {
        let (connection, events) = Connection::connect(url, SessionLog::disabled())
            .await
            .expect("connect");
        Session::attach(connection, events, None, None, config, SessionLog::disabled())
            .await
            .expect("attach")
    }

    #[tokio::test]
    async fn test_navigate_and_print() {
        // Foreign-session and stale-loader events first; only the last
        // frame may trigger readiness.
        let url = fake_browser(vec![
            lifecycle_frame("OTHER", "L9", "load"),
            lifecycle_frame("S1", "L0", "load"),
            lifecycle_frame("S1", "L9", "load"),
        ])
        .await;

        let session = attach_to(&url, SessionConfig::default()).await;

        session
            .navigate_and_wait_for_ready("https://example.com", Some(Duration::from_secs(2)))
            .await
            .expect("ready");

        let pdf = session
            .print_to_pdf(&PdfOptions::default())
            .await
            .expect("pdf");
        assert_eq!(pdf, PDF_BYTES);

        session.close().await.expect("close");
    }

    #[tokio::test]
    async fn test_page_load_timeout() {
        let url = fake_browser(vec![]).await;
        let session = attach_to(&url, SessionConfig::default()).await;

        let err = session
            .navigate_and_wait_for_ready("https://example.com", Some(Duration::from_millis(250)))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::PageLoadTimeout { .. }));
        session.close().await.expect("close");
    }

    #[tokio::test]
    async fn test_render_pdf_abort_policy() {
        let url = fake_browser(vec![]).await;
        let config = SessionConfig {
            page_load_timeout: Duration::from_millis(250),
            ..Default::default()
        };
        let session = attach_to(&url, config).await;

        let err = session
            .render_pdf("https://example.com", &PdfOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PageLoadTimeout { .. }));

        session.close().await.expect("close");
    }

    #[tokio::test]
    async fn test_render_pdf_partial_policy() {
        let url = fake_browser(vec![]).await;
        let config = SessionConfig {
            page_load_timeout: Duration::from_millis(250),
            timeout_policy: TimeoutPolicy::PrintPartial,
            ..Default::default()
        };
        let session = attach_to(&url, config).await;

        let pdf = session
            .render_pdf("https://example.com", &PdfOptions::default())
            .await
            .expect("partial pdf");
        assert_eq!(pdf, PDF_BYTES);

        session.close().await.expect("close");
    }

    #[tokio::test]
    async fn test_network_idle_strictness_end_to_end() {
        let url = fake_browser(vec![
            lifecycle_frame("S1", "L9", "load"),
            lifecycle_frame("S1", "L9", "networkIdle"),
        ])
        .await;
        let config = SessionConfig {
            ready_signal: ReadySignal::NetworkIdle,
            ..Default::default()
        };
        let session = attach_to(&url, config).await;

        session
            .navigate_and_wait_for_ready("https://example.com", Some(Duration::from_secs(2)))
            .await
            .expect("ready after networkIdle");

        session.close().await.expect("close");
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let url = fake_browser(vec![]).await;
        let session = attach_to(&url, SessionConfig::default()).await;

        session.close().await.expect("first close");
        session.close().await.expect("second close");

        // Everything pending was cancelled; new work is refused.
        let err = session
            .navigate_and_wait_for_ready("https://example.com", Some(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionClosed));
    }
}
