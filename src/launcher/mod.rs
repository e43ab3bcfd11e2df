//! Browser process launching.
//!
//! [`Launcher`] turns "give me a browser" into a live [`Session`]:
//!
//! 1. Resolve the executable (explicit path or [`locator`] discovery)
//! 2. Spawn it with a throwaway profile and an OS-assigned debugging port
//! 3. Scan stderr for the endpoint banner the browser prints on startup
//! 4. Connect the WebSocket transport and attach a page target
//!
//! Every launch is fully isolated: its own process, profile directory,
//! and connection. The profile directory is removed when the session
//! closes.

// ============================================================================
// Submodules
// ============================================================================

/// Executable discovery across platforms.
pub mod locator;

/// Command-line construction.
pub mod options;

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::InstanceId;
use crate::logging::{LogSink, SessionLog};
use crate::session::{ReadySignal, Session, SessionConfig, TimeoutPolicy};
use crate::transport::Connection;

pub use options::ChromiumOptions;

// ============================================================================
// Constants
// ============================================================================

/// Prefix of the stderr line announcing the debugging endpoint.
const ENDPOINT_BANNER: &str = "DevTools listening on ";

/// How long to wait for the endpoint banner before giving up.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(20);

/// Stderr lines scanned before concluding the banner is not coming.
const MAX_BANNER_SCAN_LINES: usize = 200;

// ============================================================================
// Launcher
// ============================================================================

/// Configured browser launcher.
///
/// Build one with [`Launcher::builder`], then call [`Launcher::launch`]
/// once per conversion. The launcher itself is reusable.
#[derive(Debug, Clone)]
pub struct Launcher {
    /// Explicit executable path; discovery runs when absent.
    binary: Option<PathBuf>,

    /// Command-line profile.
    options: ChromiumOptions,

    /// Session tuning applied to every launched session.
    config: SessionConfig,

    /// Shared destination for conversion traces, if enabled.
    log_sink: Option<LogSink>,
}

impl Launcher {
    /// Starts building a launcher.
    #[must_use]
    pub fn builder() -> LauncherBuilder {
        LauncherBuilder::default()
    }

    /// Launches a browser and attaches a fresh session to it.
    ///
    /// # Errors
    ///
    /// - [`Error::BinaryNotFound`] if no executable could be resolved
    /// - [`Error::Launch`] if the process dies or never prints its
    ///   endpoint banner
    /// - [`Error::Connection`] if the transport cannot be established
    pub async fn launch(&self) -> Result<Session> {
        let binary = self.resolve_binary()?;
        let instance_id = InstanceId::generate();
        let log = match &self.log_sink {
            Some(sink) => SessionLog::new(sink.clone(), Some(instance_id.clone())),
            None => SessionLog::disabled(),
        };

        let profile_dir = tempfile::Builder::new()
            .prefix("chromium-printer-")
            .tempdir()
            .map_err(|e| Error::launch(format!("cannot create profile directory: {e}")))?;

        let mut command = Command::new(&binary);
        command
            .args(self.options.to_args())
            .arg(format!("--user-data-dir={}", profile_dir.path().display()))
            // Port 0 makes the OS pick; the banner tells us which.
            .arg("--remote-debugging-port=0")
            .arg("about:blank")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(binary = %binary.display(), instance = %instance_id, "Launching browser");
        log.line(&format!("launching {}", binary.display()));

        let mut child = command
            .spawn()
            .map_err(|e| Error::launch(format!("cannot spawn {}: {e}", binary.display())))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::launch("browser stderr not captured"))?;

        let ws_url = match tokio::time::timeout(
            STARTUP_TIMEOUT,
            scan_for_endpoint(&mut child, stderr),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                let _ = child.kill().await;
                return Err(Error::launch(format!(
                    "no debugging endpoint within {}s",
                    STARTUP_TIMEOUT.as_secs()
                )));
            }
        };

        debug!(endpoint = %ws_url, "Browser announced debugging endpoint");
        log.line(&format!("endpoint {ws_url}"));

        let (connection, events) = Connection::connect(ws_url.as_str(), log.clone()).await?;
        Session::attach(
            connection,
            events,
            Some(child),
            Some(profile_dir),
            self.config.clone(),
            log,
        )
        .await
    }

    /// Picks the executable: explicit path first, then discovery.
    fn resolve_binary(&self) -> Result<PathBuf> {
        if let Some(path) = &self.binary {
            if path.is_file() {
                return Ok(path.clone());
            }
            return Err(Error::binary_not_found(path.display().to_string()));
        }

        locator::find()?.ok_or_else(|| Error::binary_not_found("<well-known locations>"))
    }
}

/// Reads stderr until the endpoint banner appears and validates the URL.
///
/// Keeps draining stderr in the background afterwards so the browser
/// never blocks on a full pipe.
async fn scan_for_endpoint(
    child: &mut Child,
    stderr: tokio::process::ChildStderr,
) -> Result<Url> {
    let mut lines = BufReader::new(stderr).lines();
    let mut scanned = 0usize;

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            status = child.wait() => {
                let status = status?;
                return Err(Error::launch(format!(
                    "browser exited before announcing its endpoint: {status}"
                )));
            }
        };

        let Some(line) = line else {
            return Err(Error::launch(
                "browser stderr closed before announcing its endpoint",
            ));
        };

        if let Some(endpoint) = parse_endpoint_line(&line) {
            let url = Url::parse(endpoint)
                .map_err(|e| Error::launch(format!("malformed endpoint {endpoint:?}: {e}")))?;
            if url.scheme() != "ws" {
                return Err(Error::launch(format!(
                    "unexpected endpoint scheme {:?}",
                    url.scheme()
                )));
            }

            // Keep the pipe flowing for the lifetime of the process.
            tokio::spawn(async move {
                let mut lines = lines;
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "chromium_printer::browser_stderr", "{line}");
                }
            });

            return Ok(url);
        }

        scanned += 1;
        if scanned >= MAX_BANNER_SCAN_LINES {
            warn!(scanned, "Giving up on endpoint banner");
            return Err(Error::launch(format!(
                "no endpoint banner in the first {MAX_BANNER_SCAN_LINES} stderr lines"
            )));
        }
    }
}

/// Extracts the WebSocket URL from an endpoint banner line, if it is one.
fn parse_endpoint_line(line: &str) -> Option<&str> {
    line.trim_start()
        .strip_prefix(ENDPOINT_BANNER)
        .map(str::trim)
        .filter(|rest| !rest.is_empty())
}

// ============================================================================
// LauncherBuilder
// ============================================================================

/// Builder for [`Launcher`].
#[derive(Debug, Clone, Default)]
pub struct LauncherBuilder {
    binary: Option<PathBuf>,
    options: ChromiumOptions,
    config: SessionConfig,
    log_sink: Option<LogSink>,
}

impl LauncherBuilder {
    /// Uses an explicit executable instead of discovery.
    #[must_use]
    pub fn binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary = Some(path.into());
        self
    }

    /// Sets the initial window size.
    #[must_use]
    pub fn window_size(mut self, width: u32, height: u32) -> Self {
        self.options.window_size = (width, height);
        self
    }

    /// Disables the browser sandbox.
    #[must_use]
    pub fn no_sandbox(mut self, no_sandbox: bool) -> Self {
        self.options.no_sandbox = no_sandbox;
        self
    }

    /// Appends one extra command-line flag.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.options.extra_args.push(arg.into());
        self
    }

    /// Selects the readiness signal to wait for after navigation.
    #[must_use]
    pub fn ready_signal(mut self, signal: ReadySignal) -> Self {
        self.config.ready_signal = signal;
        self
    }

    /// Sets the default page-load deadline.
    #[must_use]
    pub fn page_load_timeout(mut self, timeout: Duration) -> Self {
        self.config.page_load_timeout = timeout;
        self
    }

    /// Sets the per-command deadline.
    #[must_use]
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.command_timeout = timeout;
        self
    }

    /// Chooses what a missed page-load deadline does to `render_pdf`.
    #[must_use]
    pub fn timeout_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.config.timeout_policy = policy;
        self
    }

    /// Routes conversion traces to a shared sink.
    #[must_use]
    pub fn log_sink(mut self, sink: LogSink) -> Self {
        self.log_sink = Some(sink);
        self
    }

    /// Finishes the builder.
    #[must_use]
    pub fn build(self) -> Launcher {
        Launcher {
            binary: self.binary,
            options: self.options,
            config: self.config,
            log_sink: self.log_sink,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoint_line() {
        let line = "DevTools listening on ws://127.0.0.1:39461/devtools/browser/abc-123";
        assert_eq!(
            parse_endpoint_line(line),
            Some("ws://127.0.0.1:39461/devtools/browser/abc-123")
        );
    }

    #[test]
    fn test_parse_endpoint_line_trims_whitespace() {
        let line = "  DevTools listening on ws://127.0.0.1:9222/devtools/browser/x \n";
        assert_eq!(
            parse_endpoint_line(line),
            Some("ws://127.0.0.1:9222/devtools/browser/x")
        );
    }

    #[test]
    fn test_parse_endpoint_line_rejects_noise() {
        assert_eq!(parse_endpoint_line("[0830/120000:INFO] startup"), None);
        assert_eq!(parse_endpoint_line("DevTools listening on "), None);
        assert_eq!(parse_endpoint_line(""), None);
    }

    #[test]
    fn test_builder_explicit_binary_must_exist() {
        let launcher = Launcher::builder().binary("/nonexistent/chromium").build();
        let err = launcher.resolve_binary().unwrap_err();
        assert!(matches!(err, Error::BinaryNotFound { .. }));
    }

    #[test]
    fn test_builder_defaults() {
        let launcher = Launcher::builder().build();
        assert!(launcher.binary.is_none());
        assert!(launcher.log_sink.is_none());
        assert_eq!(launcher.config.ready_signal, ReadySignal::Load);
        assert_eq!(launcher.config.timeout_policy, TimeoutPolicy::Abort);
    }

    #[test]
    fn test_builder_threads_options_through() {
        let launcher = Launcher::builder()
            .window_size(800, 600)
            .no_sandbox(true)
            .arg("--lang=fr")
            .ready_signal(ReadySignal::NetworkIdle)
            .timeout_policy(TimeoutPolicy::PrintPartial)
            .build();

        let args = launcher.options.to_args();
        assert!(args.contains(&"--window-size=800,600".to_string()));
        assert!(args.contains(&"--no-sandbox".to_string()));
        assert!(args.contains(&"--lang=fr".to_string()));
        assert_eq!(launcher.config.ready_signal, ReadySignal::NetworkIdle);
    }
}
