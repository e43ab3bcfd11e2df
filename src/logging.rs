//! Per-session diagnostic logging.
//!
//! Many conversions run concurrently and usually share one log destination
//! (a file or stderr). This module keeps that safe:
//!
//! - [`LogSink`] wraps the shared destination behind a single mutex so
//!   concurrent writers never interleave partial lines.
//! - [`SessionLog`] stamps every line with a timestamp and the session's
//!   instance identifier, so interleaved conversions can be demultiplexed
//!   after the fact.
//!
//! A sink that has been closed while a session is still writing is an
//! expected, recoverable condition: writes to it are silently dropped.
//!
//! Ambient crate diagnostics still go through `tracing`; this sink exists
//! for the caller-facing conversion trace.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::identifiers::InstanceId;

// ============================================================================
// LogSink
// ============================================================================

/// Shared, closeable log destination.
///
/// Cloning produces another handle to the same destination. The mutex is
/// held only for the duration of writing and flushing one line.
#[derive(Clone)]
pub struct LogSink {
    /// `None` once the sink has been closed.
    inner: Arc<Mutex<Option<Box<dyn Write + Send>>>>,
}

impl LogSink {
    /// Creates a sink over an arbitrary writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(writer))),
        }
    }

    /// Creates a sink writing to the process stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(io::stderr()))
    }

    /// Closes the sink.
    ///
    /// Subsequent writes from any handle are silently dropped. Idempotent.
    pub fn close(&self) {
        self.inner.lock().take();
    }

    /// Returns `true` if the sink has been closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().is_none()
    }

    /// Writes one line atomically.
    ///
    /// A closed sink, or a destination that errors mid-write, drops the
    /// line rather than failing the caller.
    pub(crate) fn write_line(&self, line: &str) {
        let mut guard = self.inner.lock();
        if let Some(writer) = guard.as_mut() {
            let _ = writeln!(writer, "{line}");
            let _ = writer.flush();
        }
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSink")
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ============================================================================
// SessionLog
// ============================================================================

/// Per-conversion tagged writer over a shared [`LogSink`].
///
/// Every line carries a timestamp and, when present, the session's
/// instance identifier:
///
/// ```text
/// 2026-08-30 14:02:11.372 [9f1c4b…] navigation ready after 412ms
/// ```
#[derive(Clone)]
pub struct SessionLog {
    sink: LogSink,
    instance_id: Option<InstanceId>,
}

impl SessionLog {
    /// Creates a session log over the given sink.
    #[must_use]
    pub fn new(sink: LogSink, instance_id: Option<InstanceId>) -> Self {
        Self { sink, instance_id }
    }

    /// Creates a session log that discards everything.
    #[must_use]
    pub fn disabled() -> Self {
        let sink = LogSink::new(Box::new(io::sink()));
        sink.close();
        Self {
            sink,
            instance_id: None,
        }
    }

    /// Returns the instance identifier, if any.
    #[inline]
    #[must_use]
    pub fn instance_id(&self) -> Option<&InstanceId> {
        self.instance_id.as_ref()
    }

    /// Writes one timestamped, tagged line.
    pub fn line(&self, message: &str) {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let formatted = match &self.instance_id {
            Some(id) => format!("{timestamp} [{id}] {message}"),
            None => format!("{timestamp} {message}"),
        };
        self.sink.write_line(&formatted);
    }
}

// ============================================================================
// Tests
// ============================================================================
