//! Page load tracking.
//!
//! [`LoadTracker`] is a state machine driven by inbound events that
//! decides when a navigated page is safe to print:
//!
//! ```text
//! Idle ──navigate──► Navigating ──load-class──► WaitingForSignal ──signal──► Ready
//!                        │                            │
//!                        └────────── deadline ────────┴──────────────────► TimedOut
//! ```
//!
//! Every navigation is anchored on the loader id captured from the frame
//! tree at navigation start. Lifecycle and network events whose loader id
//! does not match the anchor belong to a prior navigation still draining
//! and are ignored. When a lifecycle event carries no loader id inline,
//! the tracker resolves it from the most recent data frame seen for the
//! same frame.
//!
//! `Ready` and `TimedOut` are terminal: later events, including further
//! matching signals, are no-ops.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::identifiers::{FrameId, LoaderId};
use crate::protocol::{DataFrame, LifecycleEvent, ParsedEvent};

// ============================================================================
// ReadySignal
// ============================================================================

/// Which lifecycle signal means "safe to print".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadySignal {
    /// Minimal: the `load` event (or anything stronger).
    #[default]
    Load,

    /// Strict: wait for the network to go idle after load.
    NetworkIdle,
}

impl ReadySignal {
    /// Returns `true` if the given lifecycle event satisfies this signal.
    #[inline]
    #[must_use]
    fn satisfied_by(self, event: &LifecycleEvent) -> bool {
        match self {
            Self::Load => event.is_load_class(),
            Self::NetworkIdle => event.is_network_idle(),
        }
    }
}

// ============================================================================
// LoadState
// ============================================================================

/// Tracker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// No navigation in flight.
    Idle,
    /// Navigation issued; waiting for the first matching load-class event.
    Navigating,
    /// Load seen; waiting for the configured readiness signal.
    WaitingForSignal,
    /// Safe to print. Terminal.
    Ready,
    /// Deadline expired before readiness. Terminal.
    TimedOut,
}

impl LoadState {
    /// Returns `true` for the two terminal states.
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::TimedOut)
    }
}

// ============================================================================
// FrameTreeSnapshot
// ============================================================================

/// Identity of the top-level frame at navigation start.
///
/// Obtained via the frame-tree query; its loader id is the anchor that
/// distinguishes this navigation's signals from stale ones.
#[derive(Debug, Clone)]
pub struct FrameTreeSnapshot {
    /// Top-level frame.
    pub frame_id: FrameId,
    /// Loader of the navigation under observation.
    pub loader_id: LoaderId,
    /// Frame URL at snapshot time.
    pub url: String,
}

// ============================================================================
// LoadTracker
// ============================================================================

/// State machine deciding when a navigated page is ready to print.
///
/// Purely synchronous: the session feeds it events and drives the
/// deadline; the tracker never waits on anything itself.
#[derive(Debug)]
pub struct LoadTracker {
    state: LoadState,
    ready_signal: ReadySignal,
    anchor: Option<FrameTreeSnapshot>,
    /// Most recent loader observed per frame from network data frames.
    last_loader: FxHashMap<FrameId, LoaderId>,
}

impl LoadTracker {
    /// Creates an idle tracker with the given readiness strictness.
    #[must_use]
    pub fn new(ready_signal: ReadySignal) -> Self {
        Self {
            state: LoadState::Idle,
            ready_signal,
            anchor: None,
            last_loader: FxHashMap::default(),
        }
    }

    /// Current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> LoadState {
        self.state
    }

    /// Returns `true` once the page is safe to print.
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == LoadState::Ready
    }

    /// Anchors a new navigation and enters `Navigating`.
    ///
    /// Resets any loader bookkeeping left over from a prior navigation on
    /// the same session.
    pub fn begin_navigation(&mut self, snapshot: FrameTreeSnapshot) {
        trace!(
            frame = %snapshot.frame_id,
            loader = %snapshot.loader_id,
            url = %snapshot.url,
            "Navigation anchored"
        );
        self.last_loader.clear();
        self.anchor = Some(snapshot);
        self.state = LoadState::Navigating;
    }

    /// Feeds one inbound event; returns the state afterwards.
    pub fn on_event(&mut self, event: &ParsedEvent) -> LoadState {
        if !self.state.is_terminal() {
            match event {
                ParsedEvent::Lifecycle(lifecycle) => self.on_lifecycle(lifecycle),
                ParsedEvent::DataReceived(frame) => self.on_data_frame(frame),
                ParsedEvent::Unknown { .. } => {}
            }
        }
        self.state
    }

    /// Marks the deadline as expired.
    ///
    /// Returns `true` if this call performed the transition to
    /// [`LoadState::TimedOut`]; a tracker that is already terminal is
    /// left untouched, so the timeout fires at most once.
    pub fn on_deadline_elapsed(&mut self) -> bool {
        if self.state.is_terminal() || self.state == LoadState::Idle {
            return false;
        }
        self.state = LoadState::TimedOut;
        true
    }

    fn on_lifecycle(&mut self, event: &LifecycleEvent) {
        let Some(anchor) = &self.anchor else {
            return;
        };

        if event.frame_id != anchor.frame_id {
            return;
        }

        // Inline loader wins; otherwise the most recent data frame for
        // this frame tells us which navigation the event belongs to.
        let loader = event
            .loader_id
            .clone()
            .or_else(|| self.last_loader.get(&event.frame_id).cloned());

        if loader.as_ref() != Some(&anchor.loader_id) {
            trace!(
                name = %event.name,
                loader = ?loader,
                anchor = %anchor.loader_id,
                "Ignoring stale lifecycle event"
            );
            return;
        }

        if self.state == LoadState::Navigating && event.is_load_class() {
            self.state = LoadState::WaitingForSignal;
        }

        if self.state == LoadState::WaitingForSignal && self.ready_signal.satisfied_by(event) {
            trace!(name = %event.name, "Page ready");
            self.state = LoadState::Ready;
        }
    }

    fn on_data_frame(&mut self, frame: &DataFrame) {
        // The simpler wire shape carries no frame identity; nothing to
        // learn from it.
        if let (Some(frame_id), Some(loader_id)) = (&frame.frame_id, &frame.loader_id) {
            self.last_loader
                .insert(frame_id.clone(), loader_id.clone());
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
