//! Typed method calls organized by protocol domain.
//!
//! Only the subset of the protocol needed to launch, navigate, observe
//! load completion, and trigger a PDF print is modeled here.
//!
//! # Domains
//!
//! | Domain | Methods |
//! |--------|---------|
//! | `Page` | enable, navigate, getFrameTree, setLifecycleEventsEnabled, printToPDF |
//! | `Network` | enable |
//! | `Target` | createTarget, attachToTarget, closeTarget |

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;

use crate::identifiers::TargetId;

// ============================================================================
// MethodCall Wrapper
// ============================================================================

/// All supported method calls.
///
/// This enum wraps domain-specific command enums for unified serialization
/// into the wire `method`/`params` pair.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MethodCall {
    /// Page domain commands.
    Page(PageCommand),
    /// Network domain commands.
    Network(NetworkCommand),
    /// Target domain commands.
    Target(TargetCommand),
}

// ============================================================================
// Page Commands
// ============================================================================

/// Page domain commands for navigation, load tracking, and printing.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", content = "params")]
pub enum PageCommand {
    /// Enable page domain notifications.
    #[serde(rename = "Page.enable")]
    Enable,

    /// Navigate the page to a URL.
    #[serde(rename = "Page.navigate")]
    Navigate {
        /// URL to navigate to.
        url: String,
    },

    /// Query the current frame tree.
    ///
    /// The top-level frame's loader id anchors load tracking for the
    /// navigation in progress.
    #[serde(rename = "Page.getFrameTree")]
    GetFrameTree,

    /// Toggle `Page.lifecycleEvent` notifications.
    #[serde(rename = "Page.setLifecycleEventsEnabled")]
    SetLifecycleEventsEnabled {
        /// Whether lifecycle events should be emitted.
        enabled: bool,
    },

    /// Print the current page to PDF.
    #[serde(rename = "Page.printToPDF")]
    PrintToPdf(PdfOptions),
}

// ============================================================================
// Network Commands
// ============================================================================

/// Network domain commands.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", content = "params")]
pub enum NetworkCommand {
    /// Enable network domain notifications.
    #[serde(rename = "Network.enable")]
    Enable,
}

// ============================================================================
// Target Commands
// ============================================================================

/// Target domain commands for page target setup and teardown.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", content = "params")]
pub enum TargetCommand {
    /// Create a new page target.
    #[serde(rename = "Target.createTarget")]
    CreateTarget {
        /// Initial URL for the target.
        url: String,
    },

    /// Attach to a target in flat session mode.
    #[serde(rename = "Target.attachToTarget")]
    AttachToTarget {
        /// Target to attach to.
        #[serde(rename = "targetId")]
        target_id: TargetId,
        /// Flat mode: commands carry a `sessionId` instead of nesting.
        flatten: bool,
    },

    /// Close a page target.
    #[serde(rename = "Target.closeTarget")]
    CloseTarget {
        /// Target to close.
        #[serde(rename = "targetId")]
        target_id: TargetId,
    },
}

// ============================================================================
// PdfOptions
// ============================================================================

/// Options for `Page.printToPDF`.
///
/// Field names match the protocol; sizes are in inches. Defaults are US
/// Letter with background graphics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfOptions {
    /// Landscape orientation.
    pub landscape: bool,

    /// Print the header and footer bands.
    pub display_header_footer: bool,

    /// Include CSS backgrounds.
    pub print_background: bool,

    /// Scale factor, 0.1–2.0.
    pub scale: f64,

    /// Paper width in inches.
    pub paper_width: f64,

    /// Paper height in inches.
    pub paper_height: f64,

    /// Top margin in inches.
    pub margin_top: f64,

    /// Bottom margin in inches.
    pub margin_bottom: f64,

    /// Left margin in inches.
    pub margin_left: f64,

    /// Right margin in inches.
    pub margin_right: f64,

    /// Page ranges such as `"1-5, 8"`; empty means all pages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_ranges: Option<String>,

    /// Honor any CSS `@page` size over the paper fields above.
    pub prefer_css_page_size: bool,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            landscape: false,
            display_header_footer: false,
            print_background: true,
            scale: 1.0,
            paper_width: 8.5,
            paper_height: 11.0,
            margin_top: 0.4,
            margin_bottom: 0.4,
            margin_left: 0.4,
            margin_right: 0.4,
            page_ranges: None,
            prefer_css_page_size: false,
        }
    }
}

impl PdfOptions {
    /// A4 paper with the default margins.
    #[must_use]
    pub fn a4() -> Self {
        Self {
            paper_width: 8.27,
            paper_height: 11.69,
            ..Self::default()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
