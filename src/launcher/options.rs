//! Browser command-line construction.

// ============================================================================
// ChromiumOptions
// ============================================================================

/// Command-line profile for a headless print instance.
///
/// The defaults match what unattended HTML-to-PDF conversion needs; the
/// launcher appends the per-instance flags (profile directory, debugging
/// port) on top.
#[derive(Debug, Clone)]
pub struct ChromiumOptions {
    /// Run without a visible window.
    pub headless: bool,

    /// Initial window size in pixels, for layouts that measure the
    /// viewport.
    pub window_size: (u32, u32),

    /// Disable GPU compositing; avoids driver trouble on servers.
    pub disable_gpu: bool,

    /// Disable the sandbox. Required in some container images; off by
    /// default.
    pub no_sandbox: bool,

    /// Extra flags appended verbatim after the generated ones.
    pub extra_args: Vec<String>,
}

impl Default for ChromiumOptions {
    fn default() -> Self {
        Self {
            headless: true,
            window_size: (1280, 720),
            disable_gpu: true,
            no_sandbox: false,
            extra_args: Vec::new(),
        }
    }
}

impl ChromiumOptions {
    /// Renders the options into process arguments.
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.headless {
            args.push("--headless=new".to_string());
        }
        if self.disable_gpu {
            args.push("--disable-gpu".to_string());
        }
        if self.no_sandbox {
            args.push("--no-sandbox".to_string());
        }

        let (width, height) = self.window_size;
        args.push(format!("--window-size={width},{height}"));

        // Background throttling stalls lifecycle events in headless runs.
        args.push("--disable-background-timer-throttling".to_string());
        args.push("--no-first-run".to_string());
        args.push("--no-default-browser-check".to_string());

        args.extend(self.extra_args.iter().cloned());
        args
    }
}

// ============================================================================
// Tests
// ============================================================================
