//! Platform-specific browser executable discovery.
//!
//! Probes the well-known install locations for a Chromium-family browser,
//! most specific first, and returns the first executable that exists.
//! Callers that know where their browser lives should configure the path
//! explicitly and skip discovery entirely.

// ============================================================================
// Imports
// ============================================================================

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;

// ============================================================================
// Discovery
// ============================================================================

/// Searches the platform's well-known locations for a browser binary.
///
/// Returns `Ok(None)` when no candidate exists; discovery failing is not
/// an error, only an unsupported platform is.
///
/// # Errors
///
/// [`crate::Error::UnsupportedPlatform`] on operating systems with no
/// known install locations.
pub fn find() -> Result<Option<PathBuf>> {
    let found = find_for_platform()?;
    match &found {
        Some(path) => debug!(path = %path.display(), "Located browser binary"),
        None => debug!("No browser binary in well-known locations"),
    }
    Ok(found)
}

#[cfg(target_os = "linux")]
fn find_for_platform() -> Result<Option<PathBuf>> {
    // Branded builds first, then distro Chromium.
    const NAMES: &[&str] = &[
        "google-chrome",
        "google-chrome-stable",
        "google-chrome-beta",
        "google-chrome-unstable",
        "chromium",
        "chromium-browser",
    ];
    const DIRS: &[&str] = &["/usr/bin", "/usr/local/bin", "/opt/google/chrome", "/snap/bin"];

    Ok(find_in(DIRS.iter().map(Path::new), NAMES))
}

#[cfg(target_os = "macos")]
fn find_for_platform() -> Result<Option<PathBuf>> {
    const BUNDLES: &[&str] = &[
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
    ];

    Ok(BUNDLES
        .iter()
        .map(PathBuf::from)
        .find(|path| path.is_file()))
}

#[cfg(target_os = "windows")]
fn find_for_platform() -> Result<Option<PathBuf>> {
    const NAMES: &[&str] = &["chrome.exe", "msedge.exe"];

    // The App Paths registration is authoritative when present.
    if let Some(path) = find_in_registry() {
        return Ok(Some(path));
    }

    let mut dirs = Vec::new();
    // A browser co-located with our own executable wins over installs.
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        dirs.push(exe_dir);
    }
    for var in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
        if let Ok(base) = std::env::var(var) {
            dirs.push(PathBuf::from(&base).join("Google\\Chrome\\Application"));
            dirs.push(PathBuf::from(&base).join("Microsoft\\Edge\\Application"));
            dirs.push(PathBuf::from(&base).join("Chromium\\Application"));
        }
    }

    Ok(find_in(dirs.iter().map(PathBuf::as_path), NAMES))
}

#[cfg(target_os = "windows")]
fn find_in_registry() -> Option<PathBuf> {
    use winreg::RegKey;
    use winreg::enums::HKEY_LOCAL_MACHINE;

    let app_paths = RegKey::predef(HKEY_LOCAL_MACHINE)
        .open_subkey("SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\App Paths\\chrome.exe")
        .ok()?;
    let path: String = app_paths.get_value("").ok()?;
    let path = PathBuf::from(path);
    path.is_file().then_some(path)
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn find_for_platform() -> Result<Option<PathBuf>> {
    Err(crate::error::Error::unsupported_platform())
}

/// Returns the first `dir/name` combination that is an existing file.
///
/// Name order outranks directory order: every directory is probed for the
/// most preferred name before any less preferred name is considered.
fn find_in<'a>(dirs: impl Iterator<Item = &'a Path> + Clone, names: &[&str]) -> Option<PathBuf> {
    for name in names {
        for dir in dirs.clone() {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

// ============================================================================
// Tests
// ============================================================================
