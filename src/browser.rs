//! Browser opener seam
//!
//! Opening the report is fire-and-forget: callers log failures and carry on.

use std::process::{Command, Stdio};

use crate::{Error, Result};

/// Opens a URL for the user.
pub trait BrowserOpener: Send + Sync {
    /// Open `url`.
    ///
    /// # Errors
    ///
    /// Returns error if no browser could be launched
    fn open(&self, url: &str) -> Result<()>;
}

/// The platform's default browser (`xdg-open`, `open` or `start`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl BrowserOpener for SystemBrowser {
    fn open(&self, url: &str) -> Result<()> {
        let mut command = platform_command(url);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        // the child is not awaited; the browser outlives the request
        command
            .spawn()
            .map(drop)
            .map_err(|e| Error::Internal(format!("failed to open browser for {url}: {e}")))
    }
}

#[cfg(target_os = "macos")]
fn platform_command(url: &str) -> Command {
    let mut command = Command::new("open");
    command.arg(url);
    command
}

#[cfg(target_os = "windows")]
fn platform_command(url: &str) -> Command {
    let mut command = Command::new("cmd");
    command.args(["/C", "start", "", url]);
    command
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn platform_command(url: &str) -> Command {
    let mut command = Command::new("xdg-open");
    command.arg(url);
    command
}

/// Never opens anything. Used for headless hosts and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBrowser;

impl BrowserOpener for NoBrowser {
    fn open(&self, _url: &str) -> Result<()> {
        Ok(())
    }
}
