//! Browser launch configuration.

use std::path::PathBuf;
use std::time::Duration;

/// How the shared Chromium process is launched (or attached to).
#[derive(Debug, Clone)]
pub struct BrowserLaunchConfig {
    /// Explicit Chrome/Chromium executable. Falls back to well-known paths
    /// and `which` when unset.
    pub executable: Option<PathBuf>,
    /// Attach to an already-running browser instead of launching one.
    pub remote_url: Option<String>,
    /// Run headless. Headful is only useful when debugging selectors.
    pub headless: bool,
    /// Bound on the launch/attach itself.
    pub launch_timeout: Duration,
    /// Per-action timeout used for navigation and selector waits.
    pub action_timeout: Duration,
    /// Extra Chrome arguments.
    pub chrome_args: Vec<String>,
}

impl Default for BrowserLaunchConfig {
    fn default() -> Self {
        Self {
            executable: None,
            remote_url: None,
            headless: true,
            launch_timeout: Duration::from_secs(30),
            action_timeout: Duration::from_secs(20),
            chrome_args: Vec::new(),
        }
    }
}
