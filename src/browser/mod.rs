//! Shared browser lifecycle.
//!
//! One Chromium process serves every concurrent resolution; each resolution
//! opens its own page on top of it. The process is launched lazily on first
//! use and reclaimed by a periodic task when idle (see [`IdlePolicy`]).

mod config;
mod idle;

pub use config::BrowserLaunchConfig;
pub use idle::IdlePolicy;

#[cfg(feature = "browser")]
use std::sync::atomic::{AtomicUsize, Ordering};
#[cfg(feature = "browser")]
use std::sync::Arc;
#[cfg(feature = "browser")]
use std::time::Duration;

#[cfg(feature = "browser")]
use anyhow::{Context, Result};
#[cfg(feature = "browser")]
use tokio::sync::Mutex;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;

/// Owns the shared browser process and tracks open sessions.
#[cfg(feature = "browser")]
pub struct SessionManager {
    config: BrowserLaunchConfig,
    browser: Mutex<Option<Browser>>,
    open_sessions: AtomicUsize,
}

#[cfg(feature = "browser")]
impl SessionManager {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        // Common install locations
        "/opt/google/chrome/google-chrome",
    ];

    pub fn new(config: BrowserLaunchConfig) -> Self {
        Self {
            config,
            browser: Mutex::new(None),
            open_sessions: AtomicUsize::new(0),
        }
    }

    /// Find a Chrome executable: configured path, well-known paths, `which`.
    fn find_chrome(&self) -> Result<std::path::PathBuf> {
        if let Some(ref path) = self.config.executable {
            if path.exists() {
                return Ok(path.clone());
            }
            return Err(anyhow::anyhow!(
                "configured browser executable not found: {}",
                path.display()
            ));
        }

        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        info!("Found Chrome in PATH: {}", path);
                        return Ok(std::path::PathBuf::from(path));
                    }
                }
            }
        }

        Err(anyhow::anyhow!(
            "Chrome/Chromium not found; install it or set CHROME_PATH"
        ))
    }

    /// Open a new page on the shared browser, launching it if needed.
    ///
    /// Every `open_page` must be paired with [`close_page`](Self::close_page)
    /// so the session count stays accurate.
    pub async fn open_page(&self) -> Result<Page> {
        let mut guard = self.browser.lock().await;

        if guard.is_none() {
            *guard = Some(self.launch().await?);
        }

        let browser = guard
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("browser not initialized after launch"))?;
        let page = browser.new_page("about:blank").await?;
        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(page)
    }

    /// Close a page opened with [`open_page`](Self::open_page).
    pub async fn close_page(&self, page: Page) {
        if let Err(e) = page.close().await {
            debug!("Page close failed: {}", e);
        }
        let prev = self.open_sessions.fetch_sub(1, Ordering::SeqCst);
        if prev == 0 {
            // Unbalanced close; clamp rather than wrap.
            self.open_sessions.store(0, Ordering::SeqCst);
        }
    }

    /// Number of sessions currently open on the shared browser.
    pub fn open_session_count(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    async fn launch(&self) -> Result<Browser> {
        if let Some(remote_url) = self.config.remote_url.clone() {
            return self.connect_remote(&remote_url).await;
        }

        info!("Launching browser (headless={})", self.config.headless);
        let chrome_path = self.find_chrome()?;

        let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);

        // with_head means NOT headless, confusingly
        if !self.config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--no-sandbox") // Often needed for headless in containers/restricted environments
            .arg("--disable-gpu") // Recommended for headless
            .arg("--disable-software-rasterizer");

        for arg in &self.config.chrome_args {
            builder = builder.arg(arg.as_str());
        }

        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {}", e))?;

        let (browser, mut handler) =
            tokio::time::timeout(self.config.launch_timeout, Browser::launch(config))
                .await
                .map_err(|_| {
                    anyhow::anyhow!(
                        "browser launch timed out after {:?}",
                        self.config.launch_timeout
                    )
                })?
                .context("Failed to launch browser")?;

        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(browser)
    }

    /// Attach to a remote Chrome instance via its DevTools endpoint.
    async fn connect_remote(&self, url: &str) -> Result<Browser> {
        info!("Connecting to remote browser at {}", url);

        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let client = reqwest::Client::new();
        let resp: serde_json::Value = client
            .get(&version_url)
            .send()
            .await
            .context("Failed to connect to remote browser")?
            .json()
            .await
            .context("Failed to parse browser version info")?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("No webSocketDebuggerUrl in response"))?;

        let handler_config = chromiumoxide::handler::HandlerConfig {
            request_timeout: self.config.action_timeout,
            ..Default::default()
        };

        let (browser, mut handler) = Browser::connect_with_config(ws_url, handler_config)
            .await
            .context("Failed to connect to remote browser")?;

        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(browser)
    }

    /// Close the shared browser if the idle policy says so.
    pub async fn close_if_idle(&self, policy: &mut IdlePolicy) {
        let mut guard = self.browser.lock().await;
        if guard.is_none() {
            return;
        }
        let count = self.open_session_count();
        if policy.observe(count) {
            info!("Reclaiming idle browser ({} open sessions)", count);
            if let Some(mut browser) = guard.take() {
                if let Err(e) = browser.close().await {
                    warn!("Browser close failed: {}", e);
                }
            }
            self.open_sessions.store(0, Ordering::SeqCst);
        }
    }

    /// Close the shared browser unconditionally.
    pub async fn close(&self) {
        let mut guard = self.browser.lock().await;
        if let Some(mut browser) = guard.take() {
            if let Err(e) = browser.close().await {
                debug!("Browser close failed: {}", e);
            }
        }
        self.open_sessions.store(0, Ordering::SeqCst);
    }

    /// Spawn the periodic idle-reclamation task.
    pub fn spawn_reaper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut policy = IdlePolicy::new();
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                manager.close_if_idle(&mut policy).await;
            }
        })
    }
}

