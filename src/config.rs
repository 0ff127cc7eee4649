//! Environment-driven configuration.
//!
//! Everything comes from the environment (optionally via a `.env` file).
//! The API key and redis URL are required; the process refuses to start
//! without them. Browser knobs all have workable defaults.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

use crate::browser::BrowserLaunchConfig;

/// Default API port.
pub const DEFAULT_PORT: u16 = 8726;
/// Default number of concurrent scrape workers.
pub const DEFAULT_MAX_WORKERS: usize = 3;

/// Runtime settings for the service.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Static API key clients must present.
    pub api_key: String,
    /// Redis connection URL backing tickets, queue, and caches.
    pub redis_url: String,
    pub port: u16,
    pub max_workers: usize,
    pub browser: BrowserLaunchConfig,
}

/// Load settings from the environment, failing fast on missing requirements.
pub fn load_settings() -> anyhow::Result<Settings> {
    let api_key =
        std::env::var("SOLACQUIRE_API_KEY").context("SOLACQUIRE_API_KEY must be set")?;
    let redis_url = std::env::var("REDIS_URL").context("REDIS_URL must be set")?;

    Ok(Settings {
        api_key,
        redis_url,
        port: parse_env("SOLACQUIRE_PORT", DEFAULT_PORT)?,
        max_workers: parse_env("SOLACQUIRE_MAX_WORKERS", DEFAULT_MAX_WORKERS)?,
        browser: browser_config_from_env()?,
    })
}

/// Browser launch configuration from the environment. Usable on its own for
/// one-shot resolution, which needs no API key or redis.
pub fn browser_config_from_env() -> anyhow::Result<BrowserLaunchConfig> {
    let defaults = BrowserLaunchConfig::default();
    Ok(BrowserLaunchConfig {
        executable: std::env::var("CHROME_PATH").ok().map(Into::into),
        remote_url: std::env::var("BROWSER_REMOTE_URL").ok(),
        headless: !flag_env("BROWSER_HEADFUL"),
        launch_timeout: Duration::from_secs(parse_env(
            "BROWSER_LAUNCH_TIMEOUT_SECS",
            defaults.launch_timeout.as_secs(),
        )?),
        action_timeout: Duration::from_secs(parse_env(
            "BROWSER_ACTION_TIMEOUT_SECS",
            defaults.action_timeout.as_secs(),
        )?),
        chrome_args: Vec::new(),
    })
}

fn parse_env<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {}: {}", name, e)),
        Err(_) => Ok(default),
    }
}

fn flag_env(name: &str) -> bool {
    matches!(
        std::env::var(name).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}
