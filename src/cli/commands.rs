//! CLI commands implementation.

#[cfg(feature = "browser")]
use std::sync::Arc;
#[cfg(feature = "browser")]
use std::time::Duration;

#[cfg(feature = "browser")]
use anyhow::Context;

#[cfg(feature = "browser")]
use crate::browser::SessionManager;
#[cfg(feature = "browser")]
use crate::config::{browser_config_from_env, load_settings};
#[cfg(feature = "browser")]
use crate::models::{Credentials, Target};
#[cfg(feature = "browser")]
use crate::queue::{QueueConfig, ScrapeQueue};
#[cfg(feature = "browser")]
use crate::resolver::{PortalResolver, TokenResolver};
#[cfg(feature = "browser")]
use crate::server::{self, AppState};
#[cfg(feature = "browser")]
use crate::store::{RedisTicketStore, TicketStore};

/// Interval between idle checks on the shared browser.
#[cfg(feature = "browser")]
const REAPER_INTERVAL: Duration = Duration::from_secs(30);

/// Run the API server, the worker pool, and the browser reaper until ctrl-c.
#[cfg(feature = "browser")]
pub async fn serve(port: Option<u16>, workers: Option<usize>) -> anyhow::Result<()> {
    let mut settings = load_settings()?;
    if let Some(port) = port {
        settings.port = port;
    }
    if let Some(workers) = workers {
        settings.max_workers = workers;
    }

    let store: Arc<dyn TicketStore> = Arc::new(
        RedisTicketStore::new(&settings.redis_url)
            .await
            .context("failed to connect to redis")?,
    );

    let sessions = Arc::new(SessionManager::new(settings.browser.clone()));
    let reaper = sessions.spawn_reaper(REAPER_INTERVAL);
    let resolver: Arc<dyn TokenResolver> = Arc::new(PortalResolver::new(
        sessions.clone(),
        settings.browser.action_timeout,
    ));

    let state = AppState::new(store.clone(), settings.api_key.clone());

    let queue_config = QueueConfig {
        workers: settings.max_workers,
        ..QueueConfig::default()
    };
    let queue = Arc::new(ScrapeQueue::new(
        store,
        resolver,
        state.notify.clone(),
        queue_config,
    ));
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let worker_handles = queue.spawn_workers(shutdown_rx);

    tracing::info!(workers = settings.max_workers, "scrape workers started");
    server::serve(state, settings.port).await?;

    // Server drained after ctrl-c; let in-flight tickets finish.
    let _ = shutdown_tx.send(true);
    for handle in worker_handles {
        let _ = handle.await;
    }
    reaper.abort();
    sessions.close().await;
    Ok(())
}

/// Resolve once against the portal and report which targets produced a
/// token. Useful when selectors rot and the flow needs a manual check.
#[cfg(feature = "browser")]
pub async fn resolve(
    ruc: String,
    username: String,
    key: String,
    targets: Vec<String>,
) -> anyhow::Result<()> {
    let credentials = Credentials::new(ruc, username, key);
    credentials
        .validate()
        .map_err(|message| anyhow::anyhow!(message))?;

    let targets = if targets.is_empty() {
        Target::ALL.to_vec()
    } else {
        targets
            .iter()
            .map(|name| name.parse::<Target>().map_err(|e| anyhow::anyhow!(e)))
            .collect::<anyhow::Result<Vec<_>>>()?
    };

    let config = browser_config_from_env()?;
    let action_timeout = config.action_timeout;
    let sessions = Arc::new(SessionManager::new(config));
    let resolver = PortalResolver::new(sessions.clone(), action_timeout);

    let outcome = resolver.resolve(&credentials, &targets).await;
    sessions.close().await;

    let bundle = outcome?;
    for target in &targets {
        let status = if bundle.get(*target).is_some() {
            "resolved"
        } else {
            "missing"
        };
        println!("{:<20} {}", target.to_string(), status);
    }
    Ok(())
}

#[cfg(not(feature = "browser"))]
pub async fn serve(_port: Option<u16>, _workers: Option<usize>) -> anyhow::Result<()> {
    Err(anyhow::anyhow!(
        "Browser support not compiled. Rebuild with: cargo build --features browser"
    ))
}

#[cfg(not(feature = "browser"))]
pub async fn resolve(
    _ruc: String,
    _username: String,
    _key: String,
    _targets: Vec<String>,
) -> anyhow::Result<()> {
    Err(anyhow::anyhow!(
        "Browser support not compiled. Rebuild with: cargo build --features browser"
    ))
}
