//! Asynchronous scraping queue and worker pool.
//!
//! A fixed set of worker tasks drains the FIFO ticket queue. Each worker
//! loops: pop one ticket id, load its payload, resolve tokens (with the
//! partial-fulfillment retry policy), write the terminal record, notify
//! subscribers, then sleep a fixed pacing delay before taking more work so
//! the portal is never hammered even under backlog. The worker count is the
//! concurrency bound; there is no other admission gate.
//!
//! Processing is at-most-once: an id popped from the queue is never
//! redelivered. A ticket whose payload expired before it was dequeued is
//! abandoned silently and reads as not-found once the payload TTL lapses.

mod dedup;

pub use dedup::find_existing;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::{Target, TicketPayload, TokenBundle};
use crate::resolver::{ResolveError, TokenResolver};
use crate::store::TicketStore;

/// Tuning for the worker pool.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Number of concurrent workers (the concurrency bound).
    pub workers: usize,
    /// Extra resolution attempts after the first returns an unsatisfied
    /// bundle.
    pub max_retries: u32,
    /// Pacing sleep after each completed ticket.
    pub pacing: Duration,
    /// Poll interval when the queue is empty.
    pub idle_poll: Duration,
    /// How long submissions are refused after the portal throttles a login.
    pub backoff_ttl: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            max_retries: 3,
            pacing: Duration::from_millis(800),
            idle_poll: Duration::from_secs(1),
            backoff_ttl: Duration::from_secs(5 * 60),
        }
    }
}

/// The worker pool draining the ticket queue.
pub struct ScrapeQueue {
    store: Arc<dyn TicketStore>,
    resolver: Arc<dyn TokenResolver>,
    notify: broadcast::Sender<String>,
    config: QueueConfig,
}

impl ScrapeQueue {
    pub fn new(
        store: Arc<dyn TicketStore>,
        resolver: Arc<dyn TokenResolver>,
        notify: broadcast::Sender<String>,
        config: QueueConfig,
    ) -> Self {
        Self {
            store,
            resolver,
            notify,
            config,
        }
    }

    /// Spawn the worker tasks. They run until `shutdown` flips to true;
    /// an in-flight ticket always runs to completion first.
    pub fn spawn_workers(
        self: &Arc<Self>,
        shutdown: watch::Receiver<bool>,
    ) -> Vec<JoinHandle<()>> {
        (0..self.config.workers)
            .map(|worker_id| {
                let queue = Arc::clone(self);
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    queue.run_worker(worker_id, shutdown).await;
                })
            })
            .collect()
    }

    async fn run_worker(&self, worker_id: usize, mut shutdown: watch::Receiver<bool>) {
        debug!(worker_id, "worker started");
        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.store.dequeue().await {
                Ok(Some(ticket_id)) => {
                    // Panics must not kill the worker; they become a ticket
                    // error record like any other failure.
                    let processed = AssertUnwindSafe(self.process_ticket(&ticket_id))
                        .catch_unwind()
                        .await;
                    if processed.is_err() {
                        warn!(worker_id, %ticket_id, "ticket processing panicked");
                        if let Err(e) = self
                            .store
                            .put_error(&ticket_id, "internal error while processing ticket")
                            .await
                        {
                            warn!(%ticket_id, "failed to record panic outcome: {}", e);
                        }
                        let _ = self.notify.send(ticket_id.clone());
                    }
                    self.pause(self.config.pacing, &mut shutdown).await;
                }
                Ok(None) => {
                    self.pause(self.config.idle_poll, &mut shutdown).await;
                }
                Err(e) => {
                    warn!(worker_id, "queue pop failed: {}", e);
                    self.pause(self.config.idle_poll, &mut shutdown).await;
                }
            }
        }
        debug!(worker_id, "worker stopped");
    }

    /// Sleep, waking early on shutdown.
    async fn pause(&self, duration: Duration, shutdown: &mut watch::Receiver<bool>) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = shutdown.changed() => {}
        }
    }

    /// Process one ticket end to end. All failures end up in the store as a
    /// ticket-level error record; nothing propagates.
    async fn process_ticket(&self, ticket_id: &str) {
        let payload = match self.store.get_payload(ticket_id).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                // Expired before a worker got to it; it will read as
                // not-found once the payload TTL truly lapses.
                debug!(ticket_id, "payload missing or expired, abandoning");
                return;
            }
            Err(e) => {
                warn!(ticket_id, "payload load failed: {}", e);
                return;
            }
        };

        info!(ticket_id, targets = ?payload.targets, "processing ticket");

        match self.resolve_with_retries(&payload).await {
            Ok(bundle) => {
                if let Err(e) = self.store.put_result(ticket_id, &bundle).await {
                    warn!(ticket_id, "failed to write result: {}", e);
                    return;
                }
                if let Err(e) = self
                    .store
                    .put_shortcut(&payload.credentials, ticket_id)
                    .await
                {
                    warn!(ticket_id, "failed to write lookup shortcut: {}", e);
                }
                if let Err(e) = self
                    .store
                    .put_cached_bundle(&payload.credentials.ruc, &payload.targets, &bundle)
                    .await
                {
                    warn!(ticket_id, "failed to cache bundle: {}", e);
                }
                info!(ticket_id, "ticket fulfilled");
            }
            Err(message) => {
                if let Err(e) = self.store.put_error(ticket_id, &message).await {
                    warn!(ticket_id, "failed to write error record: {}", e);
                    return;
                }
                info!(ticket_id, "ticket failed: {}", message);
            }
        }

        let _ = self.notify.send(ticket_id.to_string());
    }

    /// Resolve with the partial-fulfillment retry policy: one attempt plus
    /// up to `max_retries` cache-bypassing retries, merging newly resolved
    /// targets each time. Callers never get an incomplete bundle as success.
    async fn resolve_with_retries(&self, payload: &TicketPayload) -> Result<TokenBundle, String> {
        let credentials = &payload.credentials;
        let targets = &payload.targets;

        let mut bundle = match self
            .store
            .get_cached_bundle(&credentials.ruc, targets)
            .await
        {
            Ok(Some(cached)) => cached,
            Ok(None) => TokenBundle::default(),
            Err(e) => {
                warn!("cache lookup failed: {}", e);
                TokenBundle::default()
            }
        };
        if bundle.satisfies(targets) {
            info!(ruc = %credentials.ruc, "served from result cache");
            return Ok(bundle);
        }

        let attempts = 1 + self.config.max_retries;
        let mut last_error: Option<String> = None;

        for attempt in 1..=attempts {
            let missing = bundle.missing(targets);
            match self.resolver.resolve(credentials, &missing).await {
                Ok(partial) => bundle.merge_missing_from(&partial),
                Err(ResolveError::Throttled) => {
                    warn!(attempt, "portal throttling detected, raising backoff flag");
                    if let Err(e) = self.store.set_backoff(self.config.backoff_ttl).await {
                        warn!("failed to set backoff flag: {}", e);
                    }
                    last_error = Some(ResolveError::Throttled.to_string());
                }
                Err(e) => {
                    warn!(attempt, "resolution attempt failed: {}", e);
                    last_error = Some(e.to_string());
                }
            }
            if bundle.satisfies(targets) {
                return Ok(bundle);
            }
        }

        let missing: Vec<&str> = bundle
            .missing(targets)
            .iter()
            .map(Target::as_str)
            .collect();
        let detail = last_error
            .map(|e| format!(" (last error: {})", e))
            .unwrap_or_default();
        Err(format!(
            "targets [{}] unresolved after {} attempts{}",
            missing.join(", "),
            attempts,
            detail
        ))
    }
}
