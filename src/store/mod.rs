//! Ticket and token persistence.
//!
//! All durable state lives behind the [`TicketStore`] trait: ticket payload,
//! result and error records (each with its own TTL), the FIFO scrape queue,
//! the per-credential lookup shortcut, the short-lived token cache, and the
//! portal backoff flag. The redis backend is the production implementation;
//! the in-memory backend exists for tests.

#[cfg(test)]
mod memory;
mod redis;

use std::time::Duration;

use async_trait::async_trait;

#[cfg(test)]
pub use memory::MemoryTicketStore;
pub use redis::RedisTicketStore;

use crate::models::{Credentials, Target, TicketPayload, TokenBundle};

/// TTL for `ticket:<id>:payload` records.
pub const PAYLOAD_TTL: Duration = Duration::from_secs(40 * 60);
/// TTL for `ticket:<id>:result` and `ticket:<id>:error` records.
pub const RESULT_TTL: Duration = Duration::from_secs(30 * 60);
/// TTL for cached token bundles, just under the portal's session lifetime.
pub const CACHE_TTL: Duration = Duration::from_secs(59 * 60);

/// Errors from the backing store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Cache key for a resolved bundle. Targets are sorted so that requests
/// naming the same set in a different order share an entry.
pub fn cache_key(ruc: &str, targets: &[Target]) -> String {
    let mut names: Vec<&str> = targets.iter().map(Target::as_str).collect();
    names.sort_unstable();
    names.dedup();
    format!("tokens:{}:{}", ruc, names.join("+"))
}

/// Lookup-shortcut key for a credential triple.
pub fn shortcut_key(credentials: &Credentials) -> String {
    format!(
        "lookup:{}:{}:{}",
        credentials.ruc, credentials.sol_username, credentials.sol_key
    )
}

/// Backing store for tickets, the scrape queue, and the token caches.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Persist a ticket payload under [`PAYLOAD_TTL`].
    async fn put_payload(&self, id: &str, payload: &TicketPayload) -> StoreResult<()>;
    /// Load a ticket payload. `None` once the TTL has lapsed.
    async fn get_payload(&self, id: &str) -> StoreResult<Option<TicketPayload>>;

    /// Write the terminal result record under [`RESULT_TTL`].
    async fn put_result(&self, id: &str, bundle: &TokenBundle) -> StoreResult<()>;
    async fn get_result(&self, id: &str) -> StoreResult<Option<TokenBundle>>;

    /// Write the terminal error record under [`RESULT_TTL`].
    async fn put_error(&self, id: &str, message: &str) -> StoreResult<()>;
    async fn get_error(&self, id: &str) -> StoreResult<Option<String>>;

    /// Push a ticket id onto the tail of the FIFO queue.
    async fn enqueue(&self, id: &str) -> StoreResult<()>;
    /// Pop the id at the head of the queue. Each id comes out at most once.
    async fn dequeue(&self) -> StoreResult<Option<String>>;
    async fn queue_len(&self) -> StoreResult<u64>;

    /// Remember the most recent ticket that fully satisfied its targets for
    /// this credential triple. TTL mirrors the payload TTL.
    async fn put_shortcut(&self, credentials: &Credentials, ticket_id: &str) -> StoreResult<()>;
    async fn get_shortcut(&self, credentials: &Credentials) -> StoreResult<Option<String>>;

    /// Cache a resolved bundle under [`CACHE_TTL`].
    async fn put_cached_bundle(
        &self,
        ruc: &str,
        targets: &[Target],
        bundle: &TokenBundle,
    ) -> StoreResult<()>;
    async fn get_cached_bundle(
        &self,
        ruc: &str,
        targets: &[Target],
    ) -> StoreResult<Option<TokenBundle>>;

    /// Raise the portal backoff flag for `ttl`; submissions 429 while set.
    async fn set_backoff(&self, ttl: Duration) -> StoreResult<()>;
    async fn in_backoff(&self) -> StoreResult<bool>;

    /// Connectivity probe for health reporting.
    async fn ping(&self) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_order_independent() {
        let a = cache_key("20123456789", &[Target::Sire, Target::Cpe]);
        let b = cache_key("20123456789", &[Target::Cpe, Target::Sire]);
        assert_eq!(a, b);
    }

    #[test]
    fn cache_key_separates_rucs_and_target_sets() {
        let base = cache_key("20123456789", &[Target::Sire]);
        assert_ne!(base, cache_key("20987654321", &[Target::Sire]));
        assert_ne!(base, cache_key("20123456789", &[Target::Sire, Target::Cpe]));
    }

    #[test]
    fn cache_key_dedups_repeated_targets() {
        assert_eq!(
            cache_key("20123456789", &[Target::Cpe, Target::Cpe]),
            cache_key("20123456789", &[Target::Cpe])
        );
    }
}
