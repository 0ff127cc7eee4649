//! In-memory ticket store for tests.
//!
//! Mirrors the redis key layout with a TTL-aware map and a `VecDeque` queue
//! so queue and handler logic can be exercised without a redis server.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::models::{Credentials, Target, TicketPayload, TokenBundle};

use super::{
    cache_key, shortcut_key, StoreResult, TicketStore, CACHE_TTL, PAYLOAD_TTL, RESULT_TTL,
};

#[derive(Default)]
struct Inner {
    entries: HashMap<String, (Instant, String)>,
    queue: VecDeque<String>,
    backoff_until: Option<Instant>,
}

impl Inner {
    fn set(&mut self, key: String, value: String, ttl: Duration) {
        self.entries.insert(key, (Instant::now() + ttl, value));
    }

    fn get(&mut self, key: &str) -> Option<String> {
        match self.entries.get(key) {
            Some((expires, value)) if *expires > Instant::now() => Some(value.clone()),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }
}

/// Test double for [`TicketStore`].
#[derive(Default)]
pub struct MemoryTicketStore {
    inner: Mutex<Inner>,
}

impl MemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop a payload record, simulating TTL expiry.
    pub async fn expire_payload(&self, id: &str) {
        let mut inner = self.inner.lock().await;
        inner.entries.remove(&format!("ticket:{}:payload", id));
    }
}

#[async_trait]
impl TicketStore for MemoryTicketStore {
    async fn put_payload(&self, id: &str, payload: &TicketPayload) -> StoreResult<()> {
        let json = serde_json::to_string(payload)?;
        let mut inner = self.inner.lock().await;
        inner.set(format!("ticket:{}:payload", id), json, PAYLOAD_TTL);
        Ok(())
    }

    async fn get_payload(&self, id: &str) -> StoreResult<Option<TicketPayload>> {
        let mut inner = self.inner.lock().await;
        match inner.get(&format!("ticket:{}:payload", id)) {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put_result(&self, id: &str, bundle: &TokenBundle) -> StoreResult<()> {
        let json = serde_json::to_string(bundle)?;
        let mut inner = self.inner.lock().await;
        inner.set(format!("ticket:{}:result", id), json, RESULT_TTL);
        Ok(())
    }

    async fn get_result(&self, id: &str) -> StoreResult<Option<TokenBundle>> {
        let mut inner = self.inner.lock().await;
        match inner.get(&format!("ticket:{}:result", id)) {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put_error(&self, id: &str, message: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        inner.set(
            format!("ticket:{}:error", id),
            message.to_string(),
            RESULT_TTL,
        );
        Ok(())
    }

    async fn get_error(&self, id: &str) -> StoreResult<Option<String>> {
        let mut inner = self.inner.lock().await;
        Ok(inner.get(&format!("ticket:{}:error", id)))
    }

    async fn enqueue(&self, id: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        inner.queue.push_back(id.to_string());
        Ok(())
    }

    async fn dequeue(&self) -> StoreResult<Option<String>> {
        let mut inner = self.inner.lock().await;
        Ok(inner.queue.pop_front())
    }

    async fn queue_len(&self) -> StoreResult<u64> {
        let inner = self.inner.lock().await;
        Ok(inner.queue.len() as u64)
    }

    async fn put_shortcut(&self, credentials: &Credentials, ticket_id: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        inner.set(
            shortcut_key(credentials),
            ticket_id.to_string(),
            PAYLOAD_TTL,
        );
        Ok(())
    }

    async fn get_shortcut(&self, credentials: &Credentials) -> StoreResult<Option<String>> {
        let mut inner = self.inner.lock().await;
        Ok(inner.get(&shortcut_key(credentials)))
    }

    async fn put_cached_bundle(
        &self,
        ruc: &str,
        targets: &[Target],
        bundle: &TokenBundle,
    ) -> StoreResult<()> {
        let json = serde_json::to_string(bundle)?;
        let mut inner = self.inner.lock().await;
        inner.set(cache_key(ruc, targets), json, CACHE_TTL);
        Ok(())
    }

    async fn get_cached_bundle(
        &self,
        ruc: &str,
        targets: &[Target],
    ) -> StoreResult<Option<TokenBundle>> {
        let mut inner = self.inner.lock().await;
        match inner.get(&cache_key(ruc, targets)) {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set_backoff(&self, ttl: Duration) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        inner.backoff_until = Some(Instant::now() + ttl);
        Ok(())
    }

    async fn in_backoff(&self) -> StoreResult<bool> {
        let inner = self.inner.lock().await;
        Ok(inner
            .backoff_until
            .map(|until| until > Instant::now())
            .unwrap_or(false))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Target;

    fn creds() -> Credentials {
        Credentials::new(
            "20123456789".to_string(),
            "USUARIO1".to_string(),
            "clave123".to_string(),
        )
    }

    #[tokio::test]
    async fn payload_round_trip() {
        let store = MemoryTicketStore::new();
        let payload = TicketPayload::new(creds(), vec![Target::Sire]);
        store.put_payload("t1", &payload).await.unwrap();
        assert_eq!(store.get_payload("t1").await.unwrap(), Some(payload));
        assert_eq!(store.get_payload("other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn queue_is_fifo_and_pops_once() {
        let store = MemoryTicketStore::new();
        store.enqueue("a").await.unwrap();
        store.enqueue("b").await.unwrap();
        assert_eq!(store.queue_len().await.unwrap(), 2);
        assert_eq!(store.dequeue().await.unwrap(), Some("a".to_string()));
        assert_eq!(store.dequeue().await.unwrap(), Some("b".to_string()));
        assert_eq!(store.dequeue().await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_payload_reads_as_missing() {
        let store = MemoryTicketStore::new();
        let payload = TicketPayload::new(creds(), vec![Target::Cpe]);
        store.put_payload("t1", &payload).await.unwrap();
        store.expire_payload("t1").await;
        assert_eq!(store.get_payload("t1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn backoff_flag_expires() {
        let store = MemoryTicketStore::new();
        assert!(!store.in_backoff().await.unwrap());
        store.set_backoff(Duration::from_secs(60)).await.unwrap();
        assert!(store.in_backoff().await.unwrap());
        store.set_backoff(Duration::from_secs(0)).await.unwrap();
        assert!(!store.in_backoff().await.unwrap());
    }
}
