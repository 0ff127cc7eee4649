//! Redis-backed ticket store.
//!
//! Uses a `ConnectionManager`, which transparently reconnects with backoff
//! when the server drops the connection; operations issued during an outage
//! fail and surface as [`StoreError::Redis`].

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::models::{Credentials, Target, TicketPayload, TokenBundle};

use super::{
    cache_key, shortcut_key, StoreError, StoreResult, TicketStore, CACHE_TTL, PAYLOAD_TTL,
    RESULT_TTL,
};

/// FIFO list of pending ticket ids.
const QUEUE_KEY: &str = "ticket:queue";
/// Flag raised while the portal is throttling logins.
const BACKOFF_KEY: &str = "portal:backoff";

/// Redis implementation of [`TicketStore`].
pub struct RedisTicketStore {
    conn: ConnectionManager,
}

impl RedisTicketStore {
    /// Connect to redis and build the connection manager.
    pub async fn new(redis_url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    fn payload_key(id: &str) -> String {
        format!("ticket:{}:payload", id)
    }

    fn result_key(id: &str) -> String {
        format!("ticket:{}:result", id)
    }

    fn error_key(id: &str) -> String {
        format!("ticket:{}:error", id)
    }

    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs()).await?;
        Ok(())
    }

    async fn get_string(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }
}

#[async_trait]
impl TicketStore for RedisTicketStore {
    async fn put_payload(&self, id: &str, payload: &TicketPayload) -> StoreResult<()> {
        let json = serde_json::to_string(payload)?;
        self.set_with_ttl(&Self::payload_key(id), json, PAYLOAD_TTL)
            .await
    }

    async fn get_payload(&self, id: &str) -> StoreResult<Option<TicketPayload>> {
        match self.get_string(&Self::payload_key(id)).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put_result(&self, id: &str, bundle: &TokenBundle) -> StoreResult<()> {
        let json = serde_json::to_string(bundle)?;
        self.set_with_ttl(&Self::result_key(id), json, RESULT_TTL)
            .await
    }

    async fn get_result(&self, id: &str) -> StoreResult<Option<TokenBundle>> {
        match self.get_string(&Self::result_key(id)).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put_error(&self, id: &str, message: &str) -> StoreResult<()> {
        self.set_with_ttl(&Self::error_key(id), message.to_string(), RESULT_TTL)
            .await
    }

    async fn get_error(&self, id: &str) -> StoreResult<Option<String>> {
        self.get_string(&Self::error_key(id)).await
    }

    async fn enqueue(&self, id: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(QUEUE_KEY, id).await?;
        Ok(())
    }

    async fn dequeue(&self) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        // LPUSH + RPOP keeps the list FIFO; RPOP is atomic, so an id is
        // handed to exactly one worker.
        Ok(conn.rpop(QUEUE_KEY, None).await?)
    }

    async fn queue_len(&self) -> StoreResult<u64> {
        let mut conn = self.conn.clone();
        Ok(conn.llen(QUEUE_KEY).await?)
    }

    async fn put_shortcut(&self, credentials: &Credentials, ticket_id: &str) -> StoreResult<()> {
        self.set_with_ttl(&shortcut_key(credentials), ticket_id.to_string(), PAYLOAD_TTL)
            .await
    }

    async fn get_shortcut(&self, credentials: &Credentials) -> StoreResult<Option<String>> {
        self.get_string(&shortcut_key(credentials)).await
    }

    async fn put_cached_bundle(
        &self,
        ruc: &str,
        targets: &[Target],
        bundle: &TokenBundle,
    ) -> StoreResult<()> {
        let json = serde_json::to_string(bundle)?;
        self.set_with_ttl(&cache_key(ruc, targets), json, CACHE_TTL)
            .await
    }

    async fn get_cached_bundle(
        &self,
        ruc: &str,
        targets: &[Target],
    ) -> StoreResult<Option<TokenBundle>> {
        match self.get_string(&cache_key(ruc, targets)).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set_backoff(&self, ttl: Duration) -> StoreResult<()> {
        self.set_with_ttl(BACKOFF_KEY, "1".to_string(), ttl).await
    }

    async fn in_backoff(&self) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        Ok(conn.exists(BACKOFF_KEY).await?)
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<()>(&mut conn)
            .await
            .map_err(StoreError::Redis)
    }
}

impl Clone for RedisTicketStore {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}
