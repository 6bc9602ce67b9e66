//! Redis-backed order cache.
//!
//! - **Key**: `order:{order_uid}`
//! - **Value**: the order's JSON wire form
//! - **Expiry**: `SET ... EX <ttl>`; Redis evicts silently
//!
//! Emptiness is checked with `SCAN MATCH order:*` rather than `DBSIZE` because the same
//! database may also hold the order stream.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::instrument;

use orderflow_core::Order;

use super::r#trait::{CacheError, CacheStore, cache_key};
use crate::health::{PingError, Pingable};

const SCAN_BATCH: usize = 100;

#[derive(Clone)]
pub struct RedisOrderCache {
    conn: ConnectionManager,
}

impl RedisOrderCache {
    /// Connect to Redis.
    ///
    /// `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client =
            redis::Client::open(redis_url).map_err(|e| CacheError::Connection(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        Ok(Self::new(conn))
    }

    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl CacheStore for RedisOrderCache {
    #[instrument(skip(self, order), fields(order_uid = %order.order_uid, ttl_secs = ttl.as_secs()), err)]
    async fn set(&self, order: &Order, ttl: Duration) -> Result<(), CacheError> {
        let payload = order
            .to_json()
            .map_err(|e| CacheError::Serialization(e.to_string()))?;

        // EX rejects 0; round sub-second TTLs up.
        let ttl_secs = ttl.as_secs().max(1);

        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(cache_key(&order.order_uid))
            .arg(payload)
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::Command(format!("SET failed: {e}")))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get(&self, order_uid: &str) -> Result<Option<Order>, CacheError> {
        let mut conn = self.conn.clone();
        let payload: Option<Vec<u8>> = redis::cmd("GET")
            .arg(cache_key(order_uid))
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::Command(format!("GET failed: {e}")))?;

        payload
            .map(|bytes| Order::from_json(&bytes))
            .transpose()
            .map_err(|e| CacheError::Serialization(e.to_string()))
    }

    async fn is_empty(&self) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;

        // SCAN may return empty batches before the cursor wraps; keep going until it does.
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(cache_key("*"))
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|e| CacheError::Command(format!("SCAN failed: {e}")))?;

            if !keys.is_empty() {
                return Ok(false);
            }
            if next == 0 {
                return Ok(true);
            }
            cursor = next;
        }
    }
}

#[async_trait]
impl Pingable for RedisOrderCache {
    async fn ping(&self) -> Result<(), PingError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| PingError::new("redis", e.to_string()))?;
        Ok(())
    }
}
