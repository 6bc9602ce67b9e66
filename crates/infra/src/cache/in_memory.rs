use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use orderflow_core::Order;

use super::r#trait::{CacheError, CacheStore, cache_key};
use crate::health::{PingError, Pingable};

#[derive(Debug, Clone)]
struct Entry {
    order: Order,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-memory order cache for tests/dev.
///
/// Expired entries are invisible to readers and are purged lazily on the next write.
#[derive(Debug, Default)]
pub struct InMemoryOrderCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryOrderCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for InMemoryOrderCache {
    async fn set(&self, order: &Order, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        entries.retain(|_, entry| entry.is_live(now));
        entries.insert(
            cache_key(&order.order_uid),
            Entry {
                order: order.clone(),
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, order_uid: &str) -> Result<Option<Order>, CacheError> {
        let entries = self.entries.read().map_err(|_| CacheError::Poisoned)?;
        Ok(entries
            .get(&cache_key(order_uid))
            .filter(|entry| entry.is_live(Instant::now()))
            .map(|entry| entry.order.clone()))
    }

    async fn is_empty(&self) -> Result<bool, CacheError> {
        let now = Instant::now();
        let entries = self.entries.read().map_err(|_| CacheError::Poisoned)?;
        Ok(!entries.values().any(|entry| entry.is_live(now)))
    }
}

#[async_trait]
impl Pingable for InMemoryOrderCache {
    async fn ping(&self) -> Result<(), PingError> {
        self.entries
            .read()
            .map(|_| ())
            .map_err(|_| PingError::new("cache", "lock poisoned"))
    }
}
