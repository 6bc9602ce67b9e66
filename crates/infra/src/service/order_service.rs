//! Order write/read orchestration over a durable store and a cache.
//!
//! The durable store is required and authoritative; the cache is best-effort. On the write
//! path a cache failure is logged and swallowed. On the read path a cache failure is
//! surfaced, never mistaken for a miss.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use orderflow_core::Order;

use crate::cache::{CacheError, CacheStore, DEFAULT_CACHE_TTL};
use crate::store::{DurableStore, StoreError};

#[derive(Debug, Error)]
pub enum OrderServiceError {
    #[error("order not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Outcome of a cache warm-up pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmUpReport {
    /// The cache already held data; nothing was loaded.
    pub skipped: bool,
    pub cached: usize,
    pub failed: usize,
}

pub struct OrderService<S, C> {
    store: S,
    cache: C,
    cache_ttl: Duration,
}

impl<S, C> OrderService<S, C>
where
    S: DurableStore,
    C: CacheStore,
{
    pub fn new(store: S, cache: C) -> Self {
        Self {
            store,
            cache,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Persist a validated order, then mirror it into the cache.
    ///
    /// A store failure is returned and the cache is left untouched.
    #[instrument(skip(self, order), fields(order_uid = %order.order_uid))]
    pub async fn process(&self, order: &Order) -> Result<(), OrderServiceError> {
        self.store.upsert(order).await?;

        if let Err(err) = self.cache.set(order, self.cache_ttl).await {
            warn!(error = %err, "failed to cache order after durable write");
        }
        Ok(())
    }

    /// Cache first, then the durable store.
    ///
    /// A durable hit after a cache miss is written back to the cache best-effort.
    #[instrument(skip(self))]
    pub async fn get_order(&self, order_uid: &str) -> Result<Order, OrderServiceError> {
        if let Some(order) = self.cache.get(order_uid).await? {
            debug!("cache hit");
            return Ok(order);
        }

        let order = self
            .store
            .get_by_id(order_uid)
            .await?
            .ok_or_else(|| OrderServiceError::NotFound(order_uid.to_string()))?;

        if let Err(err) = self.cache.set(&order, self.cache_ttl).await {
            warn!(error = %err, "failed to repopulate cache after miss");
        }
        Ok(order)
    }

    /// Load the `limit` most recent orders into an empty cache.
    ///
    /// A non-empty cache makes this a no-op. Per-order cache failures are counted and the
    /// remaining orders are still attempted.
    #[instrument(skip(self))]
    pub async fn warm_up(&self, limit: usize) -> Result<WarmUpReport, OrderServiceError> {
        if !self.cache.is_empty().await? {
            info!("cache already populated, skipping warm-up");
            return Ok(WarmUpReport {
                skipped: true,
                ..WarmUpReport::default()
            });
        }

        let orders = self.store.get_recent(limit).await?;
        if orders.is_empty() {
            info!("durable store is empty, nothing to warm up");
            return Ok(WarmUpReport::default());
        }

        let mut report = WarmUpReport::default();
        for order in &orders {
            match self.cache.set(order, self.cache_ttl).await {
                Ok(()) => report.cached += 1,
                Err(err) => {
                    report.failed += 1;
                    warn!(order_uid = %order.order_uid, error = %err, "failed to warm order");
                }
            }
        }

        info!(cached = report.cached, failed = report.failed, "cache warm-up finished");
        Ok(report)
    }
}
