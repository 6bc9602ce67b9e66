use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use orderflow_core::Order;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

const KEY_PREFIX: &str = "order:";

/// Cache key for an order identifier.
pub fn cache_key(order_uid: &str) -> String {
    format!("{KEY_PREFIX}{order_uid}")
}

/// Cache operation error.
///
/// A miss is never an error; `get` reports it as `Ok(None)`.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    Connection(String),

    #[error("cache command error: {0}")]
    Command(String),

    #[error("cache serialization error: {0}")]
    Serialization(String),

    #[error("cache lock poisoned")]
    Poisoned,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Store the order under its identifier, replacing any previous copy.
    async fn set(&self, order: &Order, ttl: Duration) -> Result<(), CacheError>;

    async fn get(&self, order_uid: &str) -> Result<Option<Order>, CacheError>;

    /// True when no order is cached.
    async fn is_empty(&self) -> Result<bool, CacheError>;
}

#[async_trait]
impl<C> CacheStore for Arc<C>
where
    C: CacheStore + ?Sized,
{
    async fn set(&self, order: &Order, ttl: Duration) -> Result<(), CacheError> {
        (**self).set(order, ttl).await
    }

    async fn get(&self, order_uid: &str) -> Result<Option<Order>, CacheError> {
        (**self).get(order_uid).await
    }

    async fn is_empty(&self) -> Result<bool, CacheError> {
        (**self).is_empty().await
    }
}
