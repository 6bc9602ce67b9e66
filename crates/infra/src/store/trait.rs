use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use orderflow_core::Order;

/// Durable store operation error.
///
/// "No such order" is not an error: lookups return `Ok(None)`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error in {operation}: {message}")]
    Database {
        operation: &'static str,
        message: String,
    },

    /// A stored row could not be turned back into an order.
    #[error("stored order is malformed: {0}")]
    Corrupt(String),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Authoritative order persistence.
///
/// ## Write semantics
///
/// `upsert` stores the order header, delivery, payment and items in one atomic unit.
/// Each part is inserted only if absent (items are keyed by `(order_uid, rid)`), so calling
/// it again with the same order is a no-op and never fails because of the earlier write.
///
/// ## Read semantics
///
/// Orders come back with their items in insertion order and `created_at` filled in.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn upsert(&self, order: &Order) -> Result<(), StoreError>;

    async fn get_by_id(&self, order_uid: &str) -> Result<Option<Order>, StoreError>;

    /// Up to `limit` orders, most recently created first. Empty is not an error.
    async fn get_recent(&self, limit: usize) -> Result<Vec<Order>, StoreError>;
}

#[async_trait]
impl<S> DurableStore for Arc<S>
where
    S: DurableStore + ?Sized,
{
    async fn upsert(&self, order: &Order) -> Result<(), StoreError> {
        (**self).upsert(order).await
    }

    async fn get_by_id(&self, order_uid: &str) -> Result<Option<Order>, StoreError> {
        (**self).get_by_id(order_uid).await
    }

    async fn get_recent(&self, limit: usize) -> Result<Vec<Order>, StoreError> {
        (**self).get_recent(limit).await
    }
}
