//! Queue abstraction (mechanics only).
//!
//! ## Delivery model
//!
//! - **At-least-once**: a message stays pending until [`MessageConsumer::commit`] is called
//!   for it; brokers may redeliver anything uncommitted.
//! - **Keyed**: producers attach a key (the order identifier) so brokers that partition can
//!   keep one order's messages together.
//! - **Opaque payload**: the queue never looks inside `payload`.
//!
//! Consumers must be idempotent. The durable store's insert-if-absent semantics make a
//! redelivered order a no-op.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// A message handed out by a [`MessageConsumer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Broker-assigned identifier, used for acknowledgement.
    pub id: String,
    pub key: String,
    pub payload: Vec<u8>,
}

impl QueueMessage {
    pub fn new(id: impl Into<String>, key: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
            payload: payload.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue connection error: {0}")]
    Connection(String),

    #[error("queue command error: {0}")]
    Command(String),

    #[error("queue closed")]
    Closed,
}

/// Pull side of the queue.
#[async_trait]
pub trait MessageConsumer: Send + Sync {
    /// Wait until a message is available and return it.
    ///
    /// Dropping the future before it resolves must not acknowledge anything.
    async fn read_message(&self) -> Result<QueueMessage, QueueError>;

    /// Acknowledge messages so the broker will not hand them out again.
    async fn commit(&self, messages: &[QueueMessage]) -> Result<(), QueueError>;
}

/// Push side of the queue.
#[async_trait]
pub trait MessageProducer: Send + Sync {
    async fn write_message(&self, key: &str, payload: &[u8]) -> Result<(), QueueError>;
}

#[async_trait]
impl<C> MessageConsumer for Arc<C>
where
    C: MessageConsumer + ?Sized,
{
    async fn read_message(&self) -> Result<QueueMessage, QueueError> {
        (**self).read_message().await
    }

    async fn commit(&self, messages: &[QueueMessage]) -> Result<(), QueueError> {
        (**self).commit(messages).await
    }
}

#[async_trait]
impl<P> MessageProducer for Arc<P>
where
    P: MessageProducer + ?Sized,
{
    async fn write_message(&self, key: &str, payload: &[u8]) -> Result<(), QueueError> {
        (**self).write_message(key, payload).await
    }
}
