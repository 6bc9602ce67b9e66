//! In-memory queue for tests/dev.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::queue::{MessageConsumer, MessageProducer, QueueError, QueueMessage};

#[derive(Debug, Default)]
struct State {
    ready: VecDeque<QueueMessage>,
    committed: Vec<String>,
    next_id: u64,
    closed: bool,
}

/// Single-partition FIFO queue.
///
/// - No IO
/// - `commit` only records ids; uncommitted messages are not redelivered
/// - `close` wakes blocked readers, which then get [`QueueError::Closed`] once drained
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    state: Mutex<State>,
    notify: Notify,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids acknowledged so far, in commit order.
    pub fn committed_ids(&self) -> Result<Vec<String>, QueueError> {
        Ok(self.lock()?.committed.clone())
    }

    /// Number of messages waiting to be read.
    pub fn len(&self) -> Result<usize, QueueError> {
        Ok(self.lock()?.ready.len())
    }

    pub fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len()? == 0)
    }

    pub fn close(&self) -> Result<(), QueueError> {
        self.lock()?.closed = true;
        self.notify.notify_waiters();
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, State>, QueueError> {
        self.state
            .lock()
            .map_err(|_| QueueError::Connection("lock poisoned".to_string()))
    }
}

#[async_trait]
impl MessageConsumer for InMemoryQueue {
    async fn read_message(&self) -> Result<QueueMessage, QueueError> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking state so a concurrent write cannot slip between.
            notified.as_mut().enable();

            {
                let mut state = self.lock()?;
                if let Some(message) = state.ready.pop_front() {
                    return Ok(message);
                }
                if state.closed {
                    return Err(QueueError::Closed);
                }
            }

            notified.await;
        }
    }

    async fn commit(&self, messages: &[QueueMessage]) -> Result<(), QueueError> {
        let mut state = self.lock()?;
        state
            .committed
            .extend(messages.iter().map(|m| m.id.clone()));
        Ok(())
    }
}

#[async_trait]
impl MessageProducer for InMemoryQueue {
    async fn write_message(&self, key: &str, payload: &[u8]) -> Result<(), QueueError> {
        {
            let mut state = self.lock()?;
            if state.closed {
                return Err(QueueError::Closed);
            }
            state.next_id += 1;
            let id = format!("{}-0", state.next_id);
            state.ready.push_back(QueueMessage::new(id, key, payload));
        }
        self.notify.notify_waiters();
        Ok(())
    }
}
