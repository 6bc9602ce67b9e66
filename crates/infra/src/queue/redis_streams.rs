//! Redis Streams-backed order queue (durable, at-least-once delivery).
//!
//! This implementation uses a Redis Streams consumer group to provide:
//! - **Durable delivery**: entries persist until acknowledged with XACK
//! - **Crash recovery**: on start the consumer re-reads its own pending entries first
//! - **Keyed entries**: each entry carries `key` (the order identifier) and `payload`
//!
//! ## Architecture
//!
//! - **Stream Key**: `orders` by default
//! - **Consumer Group**: one per service (`orderflow`)
//! - **Consumer**: named per process (`orderflow-1`)
//!
//! Reads block on the server (`XREADGROUP ... BLOCK`), so the reader and the writer use
//! separate connections: a blocked multiplexed connection would stall every other command.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{StreamId, StreamReadReply};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use orderflow_events::{MessageConsumer, MessageProducer, QueueError, QueueMessage};

use crate::config::QueueConfig;

const KEY_FIELD: &str = "key";
const PAYLOAD_FIELD: &str = "payload";

/// Where the next read comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ReadCursor {
    /// Replaying this consumer's pending entries with ids greater than the given one.
    Backlog(String),
    /// Reading entries never delivered to the group (`>`).
    New,
}

pub struct RedisStreamsQueue {
    reader: ConnectionManager,
    writer: ConnectionManager,
    config: QueueConfig,
    cursor: Mutex<ReadCursor>,
}

impl RedisStreamsQueue {
    /// Connect and make sure the consumer group exists.
    pub async fn connect(config: QueueConfig) -> Result<Self, QueueError> {
        let client = redis::Client::open(config.redis_url.as_str())
            .map_err(|e| QueueError::Connection(e.to_string()))?;
        let reader = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;
        let writer = ConnectionManager::new(client)
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;

        let queue = Self {
            reader,
            writer,
            config,
            cursor: Mutex::new(ReadCursor::Backlog("0".to_string())),
        };
        queue.ensure_consumer_group().await?;
        Ok(queue)
    }

    /// Create the consumer group (and the stream) if missing.
    ///
    /// The group starts at id `0` so entries published before the first start are consumed.
    pub async fn ensure_consumer_group(&self) -> Result<(), QueueError> {
        let mut conn = self.writer.clone();
        let created: redis::RedisResult<String> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_key)
            .arg(&self.config.group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match created {
            Ok(_) => {
                info!(
                    stream = %self.config.stream_key,
                    group = %self.config.group,
                    "consumer group created"
                );
                Ok(())
            }
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(QueueError::Command(format!("XGROUP CREATE failed: {e}"))),
        }
    }

    async fn read_group(
        &self,
        start_id: &str,
        block_ms: Option<u64>,
    ) -> Result<Option<StreamId>, QueueError> {
        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP")
            .arg(&self.config.group)
            .arg(&self.config.consumer)
            .arg("COUNT")
            .arg(1);
        if let Some(block_ms) = block_ms {
            cmd.arg("BLOCK").arg(block_ms);
        }
        cmd.arg("STREAMS").arg(&self.config.stream_key).arg(start_id);

        let mut conn = self.reader.clone();
        // A BLOCK timeout comes back as nil.
        let reply: Option<StreamReadReply> = cmd
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::Command(format!("XREADGROUP failed: {e}")))?;

        Ok(reply.and_then(|reply| {
            reply
                .keys
                .into_iter()
                .flat_map(|key| key.ids)
                .next()
        }))
    }
}

#[async_trait]
impl MessageConsumer for RedisStreamsQueue {
    /// Next entry for this consumer: pending backlog first, then new entries.
    ///
    /// An entry read from the server is already in the pending list, so dropping this
    /// future late does not lose it; it is replayed on the next start.
    async fn read_message(&self) -> Result<QueueMessage, QueueError> {
        let mut cursor = self.cursor.lock().await;
        loop {
            match &*cursor {
                ReadCursor::Backlog(after) => match self.read_group(after, None).await? {
                    Some(entry) => {
                        *cursor = ReadCursor::Backlog(entry.id.clone());
                        debug!(message_id = %entry.id, "replaying pending entry");
                        return Ok(to_message(entry));
                    }
                    None => {
                        debug!("pending backlog drained");
                        *cursor = ReadCursor::New;
                    }
                },
                ReadCursor::New => {
                    if let Some(entry) = self.read_group(">", Some(self.config.block_ms)).await? {
                        return Ok(to_message(entry));
                    }
                }
            }
        }
    }

    #[instrument(skip(self, messages), fields(count = messages.len()), err)]
    async fn commit(&self, messages: &[QueueMessage]) -> Result<(), QueueError> {
        if messages.is_empty() {
            return Ok(());
        }
        let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();

        let mut conn = self.writer.clone();
        let _: u64 = redis::cmd("XACK")
            .arg(&self.config.stream_key)
            .arg(&self.config.group)
            .arg(&ids[..])
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::Command(format!("XACK failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl MessageProducer for RedisStreamsQueue {
    #[instrument(skip(self, payload), fields(stream = %self.config.stream_key), err)]
    async fn write_message(&self, key: &str, payload: &[u8]) -> Result<(), QueueError> {
        let mut conn = self.writer.clone();
        let _: String = redis::cmd("XADD")
            .arg(&self.config.stream_key)
            .arg("*")
            .arg(KEY_FIELD)
            .arg(key)
            .arg(PAYLOAD_FIELD)
            .arg(payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::Command(format!("XADD failed: {e}")))?;
        Ok(())
    }
}

/// Missing fields decode as empty; the consumer rejects an empty payload at decode time.
fn to_message(entry: StreamId) -> QueueMessage {
    let key: Option<String> = entry.get(KEY_FIELD);
    let payload: Option<Vec<u8>> = entry.get(PAYLOAD_FIELD);
    QueueMessage::new(entry.id, key.unwrap_or_default(), payload.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn entry(id: &str, fields: &[(&str, &str)]) -> StreamId {
        StreamId {
            id: id.to_string(),
            map: fields
                .iter()
                .map(|(k, v)| (k.to_string(), redis::Value::Data(v.as_bytes().to_vec())))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn entry_fields_become_message() {
        let message = to_message(entry("1-0", &[("key", "A1"), ("payload", "{}")]));
        assert_eq!(message, QueueMessage::new("1-0", "A1", b"{}".to_vec()));
    }

    #[test]
    fn missing_fields_become_empty() {
        let message = to_message(entry("2-0", &[]));
        assert_eq!(message.id, "2-0");
        assert!(message.key.is_empty());
        assert!(message.payload.is_empty());
    }
}
