//! Message queue contracts for the order ingestion pipeline.
//!
//! The consumer side reads one message at a time and acknowledges explicitly, which gives
//! at-least-once delivery: anything not committed is handed out again by the broker.

pub mod in_memory_queue;
pub mod queue;

pub use in_memory_queue::InMemoryQueue;
pub use queue::{MessageConsumer, MessageProducer, QueueError, QueueMessage};
