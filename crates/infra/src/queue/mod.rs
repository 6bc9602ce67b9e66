//! Broker-backed queue implementations.
//!
//! The queue contracts live in `orderflow-events`; this module provides the Redis Streams
//! implementation used in production.

#[cfg(feature = "redis")]
pub mod redis_streams;

#[cfg(feature = "redis")]
pub use redis_streams::RedisStreamsQueue;
