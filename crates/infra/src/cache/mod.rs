//! Order cache boundary.
//!
//! The cache holds a denormalized JSON copy of recently written or read orders. It is never
//! authoritative: entries expire after a TTL and are re-fetched from the durable store.

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis_cache;
pub mod r#trait;

pub use in_memory::InMemoryOrderCache;
#[cfg(feature = "redis")]
pub use redis_cache::RedisOrderCache;
pub use r#trait::{CacheError, CacheStore, DEFAULT_CACHE_TTL, cache_key};

#[cfg(test)]
pub use r#trait::MockCacheStore;
