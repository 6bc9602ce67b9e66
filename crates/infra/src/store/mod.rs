//! Durable order store boundary.
//!
//! The durable store is the source of truth for orders. Writes are insert-if-absent per
//! sub-record, which makes redelivered messages harmless.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;
pub use r#trait::{DurableStore, StoreError};

#[cfg(test)]
pub use r#trait::MockDurableStore;
