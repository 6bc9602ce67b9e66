//! Infrastructure layer: durable store, cache, queue adapters, config and background workers.

pub mod cache;
pub mod config;
pub mod health;
pub mod queue;
pub mod service;
pub mod store;
pub mod workers;

#[cfg(test)]
mod test_support;
