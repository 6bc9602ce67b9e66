//! Background tasks run by the service binary.

pub mod cache_warmer;
pub mod order_consumer;
pub mod order_producer;

pub use cache_warmer::{WarmUpOutcome, warm_up_cache};
pub use order_consumer::{ConsumerExit, OrderConsumer};
pub use order_producer::{OrderProducer, ProducerReport, demo_orders};
