//! Demo load generator.
//!
//! Publishes a fixed list of orders (a mix of valid and deliberately broken ones) so the
//! ingestion pipeline has something to chew on in a local setup.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use orderflow_core::Order;
use orderflow_events::MessageProducer;

pub const MAX_WRITE_ERRORS: u32 = 3;

const DEMO_ORDERS_JSON: &str = include_str!("../../fixtures/demo_orders.json");

/// The bundled demo orders: four valid, six broken in different ways.
pub fn demo_orders() -> Result<Vec<Order>, serde_json::Error> {
    serde_json::from_str(DEMO_ORDERS_JSON)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerReport {
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
    /// The write error limit was exceeded and shutdown was signalled.
    pub tripped: bool,
}

pub struct OrderProducer<P> {
    producer: P,
    cancel: CancellationToken,
    pause: Duration,
}

impl<P> OrderProducer<P>
where
    P: MessageProducer,
{
    pub fn new(producer: P, cancel: CancellationToken) -> Self {
        Self {
            producer,
            cancel,
            pause: Duration::ZERO,
        }
    }

    /// Wait this long between two messages.
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Publish every order once, keyed by its identifier.
    pub async fn run(self, orders: &[Order]) -> ProducerReport {
        let mut report = ProducerReport::default();
        let mut write_errors: u32 = 0;

        for order in orders {
            if self.cancel.is_cancelled() {
                info!("producer cancelled");
                return report;
            }

            let payload = match order.to_json() {
                Ok(payload) => payload,
                Err(err) => {
                    report.skipped += 1;
                    error!(order_uid = %order.order_uid, error = %err, "failed to encode order");
                    continue;
                }
            };

            match self.producer.write_message(&order.order_uid, &payload).await {
                Ok(()) => {
                    report.sent += 1;
                    info!(order_uid = %order.order_uid, "order produced");
                }
                Err(err) => {
                    report.failed += 1;
                    write_errors += 1;
                    warn!(order_uid = %order.order_uid, error = %err, "failed to write message");

                    if write_errors > MAX_WRITE_ERRORS {
                        error!("producer reached the write error limit, shutting down");
                        self.cancel.cancel();
                        report.tripped = true;
                        return report;
                    }
                }
            }

            if !self.pause.is_zero() {
                tokio::select! {
                    () = self.cancel.cancelled() => {}
                    () = tokio::time::sleep(self.pause) => {}
                }
            }
        }

        info!(sent = report.sent, failed = report.failed, "producer finished");
        report
    }
}
