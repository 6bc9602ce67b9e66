//! Ingestion consumer loop.
//!
//! Reads one message at a time, decodes and validates it, hands valid orders to the
//! [`OrderService`], and acknowledges the message only after the durable write succeeded.
//!
//! ## Failure handling
//!
//! | Failure | Committed | Counted |
//! |---------|-----------|---------|
//! | read | n/a | yes |
//! | decode | no | no |
//! | validation | no | no |
//! | durable write | no | no |
//! | commit | no (logged) | no |
//!
//! Consecutive read failures are counted; once the count exceeds the limit the consumer
//! cancels the shared shutdown token and stops. Only a committed message resets the count.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use orderflow_core::{Order, ensure_valid};
use orderflow_events::{MessageConsumer, QueueMessage};

use crate::cache::CacheStore;
use crate::service::OrderService;
use crate::store::DurableStore;

pub const MAX_CONSECUTIVE_READ_ERRORS: u32 = 3;

pub const DEFAULT_READ_RETRY_DELAY: Duration = Duration::from_secs(1);

/// How the consumer loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerExit {
    Cancelled,
    /// Too many consecutive read failures; shutdown was signalled.
    CircuitOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handled {
    Committed,
    Skipped,
}

pub struct OrderConsumer<Q, S, C> {
    queue: Q,
    service: Arc<OrderService<S, C>>,
    cancel: CancellationToken,
    max_read_errors: u32,
    read_retry_delay: Duration,
}

impl<Q, S, C> OrderConsumer<Q, S, C>
where
    Q: MessageConsumer,
    S: DurableStore,
    C: CacheStore,
{
    pub fn new(queue: Q, service: Arc<OrderService<S, C>>, cancel: CancellationToken) -> Self {
        Self {
            queue,
            service,
            cancel,
            max_read_errors: MAX_CONSECUTIVE_READ_ERRORS,
            read_retry_delay: DEFAULT_READ_RETRY_DELAY,
        }
    }

    /// Pause between a failed read and the next attempt.
    pub fn with_read_retry_delay(mut self, delay: Duration) -> Self {
        self.read_retry_delay = delay;
        self
    }

    pub async fn run(self) -> ConsumerExit {
        info!("order consumer started");
        let mut read_errors: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                info!("order consumer stopped");
                return ConsumerExit::Cancelled;
            }

            let read = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    info!("order consumer stopped");
                    return ConsumerExit::Cancelled;
                }
                read = self.queue.read_message() => read,
            };

            match read {
                Ok(message) => {
                    if self.handle(message).await == Handled::Committed {
                        read_errors = 0;
                    }
                }
                Err(err) => {
                    read_errors += 1;
                    warn!(error = %err, consecutive_errors = read_errors, "failed to read message");

                    if read_errors > self.max_read_errors {
                        error!(
                            consecutive_errors = read_errors,
                            "consumer reached the read error limit, shutting down"
                        );
                        self.cancel.cancel();
                        return ConsumerExit::CircuitOpen;
                    }

                    if !self.read_retry_delay.is_zero() {
                        tokio::select! {
                            () = self.cancel.cancelled() => {}
                            () = tokio::time::sleep(self.read_retry_delay) => {}
                        }
                    }
                }
            }
        }
    }

    async fn handle(&self, message: QueueMessage) -> Handled {
        let order = match Order::from_json(&message.payload) {
            Ok(order) => order,
            Err(err) => {
                warn!(
                    message_id = %message.id,
                    key = %message.key,
                    error = %err,
                    "failed to decode order"
                );
                return Handled::Skipped;
            }
        };

        if let Err(err) = ensure_valid(&order) {
            warn!(
                message_id = %message.id,
                order_uid = %order.order_uid,
                problems = %err,
                "order rejected by validation"
            );
            return Handled::Skipped;
        }

        if let Err(err) = self.service.process(&order).await {
            error!(
                message_id = %message.id,
                order_uid = %order.order_uid,
                error = %err,
                "failed to persist order"
            );
            return Handled::Skipped;
        }

        match self.queue.commit(std::slice::from_ref(&message)).await {
            Ok(()) => {
                debug!(message_id = %message.id, "message committed");
                info!(order_uid = %order.order_uid, "order processed");
                Handled::Committed
            }
            Err(err) => {
                warn!(
                    message_id = %message.id,
                    order_uid = %order.order_uid,
                    error = %err,
                    "failed to commit message"
                );
                Handled::Skipped
            }
        }
    }
}
