use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cache::CacheStore;
use crate::service::{OrderService, OrderServiceError, WarmUpReport};
use crate::store::DurableStore;

pub const DEFAULT_WARMUP_LIMIT: usize = 5;
pub const DEFAULT_WARMUP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub enum WarmUpOutcome {
    Completed(WarmUpReport),
    Failed(OrderServiceError),
    TimedOut,
    Cancelled,
}

/// One-shot startup warm-up, bounded by `deadline` and aborted on shutdown.
///
/// Never fatal: every outcome is logged and returned for the caller to inspect.
pub async fn warm_up_cache<S, C>(
    service: &OrderService<S, C>,
    limit: usize,
    deadline: Duration,
    cancel: &CancellationToken,
) -> WarmUpOutcome
where
    S: DurableStore,
    C: CacheStore,
{
    let outcome = tokio::select! {
        biased;
        () = cancel.cancelled() => WarmUpOutcome::Cancelled,
        result = tokio::time::timeout(deadline, service.warm_up(limit)) => match result {
            Ok(Ok(report)) => WarmUpOutcome::Completed(report),
            Ok(Err(err)) => WarmUpOutcome::Failed(err),
            Err(_) => WarmUpOutcome::TimedOut,
        },
    };

    match &outcome {
        WarmUpOutcome::Completed(report) => info!(
            skipped = report.skipped,
            cached = report.cached,
            failed = report.failed,
            "cache warm-up done"
        ),
        WarmUpOutcome::Failed(err) => error!(error = %err, "cache warm-up failed"),
        WarmUpOutcome::TimedOut => {
            warn!(timeout_secs = deadline.as_secs(), "cache warm-up timed out")
        }
        WarmUpOutcome::Cancelled => info!("cache warm-up cancelled"),
    }
    outcome
}
