//! Dependency liveness checks.
//!
//! The monitor pings every registered dependency on a fixed interval. A single failed ping
//! is treated as fatal: the monitor cancels the process-wide shutdown token and stops.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub const DEFAULT_HEALTHCHECK_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
#[error("{component} ping failed: {message}")]
pub struct PingError {
    pub component: &'static str,
    pub message: String,
}

impl PingError {
    pub fn new(component: &'static str, message: impl Into<String>) -> Self {
        Self {
            component,
            message: message.into(),
        }
    }
}

/// A dependency that can answer "are you reachable right now?".
#[async_trait]
pub trait Pingable: Send + Sync {
    async fn ping(&self) -> Result<(), PingError>;
}

#[async_trait]
impl<P> Pingable for Arc<P>
where
    P: Pingable + ?Sized,
{
    async fn ping(&self) -> Result<(), PingError> {
        (**self).ping().await
    }
}

/// How the monitor loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessExit {
    Cancelled,
    Unhealthy,
}

pub struct LivenessMonitor {
    targets: Vec<(&'static str, Arc<dyn Pingable>)>,
    interval: Duration,
    cancel: CancellationToken,
}

impl LivenessMonitor {
    pub fn new(interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            targets: Vec::new(),
            interval,
            cancel,
        }
    }

    /// Add a dependency. Targets are pinged in registration order.
    pub fn watch(mut self, name: &'static str, target: Arc<dyn Pingable>) -> Self {
        self.targets.push((name, target));
        self
    }

    /// Ping every target once, stopping at the first failure.
    pub async fn check_once(&self) -> Result<(), PingError> {
        for (name, target) in &self.targets {
            target.ping().await?;
            debug!(dependency = *name, "ping ok");
        }
        Ok(())
    }

    /// Run until cancelled or until a ping fails.
    ///
    /// The first check happens one full interval after start.
    pub async fn run(self) -> LivenessExit {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = self.interval.as_secs(),
            targets = self.targets.len(),
            "liveness monitor started"
        );

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    debug!("liveness monitor cancelled");
                    return LivenessExit::Cancelled;
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.check_once().await {
                        error!(
                            component = err.component,
                            error = %err,
                            "dependency is unreachable, shutting down"
                        );
                        self.cancel.cancel();
                        return LivenessExit::Unhealthy;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeDependency {
        down: AtomicBool,
        pings: AtomicUsize,
    }

    #[async_trait]
    impl Pingable for FakeDependency {
        async fn ping(&self) -> Result<(), PingError> {
            self.pings.fetch_add(1, Ordering::SeqCst);
            if self.down.load(Ordering::SeqCst) {
                Err(PingError::new("fake", "connection refused"))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn check_once_short_circuits_on_first_failure() {
        let store = Arc::new(FakeDependency::default());
        let cache = Arc::new(FakeDependency::default());
        store.down.store(true, Ordering::SeqCst);

        let monitor = LivenessMonitor::new(Duration::from_secs(1), CancellationToken::new())
            .watch("store", store.clone())
            .watch("cache", cache.clone());

        assert!(monitor.check_once().await.is_err());
        assert_eq!(store.pings.load(Ordering::SeqCst), 1);
        assert_eq!(cache.pings.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn first_check_waits_one_interval() {
        let dep = Arc::new(FakeDependency::default());
        let cancel = CancellationToken::new();
        let monitor = LivenessMonitor::new(Duration::from_secs(10), cancel.clone())
            .watch("store", dep.clone());
        let handle = tokio::spawn(monitor.run());

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(dep.pings.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(dep.pings.load(Ordering::SeqCst), 1);

        cancel.cancel();
        assert_eq!(handle.await.unwrap(), LivenessExit::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_cancels_shutdown_token() {
        let dep = Arc::new(FakeDependency::default());
        let cancel = CancellationToken::new();
        let monitor = LivenessMonitor::new(Duration::from_secs(10), cancel.clone())
            .watch("cache", dep.clone());
        let handle = tokio::spawn(monitor.run());

        tokio::time::sleep(Duration::from_secs(15)).await;
        dep.down.store(true, Ordering::SeqCst);

        assert_eq!(handle.await.unwrap(), LivenessExit::Unhealthy);
        assert!(cancel.is_cancelled());
        assert_eq!(dep.pings.load(Ordering::SeqCst), 2);
    }
}
