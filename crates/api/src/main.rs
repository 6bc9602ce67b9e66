use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use orderflow_infra::cache::RedisOrderCache;
use orderflow_infra::config::AppConfig;
use orderflow_infra::health::{LivenessExit, LivenessMonitor};
use orderflow_infra::queue::RedisStreamsQueue;
use orderflow_infra::service::OrderService;
use orderflow_infra::store::PostgresOrderStore;
use orderflow_infra::workers::{
    ConsumerExit, OrderConsumer, OrderProducer, demo_orders, warm_up_cache,
};

const DB_MAX_CONNECTIONS: u32 = 10;
const DB_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
const PRODUCER_PAUSE: Duration = Duration::from_secs(1);

/// A background task and whether its exit should fail the process.
struct Worker {
    name: &'static str,
    handle: JoinHandle<bool>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    orderflow_observability::init();

    let config = AppConfig::from_env().context("failed to load configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(DB_MAX_CONNECTIONS)
        .acquire_timeout(DB_ACQUIRE_TIMEOUT)
        .connect_with(config.database.connect_options()?)
        .await
        .context("failed to connect to postgres")?;
    let store = Arc::new(PostgresOrderStore::new(pool));

    let cache = Arc::new(
        RedisOrderCache::connect(&config.redis_url)
            .await
            .context("failed to connect to the cache")?,
    );

    let queue = Arc::new(
        RedisStreamsQueue::connect(config.queue.clone())
            .await
            .context("failed to connect to the queue")?,
    );

    let service = Arc::new(
        OrderService::new(store.clone(), cache.clone()).with_cache_ttl(config.cache_ttl),
    );
    let cancel = CancellationToken::new();
    let mut workers = Vec::new();

    {
        let service = service.clone();
        let cancel = cancel.clone();
        let (limit, deadline) = (config.warmup_limit, config.warmup_timeout);
        workers.push(Worker {
            name: "cache_warmer",
            handle: tokio::spawn(async move {
                warm_up_cache(&service, limit, deadline, &cancel).await;
                false
            }),
        });
    }

    workers.push(Worker {
        name: "order_consumer",
        handle: tokio::spawn({
            let consumer = OrderConsumer::new(queue.clone(), service.clone(), cancel.clone());
            async move { consumer.run().await == ConsumerExit::CircuitOpen }
        }),
    });

    workers.push(Worker {
        name: "liveness_monitor",
        handle: tokio::spawn({
            let monitor = LivenessMonitor::new(config.healthcheck_interval, cancel.clone())
                .watch("postgres", store.clone())
                .watch("redis", cache.clone());
            async move { monitor.run().await == LivenessExit::Unhealthy }
        }),
    });

    if config.producer_enabled {
        let orders = demo_orders().context("failed to load demo orders")?;
        let producer = OrderProducer::new(queue.clone(), cancel.clone()).with_pause(PRODUCER_PAUSE);
        workers.push(Worker {
            name: "order_producer",
            handle: tokio::spawn(async move { producer.run(&orders).await.tripped }),
        });
    }

    let app = orderflow_api::app::build_app(service);
    let listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.http_addr))?;
    tracing::info!(addr = %config.http_addr, "listening");

    let shutdown = cancel.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                () = await_shutdown_signal() => {}
                () = shutdown.cancelled() => {}
            }
        })
        .await;

    cancel.cancel();
    tracing::info!("shutting down background tasks");

    let mut failed = false;
    for worker in workers {
        match tokio::time::timeout(config.shutdown_timeout, worker.handle).await {
            Ok(Ok(fatal)) => {
                if fatal {
                    tracing::error!(task = worker.name, "task stopped on a fatal error");
                }
                failed |= fatal;
            }
            Ok(Err(err)) => {
                tracing::error!(task = worker.name, error = %err, "task panicked");
                failed = true;
            }
            Err(_) => {
                tracing::warn!(
                    task = worker.name,
                    timeout_secs = config.shutdown_timeout.as_secs(),
                    "task did not stop in time"
                );
            }
        }
    }

    served.context("http server failed")?;
    if failed {
        anyhow::bail!("shut down after a fatal background task failure");
    }
    tracing::info!("shutdown complete");
    Ok(())
}

/// Waits for SIGINT (ctrl-c) or SIGTERM.
#[allow(clippy::expect_used)]
async fn await_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received ctrl-c"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
