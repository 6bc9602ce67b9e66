//! HTTP API application wiring (Axum router).
//!
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use orderflow_infra::cache::CacheStore;
use orderflow_infra::service::OrderService;
use orderflow_infra::store::DurableStore;

pub mod errors;
pub mod routes;

/// Build the full HTTP router over an order service.
pub fn build_app<S, C>(service: Arc<OrderService<S, C>>) -> Router
where
    S: DurableStore + 'static,
    C: CacheStore + 'static,
{
    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api", routes::router::<S, C>())
        .layer(ServiceBuilder::new().layer(Extension(service)))
}
