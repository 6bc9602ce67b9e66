use axum::{Router, routing::get};

use orderflow_infra::cache::CacheStore;
use orderflow_infra::store::DurableStore;

pub mod orders;
pub mod system;

/// Router for the `/api` endpoints.
pub fn router<S, C>() -> Router
where
    S: DurableStore + 'static,
    C: CacheStore + 'static,
{
    Router::new()
        .route("/order/:id", get(orders::get_order::<S, C>))
        .route("/order/", get(orders::missing_order_uid))
        .route("/order", get(orders::missing_order_uid))
}
