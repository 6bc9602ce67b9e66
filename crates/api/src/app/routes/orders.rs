use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::debug;

use orderflow_infra::cache::CacheStore;
use orderflow_infra::service::OrderService;
use orderflow_infra::store::DurableStore;

use crate::app::errors;

pub async fn get_order<S, C>(
    Extension(service): Extension<Arc<OrderService<S, C>>>,
    Path(id): Path<String>,
) -> axum::response::Response
where
    S: DurableStore + 'static,
    C: CacheStore + 'static,
{
    let order_uid = id.trim();
    if order_uid.is_empty() {
        return missing_order_uid().await;
    }

    match service.get_order(order_uid).await {
        Ok(order) => {
            debug!(order_uid, "order served");
            (StatusCode::OK, Json(order)).into_response()
        }
        Err(err) => errors::order_error_to_response(order_uid, err),
    }
}

pub async fn missing_order_uid() -> axum::response::Response {
    errors::json_error(StatusCode::BAD_REQUEST, errors::EMPTY_ORDER_UID)
}
