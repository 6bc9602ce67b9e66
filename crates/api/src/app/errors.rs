use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;

use orderflow_infra::service::OrderServiceError;

pub const EMPTY_ORDER_UID: &str = "empty orderUID";
pub const ORDER_NOT_FOUND: &str = "no order found";
pub const ORDER_LOOKUP_FAILED: &str = "couldn't get order";

pub fn order_error_to_response(
    order_uid: &str,
    err: OrderServiceError,
) -> axum::response::Response {
    match err {
        OrderServiceError::NotFound(_) => json_error(StatusCode::NOT_FOUND, ORDER_NOT_FOUND),
        err => {
            error!(order_uid, error = %err, "order lookup failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, ORDER_LOOKUP_FAILED)
        }
    }
}

pub fn json_error(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (status, axum::Json(json!({ "Error": message.into() }))).into_response()
}
