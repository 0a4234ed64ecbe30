use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use comanda_infra::checkout::CheckoutError;
use comanda_infra::command_dispatcher::DispatchError;

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        DispatchError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DispatchError::OutOfStock {
            item_id,
            requested,
            available,
        } => out_of_stock_response(&item_id.to_string(), requested, available),
        DispatchError::IllegalTransition { from, to } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            axum::Json(json!({
                "error": "illegal_transition",
                "message": format!("cannot move order from {from} to {to}"),
                "from": from,
                "to": to,
            })),
        )
            .into_response(),
        DispatchError::Unauthorized => {
            json_error(StatusCode::FORBIDDEN, "unauthorized", "unauthorized")
        }
        DispatchError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DispatchError::Deserialize(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", msg)
        }
        // Storage internals stay out of responses.
        DispatchError::Store(e) => {
            tracing::error!("event store failure: {e}");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                "storage failure",
            )
        }
        DispatchError::Publish(msg) => json_error(StatusCode::BAD_GATEWAY, "publish_error", msg),
        DispatchError::ScopeIsolation(msg) => {
            json_error(StatusCode::FORBIDDEN, "scope_isolation", msg)
        }
    }
}

pub fn checkout_error_to_response(err: CheckoutError) -> axum::response::Response {
    match err {
        // Surfaced verbatim for user correction.
        CheckoutError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        CheckoutError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        CheckoutError::OutOfStock {
            item_id,
            requested,
            available,
        } => out_of_stock_response(&item_id.to_string(), requested, available),
        // Surfaced generically.
        CheckoutError::Unauthorized => {
            json_error(StatusCode::FORBIDDEN, "unauthorized", "unauthorized")
        }
        CheckoutError::TransactionFailed(msg) => {
            tracing::error!("checkout transaction failed: {msg}");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "transaction_failed",
                "order could not be committed",
            )
        }
    }
}

fn out_of_stock_response(item_id: &str, requested: u32, available: i64) -> axum::response::Response {
    (
        StatusCode::CONFLICT,
        axum::Json(json!({
            "error": "out_of_stock",
            "message": format!("item {item_id} has {available} in stock, requested {requested}"),
            "item_id": item_id,
            "requested": requested,
            "available": available,
        })),
    )
        .into_response()
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
