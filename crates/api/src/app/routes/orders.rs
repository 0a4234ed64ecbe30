use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use comanda_auth::Permission;
use comanda_core::AggregateId;
use comanda_infra::checkout::{CheckoutLine, CheckoutRequest};
use comanda_infra::streams;
use comanda_menu::MenuItemId;
use comanda_orders::{Order, OrderCommand, OrderId, TableId, Transition};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_order).get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/status", post(transition_order))
}

/// POST /orders — the checkout entrypoint.
pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(restaurant): Extension<crate::context::RestaurantContext>,
    Extension(actor): Extension<crate::context::ActorContext>,
    Json(body): Json<dto::CheckoutRequestBody>,
) -> axum::response::Response {
    let cmd_auth = CmdAuth {
        inner: (),
        required: vec![Permission::new("orders.create")],
    };
    if let Err(e) = crate::authz::authorize_command(&restaurant, &actor, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let table_agg: AggregateId = match body.table_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid table id");
        }
    };

    let mut lines = Vec::with_capacity(body.lines.len());
    for line in body.lines {
        let item_agg: AggregateId = match line.item_id.parse() {
            Ok(v) => v,
            Err(_) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid item id");
            }
        };
        lines.push(CheckoutLine {
            item_id: MenuItemId::new(item_agg),
            quantity: line.quantity,
        });
    }

    let request = CheckoutRequest {
        table_id: TableId::new(table_agg),
        lines,
        notes: body.notes,
        idempotency_key: body.idempotency_key,
    };

    match services.place_order(restaurant.restaurant_id(), Some(actor.actor_id()), request) {
        Ok(order) => (StatusCode::CREATED, Json(dto::order_to_json(&order))).into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}

/// POST /orders/:id/status — move an order along the workflow graph.
pub async fn transition_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(restaurant): Extension<crate::context::RestaurantContext>,
    Extension(actor): Extension<crate::context::ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::TransitionRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id"),
    };
    let order_id = OrderId::new(agg);

    let cmd = OrderCommand::Transition(Transition {
        restaurant_id: restaurant.restaurant_id(),
        order_id,
        target: body.target,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("orders.transition")],
    };
    if let Err(e) = crate::authz::authorize_command(&restaurant, &actor, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    match services.dispatch::<Order>(
        restaurant.restaurant_id(),
        agg,
        streams::ORDER,
        cmd_auth.inner,
        |_r, aggregate_id| Order::empty(OrderId::new(aggregate_id)),
    ) {
        Ok(_) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "id": agg.to_string(),
                "status": body.target.as_str(),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(restaurant): Extension<crate::context::RestaurantContext>,
    Extension(actor): Extension<crate::context::ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let cmd_auth = CmdAuth {
        inner: (),
        required: vec![Permission::new("orders.read")],
    };
    if let Err(e) = crate::authz::authorize_command(&restaurant, &actor, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id"),
    };
    let order_id = OrderId::new(agg);

    match services.board_get(restaurant.restaurant_id(), &order_id) {
        Some(rm) => (StatusCode::OK, Json(dto::board_row_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found"),
    }
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(restaurant): Extension<crate::context::RestaurantContext>,
    Extension(actor): Extension<crate::context::ActorContext>,
) -> axum::response::Response {
    let cmd_auth = CmdAuth {
        inner: (),
        required: vec![Permission::new("orders.read")],
    };
    if let Err(e) = crate::authz::authorize_command(&restaurant, &actor, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let items = services
        .board_list(restaurant.restaurant_id())
        .into_iter()
        .map(dto::board_row_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}
