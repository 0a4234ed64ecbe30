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
use comanda_infra::streams;
use comanda_inventory::{RecordAdjustment, StockLedger, StockLedgerCommand, StockLedgerId};
use comanda_menu::MenuItemId;

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route(
        "/:item_id",
        get(current_stock).post(record_adjustment),
    )
}

/// GET /stock/:item_id
///
/// Authoritative read: the balance is re-derived from the ledger stream, not
/// taken from the read model. Returns `quantity: null` for INFINITE items.
pub async fn current_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(restaurant): Extension<crate::context::RestaurantContext>,
    Path(item_id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match item_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid item id"),
    };

    match services.current_stock(restaurant.restaurant_id(), MenuItemId::new(agg)) {
        Ok(quantity) => (
            StatusCode::OK,
            Json(dto::stock_level_to_json(&agg.to_string(), quantity)),
        )
            .into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}

/// POST /stock/:item_id — record a manual IN / OUT / SPOILAGE adjustment.
pub async fn record_adjustment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(restaurant): Extension<crate::context::RestaurantContext>,
    Extension(actor): Extension<crate::context::ActorContext>,
    Path(item_id): Path<String>,
    Json(body): Json<dto::AdjustStockRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match item_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid item id"),
    };
    let item_id = MenuItemId::new(agg);
    let ledger_id = StockLedgerId::for_item(item_id);

    let cmd = StockLedgerCommand::RecordAdjustment(RecordAdjustment {
        restaurant_id: restaurant.restaurant_id(),
        item_id,
        kind: body.kind,
        quantity: body.quantity,
        reason: body.reason,
        actor: Some(actor.actor_id()),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("stock.adjust")],
    };
    if let Err(e) = crate::authz::authorize_command(&restaurant, &actor, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    match services.dispatch::<StockLedger>(
        restaurant.restaurant_id(),
        ledger_id.0,
        streams::STOCK_LEDGER,
        cmd_auth.inner,
        |_r, aggregate_id| StockLedger::empty(StockLedgerId::new(aggregate_id)),
    ) {
        Ok(committed) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "item_id": agg.to_string(),
                "events_committed": committed.len(),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
