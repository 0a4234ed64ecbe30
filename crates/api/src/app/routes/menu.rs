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
use comanda_menu::{
    MenuItem, MenuItemCommand, MenuItemId, RegisterItem, RepriceItem, RetireItem,
};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/items", post(register_item).get(list_items))
        .route("/items/:id", get(get_item))
        .route("/items/:id/reprice", post(reprice_item))
        .route("/items/:id/retire", post(retire_item))
}

pub async fn register_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(restaurant): Extension<crate::context::RestaurantContext>,
    Extension(actor): Extension<crate::context::ActorContext>,
    Json(body): Json<dto::RegisterItemRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();
    let item_id = MenuItemId::new(agg);

    let cmd = MenuItemCommand::RegisterItem(RegisterItem {
        restaurant_id: restaurant.restaurant_id(),
        item_id,
        name: body.name,
        unit_price_minor: body.unit_price_minor,
        tax_rate: body.tax_rate,
        currency: body.currency,
        stock_mode: body.stock_mode,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("menu.manage")],
    };
    if let Err(e) = crate::authz::authorize_command(&restaurant, &actor, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch::<MenuItem>(
        restaurant.restaurant_id(),
        agg,
        streams::MENU_ITEM,
        cmd_auth.inner,
        |_r, aggregate_id| MenuItem::empty(MenuItemId::new(aggregate_id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
    )
        .into_response()
}

pub async fn reprice_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(restaurant): Extension<crate::context::RestaurantContext>,
    Extension(actor): Extension<crate::context::ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RepriceItemRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid item id"),
    };
    let item_id = MenuItemId::new(agg);

    let cmd = MenuItemCommand::RepriceItem(RepriceItem {
        restaurant_id: restaurant.restaurant_id(),
        item_id,
        unit_price_minor: body.unit_price_minor,
        tax_rate: body.tax_rate,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("menu.manage")],
    };
    if let Err(e) = crate::authz::authorize_command(&restaurant, &actor, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    match services.dispatch::<MenuItem>(
        restaurant.restaurant_id(),
        agg,
        streams::MENU_ITEM,
        cmd_auth.inner,
        |_r, aggregate_id| MenuItem::empty(MenuItemId::new(aggregate_id)),
    ) {
        Ok(_) => (StatusCode::OK, Json(serde_json::json!({"id": agg.to_string()}))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn retire_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(restaurant): Extension<crate::context::RestaurantContext>,
    Extension(actor): Extension<crate::context::ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid item id"),
    };
    let item_id = MenuItemId::new(agg);

    let cmd = MenuItemCommand::RetireItem(RetireItem {
        restaurant_id: restaurant.restaurant_id(),
        item_id,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("menu.manage")],
    };
    if let Err(e) = crate::authz::authorize_command(&restaurant, &actor, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    match services.dispatch::<MenuItem>(
        restaurant.restaurant_id(),
        agg,
        streams::MENU_ITEM,
        cmd_auth.inner,
        |_r, aggregate_id| MenuItem::empty(MenuItemId::new(aggregate_id)),
    ) {
        Ok(_) => (StatusCode::OK, Json(serde_json::json!({"id": agg.to_string()}))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(restaurant): Extension<crate::context::RestaurantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid item id"),
    };
    let item_id = MenuItemId::new(agg);

    match services.menu_get(restaurant.restaurant_id(), &item_id) {
        Some(rm) => (StatusCode::OK, Json(dto::menu_item_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "menu item not found"),
    }
}

pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(restaurant): Extension<crate::context::RestaurantContext>,
) -> axum::response::Response {
    let items = services
        .menu_list(restaurant.restaurant_id())
        .into_iter()
        .map(dto::menu_item_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}
