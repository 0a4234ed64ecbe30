//! Table registry mirror.
//!
//! Table/location management proper is an external collaborator; this is the
//! minimal surface needed to seed and inspect the directory that checkout
//! resolves against.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};

use comanda_auth::Permission;
use comanda_core::AggregateId;
use comanda_infra::directory::TableBinding;
use comanda_orders::{LocationId, TableId};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/", post(register_table).get(list_tables))
}

pub async fn register_table(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(restaurant): Extension<crate::context::RestaurantContext>,
    Extension(actor): Extension<crate::context::ActorContext>,
    Json(body): Json<dto::RegisterTableRequest>,
) -> axum::response::Response {
    let cmd_auth = CmdAuth {
        inner: (),
        required: vec![Permission::new("tables.manage")],
    };
    if let Err(e) = crate::authz::authorize_command(&restaurant, &actor, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let table_id = match parse_or_new(body.table_id.as_deref()) {
        Ok(id) => TableId::new(id),
        Err(resp) => return resp,
    };
    let location_id = match parse_or_new(body.location_id.as_deref()) {
        Ok(id) => LocationId::new(id),
        Err(resp) => return resp,
    };

    let binding = TableBinding {
        table_id,
        location_id,
        restaurant_id: restaurant.restaurant_id(),
        label: body.label,
        active: body.active,
    };
    services.register_table(binding.clone());

    (StatusCode::CREATED, Json(dto::table_to_json(binding))).into_response()
}

pub async fn list_tables(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(restaurant): Extension<crate::context::RestaurantContext>,
    Extension(actor): Extension<crate::context::ActorContext>,
) -> axum::response::Response {
    let cmd_auth = CmdAuth {
        inner: (),
        required: vec![Permission::new("tables.manage")],
    };
    if let Err(e) = crate::authz::authorize_command(&restaurant, &actor, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let items = services
        .list_tables(restaurant.restaurant_id())
        .into_iter()
        .map(dto::table_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

fn parse_or_new(id: Option<&str>) -> Result<AggregateId, axum::response::Response> {
    match id {
        None => Ok(AggregateId::new()),
        Some(s) => s
            .parse()
            .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid id")),
    }
}
