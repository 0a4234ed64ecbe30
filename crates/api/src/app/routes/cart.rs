//! Cart snapshot persistence.
//!
//! The cart itself is client-held working state; these routes only implement
//! the serialize/restore contract keyed by a session/table token. Totals are
//! recomputed server-side so consoles can display them without trusting the
//! client's arithmetic.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use comanda_auth::Permission;
use comanda_cart::{Cart, SessionToken};

use crate::app::errors;
use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/:token", get(load_cart).put(save_cart).delete(clear_cart))
}

fn cart_to_json(cart: &Cart) -> serde_json::Value {
    let totals = cart.totals();
    serde_json::json!({
        "lines": cart.lines(),
        "subtotal_minor": totals.subtotal_minor,
        "tax_minor": totals.tax_minor,
        "total_minor": totals.total_minor,
    })
}

fn authorize_cart_access(
    restaurant: &crate::context::RestaurantContext,
    actor: &crate::context::ActorContext,
) -> Result<(), axum::response::Response> {
    let cmd_auth = CmdAuth {
        inner: (),
        required: vec![Permission::new("cart.manage")],
    };
    crate::authz::authorize_command(restaurant, actor, &cmd_auth)
        .map_err(|e| errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()))
}

pub async fn load_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(restaurant): Extension<crate::context::RestaurantContext>,
    Extension(actor): Extension<crate::context::ActorContext>,
    Path(token): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authorize_cart_access(&restaurant, &actor) {
        return resp;
    }

    // An unknown token is an empty cart, not an error: carts are working
    // state that may never have been saved.
    let cart = services
        .cart_load(&SessionToken::new(token))
        .unwrap_or_default();
    (StatusCode::OK, Json(cart_to_json(&cart))).into_response()
}

pub async fn save_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(restaurant): Extension<crate::context::RestaurantContext>,
    Extension(actor): Extension<crate::context::ActorContext>,
    Path(token): Path<String>,
    Json(cart): Json<Cart>,
) -> axum::response::Response {
    if let Err(resp) = authorize_cart_access(&restaurant, &actor) {
        return resp;
    }

    services.cart_save(SessionToken::new(token), cart.clone());
    (StatusCode::OK, Json(cart_to_json(&cart))).into_response()
}

pub async fn clear_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(restaurant): Extension<crate::context::RestaurantContext>,
    Extension(actor): Extension<crate::context::ActorContext>,
    Path(token): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authorize_cart_access(&restaurant, &actor) {
        return resp;
    }

    services.cart_remove(&SessionToken::new(token));
    StatusCode::NO_CONTENT.into_response()
}
