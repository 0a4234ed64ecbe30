use axum::{Router, routing::get};

pub mod cart;
pub mod common;
pub mod menu;
pub mod orders;
pub mod stock;
pub mod system;
pub mod tables;

/// Router for all authenticated (restaurant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/stream", get(system::stream))
        .nest("/menu", menu::router())
        .nest("/stock", stock::router())
        .nest("/carts", cart::router())
        .nest("/orders", orders::router())
        .nest("/tables", tables::router())
}
