//! Infrastructure layer: event storage, command orchestration, read models,
//! checkout coordination and live view synchronization.

pub mod cart_sessions;
pub mod checkout;
pub mod command_dispatcher;
pub mod directory;
pub mod event_store;
pub mod idempotency;
pub mod live;
pub mod projections;
pub mod read_model;

#[cfg(test)]
mod integration_tests;

/// Aggregate type identifiers (one per stream family).
pub mod streams {
    pub const MENU_ITEM: &str = "menu.item";
    pub const STOCK_LEDGER: &str = "inventory.ledger";
    pub const ORDER: &str = "orders.order";
}
