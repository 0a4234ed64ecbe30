//! Orders domain module (event-sourced).
//!
//! An order is created exactly once at checkout and afterwards changes only
//! through status transitions along a fixed workflow graph. Order lines are
//! immutable snapshots of menu prices at placement time; totals are integer
//! minor-unit arithmetic with per-line tax rounding.

pub mod order;
pub mod pricing;
pub mod status;

pub use order::{
    LocationId, Order, OrderCommand, OrderEvent, OrderId, OrderLine, OrderPlaced,
    OrderStatusChanged, PlaceOrder, TableId, Transition,
};
pub use pricing::{OrderTotals, price_line, totals_for};
pub use status::{KitchenStage, OrderStatus};
