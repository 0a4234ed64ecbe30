//! Menu domain module (event-sourced).
//!
//! This crate contains business rules for menu items, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage). Menu management
//! screens are an external collaborator; the aggregate here is the
//! authoritative item definition that checkout snapshots prices from.

pub mod item;

pub use item::{
    ItemRegistered, ItemRepriced, ItemRetired, MenuItem, MenuItemCommand, MenuItemEvent,
    MenuItemId, RegisterItem, RepriceItem, RetireItem, StockMode,
};
