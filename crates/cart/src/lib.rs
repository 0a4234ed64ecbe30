//! Cart domain module.
//!
//! A cart is a client-held, session-scoped working set: it snapshots item
//! prices at add-time, computes running totals in integer minor units, and is
//! restorable from a serialized snapshot keyed by a session/table token. It
//! holds **no authoritative data** — checkout re-resolves every price and
//! every stock check against the real streams.
//!
//! Cart operations never fail: invalid quantities clamp to removals and
//! unknown line ids are no-ops.

pub mod cart;
pub mod store;

pub use cart::{Cart, CartLine, CartTotals, ItemSnapshot};
pub use store::{CartStore, SessionToken};
