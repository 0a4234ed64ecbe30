//! Stock ledger domain module (event-sourced).
//!
//! Stock is an **append-only ledger** of adjustments per item; the current
//! balance is always derived by replaying the ledger, never stored as a
//! mutable field. That keeps every figure reconstructable and auditable from
//! the log alone, and lets the storage layer's optimistic append turn the
//! "sufficient balance?" decision into a conditional write.

pub mod ledger;

pub use ledger::{
    AdjustmentKind, DebitForOrder, RecordAdjustment, StockAdjusted, StockLedger,
    StockLedgerCommand, StockLedgerEvent, StockLedgerId,
};
