//! Request/response DTOs and JSON mapping helpers.
//!
//! Wire conventions: money is an integer minor-unit amount plus a 3-letter
//! currency code, tax rates are two-decimal percentages, and order status is
//! one of the six canonical uppercase tokens.

use serde::Deserialize;
use serde_json::json;

use comanda_core::{CurrencyCode, TaxRate};
use comanda_infra::directory::TableBinding;
use comanda_infra::projections::{MenuItemRow, OrderBoardRow, StockLevelRow};
use comanda_inventory::AdjustmentKind;
use comanda_menu::StockMode;
use comanda_orders::{Order, OrderLine, OrderStatus};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterItemRequest {
    pub name: String,
    pub unit_price_minor: i64,
    /// Two-decimal percentage, e.g. `10.00`.
    pub tax_rate: TaxRate,
    pub currency: CurrencyCode,
    pub stock_mode: StockMode,
}

#[derive(Debug, Deserialize)]
pub struct RepriceItemRequest {
    pub unit_price_minor: i64,
    pub tax_rate: TaxRate,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub kind: AdjustmentKind,
    pub quantity: u32,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutLineRequest {
    pub item_id: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequestBody {
    pub table_id: String,
    pub lines: Vec<CheckoutLineRequest>,
    pub notes: Option<String>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    /// Canonical status token (`PENDING`, `PAYING`, …).
    pub target: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct RegisterTableRequest {
    pub label: String,
    /// Existing ids may be supplied (e.g. from the registry being mirrored);
    /// fresh ones are generated otherwise.
    pub table_id: Option<String>,
    pub location_id: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

// -------------------------
// JSON mapping helpers
// -------------------------

fn tax_rate_json(rate: TaxRate) -> serde_json::Value {
    serde_json::to_value(rate).unwrap_or(serde_json::Value::Null)
}

pub fn menu_item_to_json(rm: MenuItemRow) -> serde_json::Value {
    json!({
        "id": rm.item_id.0.to_string(),
        "name": rm.name,
        "unit_price_minor": rm.unit_price_minor,
        "tax_rate": tax_rate_json(rm.tax_rate),
        "currency": rm.currency.as_str(),
        "stock_mode": match rm.stock_mode { StockMode::Finite => "finite", StockMode::Infinite => "infinite" },
        "retired": rm.retired,
    })
}

pub fn stock_level_to_json(item_id: &str, quantity: Option<i64>) -> serde_json::Value {
    json!({
        "item_id": item_id,
        // null for INFINITE items, which never consult the ledger.
        "quantity": quantity,
    })
}

pub fn stock_row_to_json(rm: StockLevelRow) -> serde_json::Value {
    json!({
        "item_id": rm.item_id.0.to_string(),
        "quantity": rm.quantity,
    })
}

fn order_line_to_json(line: &OrderLine) -> serde_json::Value {
    json!({
        "item_id": line.item_id.0.to_string(),
        "name": line.name_snapshot,
        "quantity": line.quantity,
        "unit_price_minor": line.unit_price_minor,
        "tax_rate": tax_rate_json(line.tax_rate),
        "net_minor": line.net_minor,
        "tax_minor": line.tax_minor,
        "line_total_minor": line.line_total_minor,
    })
}

/// Response shape for a freshly placed order (authoritative aggregate state).
pub fn order_to_json(order: &Order) -> serde_json::Value {
    json!({
        "id": order.id_typed().0.to_string(),
        "table_id": order.table_id().map(|t| t.0.to_string()),
        "status": order.status().as_str(),
        "kitchen_stage": order.status().kitchen_stage().as_str(),
        "currency": order.currency().map(CurrencyCode::as_str),
        "net_minor": order.totals().net_minor,
        "tax_minor": order.totals().tax_minor,
        "gross_minor": order.totals().gross_minor,
        "lines": order.lines().iter().map(order_line_to_json).collect::<Vec<_>>(),
        "notes": order.notes(),
        "placed_at": order.placed_at().map(|t| t.to_rfc3339()),
        "updated_at": order.updated_at().map(|t| t.to_rfc3339()),
    })
}

/// Response shape for board rows (read model).
pub fn board_row_to_json(rm: OrderBoardRow) -> serde_json::Value {
    json!({
        "id": rm.order_id.0.to_string(),
        "table_id": rm.table_id.0.to_string(),
        "status": rm.status.as_str(),
        "kitchen_stage": rm.kitchen_stage.as_str(),
        "currency": rm.currency.as_str(),
        "net_minor": rm.net_minor,
        "tax_minor": rm.tax_minor,
        "gross_minor": rm.gross_minor,
        "lines": rm.lines.iter().map(order_line_to_json).collect::<Vec<_>>(),
        "notes": rm.notes,
        "placed_at": rm.placed_at.to_rfc3339(),
        "updated_at": rm.updated_at.to_rfc3339(),
    })
}

pub fn table_to_json(binding: TableBinding) -> serde_json::Value {
    json!({
        "id": binding.table_id.0.to_string(),
        "location_id": binding.location_id.0.to_string(),
        "label": binding.label,
        "active": binding.active,
    })
}
