use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use comanda_core::{
    ActorId, Aggregate, AggregateId, AggregateRoot, CurrencyCode, DomainError, RestaurantId,
    TaxRate,
};
use comanda_events::Event;
use comanda_menu::MenuItemId;

use crate::pricing::{OrderTotals, totals_for};
use crate::status::OrderStatus;

/// Order identifier (restaurant-scoped via `restaurant_id` fields in
/// events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub AggregateId);

impl OrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for OrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Reference to a dining table (owned by the external table registry).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableId(pub AggregateId);

impl TableId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for TableId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Reference to a restaurant location (owned by the external registry).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(pub AggregateId);

impl LocationId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for LocationId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Immutable order line snapshot captured at placement time.
///
/// Decoupled from later menu price changes; `line_total_minor` is the line's
/// gross (`net + tax`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub item_id: MenuItemId,
    pub name_snapshot: String,
    pub quantity: u32,
    pub unit_price_minor: i64,
    pub tax_rate: TaxRate,
    pub net_minor: i64,
    pub tax_minor: i64,
    pub line_total_minor: i64,
}

/// Aggregate root: Order.
///
/// Created once at checkout; afterwards only its status moves, and only along
/// the workflow graph. Orders are never physically deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    restaurant_id: Option<RestaurantId>,
    table_id: Option<TableId>,
    location_id: Option<LocationId>,
    status: OrderStatus,
    currency: Option<CurrencyCode>,
    lines: Vec<OrderLine>,
    totals: OrderTotals,
    notes: Option<String>,
    placed_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Order {
    /// Create an empty, not-yet-placed aggregate instance for rehydration.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            restaurant_id: None,
            table_id: None,
            location_id: None,
            status: OrderStatus::Pending,
            currency: None,
            lines: Vec::new(),
            totals: OrderTotals::default(),
            notes: None,
            placed_at: None,
            updated_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn restaurant_id(&self) -> Option<RestaurantId> {
        self.restaurant_id
    }

    pub fn table_id(&self) -> Option<TableId> {
        self.table_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn currency(&self) -> Option<&CurrencyCode> {
        self.currency.as_ref()
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn totals(&self) -> OrderTotals {
        self.totals
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn placed_at(&self) -> Option<DateTime<Utc>> {
        self.placed_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn is_placed(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PlaceOrder (issued by the order coordinator at checkout).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub restaurant_id: RestaurantId,
    pub order_id: OrderId,
    pub table_id: TableId,
    pub location_id: LocationId,
    pub currency: CurrencyCode,
    pub lines: Vec<OrderLine>,
    pub totals: OrderTotals,
    pub notes: Option<String>,
    pub actor: Option<ActorId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Transition (move status along the workflow graph).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub restaurant_id: RestaurantId,
    pub order_id: OrderId,
    pub target: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    PlaceOrder(PlaceOrder),
    Transition(Transition),
}

/// Event: OrderPlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub restaurant_id: RestaurantId,
    pub order_id: OrderId,
    pub table_id: TableId,
    pub location_id: LocationId,
    pub currency: CurrencyCode,
    pub lines: Vec<OrderLine>,
    pub net_minor: i64,
    pub tax_minor: i64,
    pub gross_minor: i64,
    pub notes: Option<String>,
    pub actor: Option<ActorId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderStatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    pub restaurant_id: RestaurantId,
    pub order_id: OrderId,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderPlaced(OrderPlaced),
    OrderStatusChanged(OrderStatusChanged),
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "orders.order.placed",
            OrderEvent::OrderStatusChanged(_) => "orders.order.status_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(e) => e.occurred_at,
            OrderEvent::OrderStatusChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderPlaced(e) => {
                self.id = e.order_id;
                self.restaurant_id = Some(e.restaurant_id);
                self.table_id = Some(e.table_id);
                self.location_id = Some(e.location_id);
                self.status = OrderStatus::Pending;
                self.currency = Some(e.currency.clone());
                self.lines = e.lines.clone();
                self.totals = OrderTotals {
                    net_minor: e.net_minor,
                    tax_minor: e.tax_minor,
                    gross_minor: e.gross_minor,
                };
                self.notes = e.notes.clone();
                self.placed_at = Some(e.occurred_at);
                self.updated_at = Some(e.occurred_at);
                self.created = true;
            }
            OrderEvent::OrderStatusChanged(e) => {
                self.status = e.to;
                self.updated_at = Some(e.occurred_at);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::PlaceOrder(cmd) => self.handle_place(cmd),
            OrderCommand::Transition(cmd) => self.handle_transition(cmd),
        }
    }
}

impl Order {
    fn ensure_restaurant(&self, restaurant_id: RestaurantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.restaurant_id != Some(restaurant_id) {
            return Err(DomainError::invariant("restaurant mismatch"));
        }
        Ok(())
    }

    fn ensure_order_id(&self, order_id: OrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already placed"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("cannot place an order with no lines"));
        }
        if cmd.lines.iter().any(|l| l.quantity == 0) {
            return Err(DomainError::validation("line quantity must be at least 1"));
        }

        // Totals must agree with the lines they summarize; a mismatch means
        // the caller priced with different inputs than it is persisting.
        let recomputed = totals_for(&cmd.lines);
        if recomputed != cmd.totals {
            return Err(DomainError::invariant("order totals do not match lines"));
        }
        if cmd.totals.gross_minor != cmd.totals.net_minor + cmd.totals.tax_minor {
            return Err(DomainError::invariant("gross must equal net plus tax"));
        }

        Ok(vec![OrderEvent::OrderPlaced(OrderPlaced {
            restaurant_id: cmd.restaurant_id,
            order_id: cmd.order_id,
            table_id: cmd.table_id,
            location_id: cmd.location_id,
            currency: cmd.currency.clone(),
            lines: cmd.lines.clone(),
            net_minor: cmd.totals.net_minor,
            tax_minor: cmd.totals.tax_minor,
            gross_minor: cmd.totals.gross_minor,
            notes: cmd.notes.clone(),
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_transition(&self, cmd: &Transition) -> Result<Vec<OrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_restaurant(cmd.restaurant_id)?;
        self.ensure_order_id(cmd.order_id)?;

        if !self.status.can_transition_to(cmd.target) {
            return Err(DomainError::illegal_transition(
                self.status.as_str(),
                cmd.target.as_str(),
            ));
        }

        Ok(vec![OrderEvent::OrderStatusChanged(OrderStatusChanged {
            restaurant_id: cmd.restaurant_id,
            order_id: cmd.order_id,
            from: self.status,
            to: cmd.target,
            occurred_at: cmd.occurred_at,
        })])
    }
}
