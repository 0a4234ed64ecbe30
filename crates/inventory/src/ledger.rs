use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use comanda_core::{ActorId, Aggregate, AggregateId, AggregateRoot, DomainError, RestaurantId};
use comanda_events::Event;
use comanda_menu::MenuItemId;

/// Namespace for deriving ledger stream ids from item ids (UUIDv5).
const LEDGER_NAMESPACE: Uuid = Uuid::from_u128(0x8d0c_4ab0_51d4_4e6b_9a1f_2f63_c0de_5eed);

/// Stock ledger identifier.
///
/// Each menu item has exactly one ledger stream, at an id derived
/// deterministically from the item id so the two streams never collide and
/// any component can address the ledger without a lookup.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockLedgerId(pub AggregateId);

impl StockLedgerId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    /// The ledger stream id for a menu item.
    pub fn for_item(item_id: MenuItemId) -> Self {
        let uuid = Uuid::new_v5(&LEDGER_NAMESPACE, item_id.0.as_uuid().as_bytes());
        Self(AggregateId::from_uuid(uuid))
    }
}

impl core::fmt::Display for StockLedgerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// The three stock-affecting event kinds.
///
/// `In` increases the balance; `Out` and `Spoilage` decrease it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AdjustmentKind {
    In,
    Out,
    Spoilage,
}

impl AdjustmentKind {
    /// Signed contribution of one unit of this kind to the balance.
    pub fn sign(self) -> i64 {
        match self {
            AdjustmentKind::In => 1,
            AdjustmentKind::Out | AdjustmentKind::Spoilage => -1,
        }
    }
}

/// Aggregate root: StockLedger.
///
/// State is nothing but the replay of its adjustments; `balance()` is the
/// signed sum over the whole log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLedger {
    id: StockLedgerId,
    restaurant_id: Option<RestaurantId>,
    item_id: Option<MenuItemId>,
    balance: i64,
    version: u64,
}

impl StockLedger {
    /// Create an empty ledger instance for rehydration.
    pub fn empty(id: StockLedgerId) -> Self {
        Self {
            id,
            restaurant_id: None,
            item_id: None,
            balance: 0,
            version: 0,
        }
    }

    pub fn id_typed(&self) -> StockLedgerId {
        self.id
    }

    pub fn restaurant_id(&self) -> Option<RestaurantId> {
        self.restaurant_id
    }

    pub fn item_id(&self) -> Option<MenuItemId> {
        self.item_id
    }

    /// Current stock: Σ(IN) − Σ(OUT) − Σ(SPOILAGE), derived from the log.
    pub fn balance(&self) -> i64 {
        self.balance
    }
}

impl AggregateRoot for StockLedger {
    type Id = StockLedgerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordAdjustment (manual IN / OUT / SPOILAGE entry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordAdjustment {
    pub restaurant_id: RestaurantId,
    pub item_id: MenuItemId,
    pub kind: AdjustmentKind,
    pub quantity: u32,
    pub reason: Option<String>,
    pub actor: Option<ActorId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DebitForOrder (conditional decrement at checkout).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebitForOrder {
    pub restaurant_id: RestaurantId,
    pub item_id: MenuItemId,
    pub order_id: AggregateId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockLedgerCommand {
    RecordAdjustment(RecordAdjustment),
    DebitForOrder(DebitForOrder),
}

/// Event: StockAdjusted (the only ledger fact; immutable, append-only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub restaurant_id: RestaurantId,
    pub item_id: MenuItemId,
    pub kind: AdjustmentKind,
    pub quantity: u32,
    pub reason: Option<String>,
    pub actor: Option<ActorId>,
    /// Set when the adjustment is an order-time debit.
    pub order_id: Option<AggregateId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockLedgerEvent {
    StockAdjusted(StockAdjusted),
}

impl Event for StockLedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockLedgerEvent::StockAdjusted(_) => "inventory.ledger.adjusted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockLedgerEvent::StockAdjusted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for StockLedger {
    type Command = StockLedgerCommand;
    type Event = StockLedgerEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StockLedgerEvent::StockAdjusted(e) => {
                self.restaurant_id = Some(e.restaurant_id);
                self.item_id = Some(e.item_id);
                self.balance += e.kind.sign() * i64::from(e.quantity);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StockLedgerCommand::RecordAdjustment(cmd) => self.handle_record(cmd),
            StockLedgerCommand::DebitForOrder(cmd) => self.handle_debit(cmd),
        }
    }
}

impl StockLedger {
    fn ensure_restaurant(&self, restaurant_id: RestaurantId) -> Result<(), DomainError> {
        match self.restaurant_id {
            None => Ok(()),
            Some(r) if r == restaurant_id => Ok(()),
            Some(_) => Err(DomainError::invariant("restaurant mismatch")),
        }
    }

    fn ensure_item(&self, item_id: MenuItemId) -> Result<(), DomainError> {
        match self.item_id {
            None => Ok(()),
            Some(i) if i == item_id => Ok(()),
            Some(_) => Err(DomainError::invariant("item_id mismatch")),
        }
    }

    fn handle_record(&self, cmd: &RecordAdjustment) -> Result<Vec<StockLedgerEvent>, DomainError> {
        self.ensure_restaurant(cmd.restaurant_id)?;
        self.ensure_item(cmd.item_id)?;

        if cmd.quantity == 0 {
            return Err(DomainError::validation("adjustment quantity must be positive"));
        }

        Ok(vec![StockLedgerEvent::StockAdjusted(StockAdjusted {
            restaurant_id: cmd.restaurant_id,
            item_id: cmd.item_id,
            kind: cmd.kind,
            quantity: cmd.quantity,
            reason: cmd.reason.clone(),
            actor: cmd.actor,
            order_id: None,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_debit(&self, cmd: &DebitForOrder) -> Result<Vec<StockLedgerEvent>, DomainError> {
        self.ensure_restaurant(cmd.restaurant_id)?;
        self.ensure_item(cmd.item_id)?;

        if cmd.quantity == 0 {
            return Err(DomainError::validation("debit quantity must be positive"));
        }

        // The decrement-if-sufficient decision. The store's optimistic append
        // at this aggregate's observed version makes it a conditional write:
        // a concurrent debit invalidates the version and forces a re-decision
        // against the fresh balance, so it can never go negative.
        if self.balance < i64::from(cmd.quantity) {
            return Err(DomainError::out_of_stock(
                cmd.item_id.0,
                cmd.quantity,
                self.balance,
            ));
        }

        Ok(vec![StockLedgerEvent::StockAdjusted(StockAdjusted {
            restaurant_id: cmd.restaurant_id,
            item_id: cmd.item_id,
            kind: AdjustmentKind::Out,
            quantity: cmd.quantity,
            reason: None,
            actor: None,
            order_id: Some(cmd.order_id),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use comanda_events::execute;

    fn test_restaurant_id() -> RestaurantId {
        RestaurantId::new()
    }

    fn test_item_id() -> MenuItemId {
        MenuItemId::new(AggregateId::new())
    }

    fn record(
        restaurant_id: RestaurantId,
        item_id: MenuItemId,
        kind: AdjustmentKind,
        quantity: u32,
    ) -> StockLedgerCommand {
        StockLedgerCommand::RecordAdjustment(RecordAdjustment {
            restaurant_id,
            item_id,
            kind,
            quantity,
            reason: None,
            actor: None,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn ledger_id_is_deterministic_per_item() {
        let item = test_item_id();
        assert_eq!(StockLedgerId::for_item(item), StockLedgerId::for_item(item));
        assert_ne!(
            StockLedgerId::for_item(item),
            StockLedgerId::for_item(test_item_id())
        );
        // The derived stream must never collide with the item's own stream.
        assert_ne!(StockLedgerId::for_item(item).0, item.0);
    }

    #[test]
    fn balance_is_signed_sum_over_adjustments() {
        let restaurant_id = test_restaurant_id();
        let item_id = test_item_id();
        let mut ledger = StockLedger::empty(StockLedgerId::for_item(item_id));

        execute(
            &mut ledger,
            &record(restaurant_id, item_id, AdjustmentKind::In, 10),
        )
        .unwrap();
        execute(
            &mut ledger,
            &record(restaurant_id, item_id, AdjustmentKind::Out, 3),
        )
        .unwrap();
        execute(
            &mut ledger,
            &record(restaurant_id, item_id, AdjustmentKind::Spoilage, 2),
        )
        .unwrap();

        assert_eq!(ledger.balance(), 5);
        assert_eq!(ledger.version(), 3);
    }

    #[test]
    fn zero_quantity_adjustment_is_rejected() {
        let restaurant_id = test_restaurant_id();
        let item_id = test_item_id();
        let ledger = StockLedger::empty(StockLedgerId::for_item(item_id));

        let err = ledger
            .handle(&record(restaurant_id, item_id, AdjustmentKind::In, 0))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn debit_with_sufficient_balance_emits_out_adjustment() {
        let restaurant_id = test_restaurant_id();
        let item_id = test_item_id();
        let order_id = AggregateId::new();
        let mut ledger = StockLedger::empty(StockLedgerId::for_item(item_id));

        execute(
            &mut ledger,
            &record(restaurant_id, item_id, AdjustmentKind::In, 5),
        )
        .unwrap();

        let events = execute(
            &mut ledger,
            &StockLedgerCommand::DebitForOrder(DebitForOrder {
                restaurant_id,
                item_id,
                order_id,
                quantity: 3,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        match &events[0] {
            StockLedgerEvent::StockAdjusted(e) => {
                assert_eq!(e.kind, AdjustmentKind::Out);
                assert_eq!(e.quantity, 3);
                assert_eq!(e.order_id, Some(order_id));
            }
        }
        assert_eq!(ledger.balance(), 2);
    }

    #[test]
    fn debit_beyond_balance_is_out_of_stock() {
        let restaurant_id = test_restaurant_id();
        let item_id = test_item_id();
        let mut ledger = StockLedger::empty(StockLedgerId::for_item(item_id));

        execute(
            &mut ledger,
            &record(restaurant_id, item_id, AdjustmentKind::In, 2),
        )
        .unwrap();

        let err = ledger
            .handle(&StockLedgerCommand::DebitForOrder(DebitForOrder {
                restaurant_id,
                item_id,
                order_id: AggregateId::new(),
                quantity: 3,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();

        match err {
            DomainError::OutOfStock {
                item_id: id,
                requested,
                available,
            } => {
                assert_eq!(id, item_id.0);
                assert_eq!(requested, 3);
                assert_eq!(available, 2);
            }
            other => panic!("Expected OutOfStock, got {other:?}"),
        }
        // Rejected command must not have touched state.
        assert_eq!(ledger.balance(), 2);
        assert_eq!(ledger.version(), 1);
    }
}
