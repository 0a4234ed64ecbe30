//! Cross-module scenarios: checkout atomicity, the oversell race, status
//! workflow over real storage, and projection catch-up.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;

use comanda_core::{AggregateId, CurrencyCode, RestaurantId, TaxRate};
use comanda_events::{EventBus, EventEnvelope, InMemoryEventBus, Subscription};
use comanda_inventory::{
    AdjustmentKind, RecordAdjustment, StockLedger, StockLedgerCommand, StockLedgerId,
};
use comanda_menu::{MenuItem, MenuItemCommand, MenuItemId, RegisterItem, StockMode};
use comanda_orders::{Order, OrderCommand, OrderId, OrderStatus, TableId, Transition};

use crate::checkout::{CheckoutError, CheckoutLine, CheckoutRequest, OrderCoordinator};
use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::directory::{InMemoryTableDirectory, TableBinding};
use crate::event_store::{EventStore, InMemoryEventStore};
use crate::projections::{OrderBoardProjection, StockLevelsProjection};
use crate::read_model::InMemoryRestaurantStore;
use crate::streams;

type Bus = InMemoryEventBus<EventEnvelope<JsonValue>>;
type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Arc<Bus>>;
type Coordinator = OrderCoordinator<Arc<InMemoryEventStore>, Arc<Bus>, Arc<InMemoryTableDirectory>>;

struct Rig {
    store: Arc<InMemoryEventStore>,
    bus: Arc<Bus>,
    dispatcher: Dispatcher,
    tables: Arc<InMemoryTableDirectory>,
    coordinator: Coordinator,
    restaurant_id: RestaurantId,
    table_id: TableId,
}

impl Rig {
    fn new() -> Self {
        let store = Arc::new(InMemoryEventStore::new());
        let bus: Arc<Bus> = Arc::new(InMemoryEventBus::new());
        let dispatcher = CommandDispatcher::new(store.clone(), bus.clone());
        let tables = Arc::new(InMemoryTableDirectory::new());
        let coordinator = OrderCoordinator::new(store.clone(), bus.clone(), tables.clone());

        let restaurant_id = RestaurantId::new();
        let table_id = TableId::new(AggregateId::new());
        tables.register(TableBinding {
            table_id,
            location_id: comanda_orders::LocationId::new(AggregateId::new()),
            restaurant_id,
            label: "T1".to_string(),
            active: true,
        });

        Self {
            store,
            bus,
            dispatcher,
            tables,
            coordinator,
            restaurant_id,
            table_id,
        }
    }

    fn register_item(
        &self,
        name: &str,
        unit_price_minor: i64,
        tax_percent: u32,
        stock_mode: StockMode,
        currency: &str,
    ) -> MenuItemId {
        let item_id = MenuItemId::new(AggregateId::new());
        self.dispatcher
            .dispatch::<MenuItem>(
                self.restaurant_id,
                item_id.0,
                streams::MENU_ITEM,
                MenuItemCommand::RegisterItem(RegisterItem {
                    restaurant_id: self.restaurant_id,
                    item_id,
                    name: name.to_string(),
                    unit_price_minor,
                    tax_rate: TaxRate::from_percent(tax_percent).unwrap(),
                    currency: CurrencyCode::new(currency).unwrap(),
                    stock_mode,
                    occurred_at: Utc::now(),
                }),
                |_r, id| MenuItem::empty(MenuItemId::new(id)),
            )
            .unwrap();
        item_id
    }

    fn stock_in(&self, item_id: MenuItemId, quantity: u32) {
        let ledger_id = StockLedgerId::for_item(item_id);
        self.dispatcher
            .dispatch::<StockLedger>(
                self.restaurant_id,
                ledger_id.0,
                streams::STOCK_LEDGER,
                StockLedgerCommand::RecordAdjustment(RecordAdjustment {
                    restaurant_id: self.restaurant_id,
                    item_id,
                    kind: AdjustmentKind::In,
                    quantity,
                    reason: Some("delivery".to_string()),
                    actor: None,
                    occurred_at: Utc::now(),
                }),
                |_r, id| StockLedger::empty(StockLedgerId::new(id)),
            )
            .unwrap();
    }

    fn checkout(&self, lines: Vec<CheckoutLine>) -> Result<Order, CheckoutError> {
        self.coordinator.place_order(
            self.restaurant_id,
            None,
            CheckoutRequest {
                table_id: self.table_id,
                lines,
                notes: None,
                idempotency_key: None,
            },
        )
    }

    fn transition(&self, order_id: OrderId, target: OrderStatus) -> Result<(), DispatchError> {
        self.dispatcher
            .dispatch::<Order>(
                self.restaurant_id,
                order_id.0,
                streams::ORDER,
                OrderCommand::Transition(Transition {
                    restaurant_id: self.restaurant_id,
                    order_id,
                    target,
                    occurred_at: Utc::now(),
                }),
                |_r, id| Order::empty(OrderId::new(id)),
            )
            .map(|_| ())
    }
}

fn line(item_id: MenuItemId, quantity: u32) -> CheckoutLine {
    CheckoutLine { item_id, quantity }
}

fn drain(sub: &Subscription<EventEnvelope<JsonValue>>) -> Vec<EventEnvelope<JsonValue>> {
    let mut out = Vec::new();
    while let Ok(env) = sub.try_recv() {
        out.push(env);
    }
    out
}

#[test]
fn checkout_commits_order_and_ledger_debits_together() {
    let rig = Rig::new();
    let pizza = rig.register_item("Margherita", 1000, 10, StockMode::Finite, "EUR");
    let water = rig.register_item("Still water", 500, 0, StockMode::Infinite, "EUR");
    rig.stock_in(pizza, 10);

    let order = rig.checkout(vec![line(pizza, 2), line(water, 1)]).unwrap();

    assert_eq!(order.status(), OrderStatus::Pending);
    assert_eq!(order.totals().net_minor, 2500);
    assert_eq!(order.totals().tax_minor, 200);
    assert_eq!(order.totals().gross_minor, 2700);
    assert_eq!(order.currency().unwrap().as_str(), "EUR");
    assert_eq!(order.lines().len(), 2);

    // The finite item was debited in the same commit.
    assert_eq!(
        rig.coordinator
            .current_stock(rig.restaurant_id, pizza)
            .unwrap(),
        Some(8)
    );
    // Infinite items never consult the ledger.
    assert_eq!(
        rig.coordinator
            .current_stock(rig.restaurant_id, water)
            .unwrap(),
        None
    );

    // One order stream event; ledger stream holds IN + order debit.
    let order_stream = rig
        .store
        .load_stream(rig.restaurant_id, order.id_typed().0)
        .unwrap();
    assert_eq!(order_stream.len(), 1);
    let ledger_stream = rig
        .store
        .load_stream(rig.restaurant_id, StockLedgerId::for_item(pizza).0)
        .unwrap();
    assert_eq!(ledger_stream.len(), 2);
}

#[test]
fn duplicate_request_lines_are_merged_into_one_debit() {
    let rig = Rig::new();
    let pizza = rig.register_item("Margherita", 1000, 10, StockMode::Finite, "EUR");
    rig.stock_in(pizza, 10);

    let order = rig.checkout(vec![line(pizza, 1), line(pizza, 2)]).unwrap();

    assert_eq!(order.lines().len(), 1);
    assert_eq!(order.lines()[0].quantity, 3);
    assert_eq!(
        rig.coordinator
            .current_stock(rig.restaurant_id, pizza)
            .unwrap(),
        Some(7)
    );
}

#[test]
fn out_of_stock_checkout_leaves_no_partial_writes() {
    let rig = Rig::new();
    let pizza = rig.register_item("Margherita", 1000, 10, StockMode::Finite, "EUR");
    rig.stock_in(pizza, 2);

    let sub = rig.bus.subscribe();

    let err = rig.checkout(vec![line(pizza, 3)]).unwrap_err();
    match err {
        CheckoutError::OutOfStock {
            item_id,
            requested,
            available,
        } => {
            assert_eq!(item_id, pizza);
            assert_eq!(requested, 3);
            assert_eq!(available, 2);
        }
        other => panic!("Expected OutOfStock, got {other:?}"),
    }

    // Balance untouched, no debit appended, nothing published.
    assert_eq!(
        rig.coordinator
            .current_stock(rig.restaurant_id, pizza)
            .unwrap(),
        Some(2)
    );
    let ledger_stream = rig
        .store
        .load_stream(rig.restaurant_id, StockLedgerId::for_item(pizza).0)
        .unwrap();
    assert_eq!(ledger_stream.len(), 1);
    assert!(drain(&sub).is_empty());
}

#[test]
fn concurrent_checkouts_for_the_last_unit_admit_exactly_one() {
    let rig = Rig::new();
    let pizza = rig.register_item("Margherita", 1000, 10, StockMode::Finite, "EUR");
    rig.stock_in(pizza, 1);

    let (first, second) = std::thread::scope(|s| {
        let a = s.spawn(|| rig.checkout(vec![line(pizza, 1)]));
        let b = s.spawn(|| rig.checkout(vec![line(pizza, 1)]));
        (a.join().unwrap(), b.join().unwrap())
    });

    let outcomes = [first, second];
    let successes = outcomes.iter().filter(|r| r.is_ok()).count();
    let out_of_stock = outcomes
        .iter()
        .filter(|r| matches!(r, Err(CheckoutError::OutOfStock { .. })))
        .count();

    assert_eq!(successes, 1, "exactly one checkout may win the last unit");
    assert_eq!(out_of_stock, 1, "the loser must see OutOfStock");

    // Ledger: IN + exactly one OUT, balance zero, never negative.
    assert_eq!(
        rig.coordinator
            .current_stock(rig.restaurant_id, pizza)
            .unwrap(),
        Some(0)
    );
    let ledger_stream = rig
        .store
        .load_stream(rig.restaurant_id, StockLedgerId::for_item(pizza).0)
        .unwrap();
    assert_eq!(ledger_stream.len(), 2);
}

#[test]
fn checkout_validation_failures_are_typed() {
    let rig = Rig::new();
    let pizza = rig.register_item("Margherita", 1000, 10, StockMode::Finite, "EUR");
    rig.stock_in(pizza, 10);

    // Empty cart.
    assert!(matches!(
        rig.checkout(vec![]),
        Err(CheckoutError::Validation(_))
    ));

    // Non-positive quantity.
    assert!(matches!(
        rig.checkout(vec![line(pizza, 0)]),
        Err(CheckoutError::Validation(_))
    ));

    // Unknown item.
    assert!(matches!(
        rig.checkout(vec![line(MenuItemId::new(AggregateId::new()), 1)]),
        Err(CheckoutError::NotFound(_))
    ));

    // Mixed currency.
    let import = rig.register_item("Imported soda", 700, 10, StockMode::Infinite, "USD");
    assert!(matches!(
        rig.checkout(vec![line(pizza, 1), line(import, 1)]),
        Err(CheckoutError::Validation(_))
    ));
}

#[test]
fn unknown_inactive_or_foreign_tables_are_rejected() {
    let rig = Rig::new();
    let pizza = rig.register_item("Margherita", 1000, 10, StockMode::Infinite, "EUR");

    // Unknown table.
    let err = rig
        .coordinator
        .place_order(
            rig.restaurant_id,
            None,
            CheckoutRequest {
                table_id: TableId::new(AggregateId::new()),
                lines: vec![line(pizza, 1)],
                notes: None,
                idempotency_key: None,
            },
        )
        .unwrap_err();
    assert!(matches!(err, CheckoutError::NotFound(_)));

    // Inactive table.
    rig.tables.set_active(rig.table_id, false);
    assert!(matches!(
        rig.checkout(vec![line(pizza, 1)]),
        Err(CheckoutError::NotFound(_))
    ));
    rig.tables.set_active(rig.table_id, true);

    // Table owned by another restaurant: actor scope does not cover it.
    let err = rig
        .coordinator
        .place_order(
            RestaurantId::new(),
            None,
            CheckoutRequest {
                table_id: rig.table_id,
                lines: vec![line(pizza, 1)],
                notes: None,
                idempotency_key: None,
            },
        )
        .unwrap_err();
    assert!(matches!(err, CheckoutError::Unauthorized));
}

#[test]
fn idempotency_key_replays_the_original_order() {
    let rig = Rig::new();
    let pizza = rig.register_item("Margherita", 1000, 10, StockMode::Finite, "EUR");
    rig.stock_in(pizza, 10);

    let request = CheckoutRequest {
        table_id: rig.table_id,
        lines: vec![line(pizza, 2)],
        notes: None,
        idempotency_key: Some("session-7:attempt-1".to_string()),
    };

    let first = rig
        .coordinator
        .place_order(rig.restaurant_id, None, request.clone())
        .unwrap();
    let second = rig
        .coordinator
        .place_order(rig.restaurant_id, None, request)
        .unwrap();

    assert_eq!(first.id_typed(), second.id_typed());
    // No second debit happened.
    assert_eq!(
        rig.coordinator
            .current_stock(rig.restaurant_id, pizza)
            .unwrap(),
        Some(8)
    );
}

#[test]
fn status_workflow_over_storage_enforces_the_graph() {
    let rig = Rig::new();
    let pizza = rig.register_item("Margherita", 1000, 10, StockMode::Infinite, "EUR");
    let order = rig.checkout(vec![line(pizza, 1)]).unwrap();
    let order_id = order.id_typed();

    // Skipping PAYING is illegal.
    let err = rig.transition(order_id, OrderStatus::Paid).unwrap_err();
    assert!(matches!(err, DispatchError::IllegalTransition { .. }));

    rig.transition(order_id, OrderStatus::Paying).unwrap();
    rig.transition(order_id, OrderStatus::Paid).unwrap();
    rig.transition(order_id, OrderStatus::Served).unwrap();

    // Terminal: every further transition fails.
    for target in [
        OrderStatus::Pending,
        OrderStatus::Paying,
        OrderStatus::Paid,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ] {
        let err = rig.transition(order_id, target).unwrap_err();
        assert!(matches!(err, DispatchError::IllegalTransition { .. }));
    }

    // Unknown order id.
    let err = rig
        .transition(OrderId::new(AggregateId::new()), OrderStatus::Paying)
        .unwrap_err();
    assert!(matches!(err, DispatchError::NotFound));
}

#[test]
fn projections_catch_up_from_the_bus() {
    let rig = Rig::new();
    let sub = rig.bus.subscribe();

    let pizza = rig.register_item("Margherita", 1000, 10, StockMode::Finite, "EUR");
    rig.stock_in(pizza, 5);
    let order = rig.checkout(vec![line(pizza, 2)]).unwrap();
    rig.transition(order.id_typed(), OrderStatus::Paying).unwrap();
    rig.transition(order.id_typed(), OrderStatus::Paid).unwrap();

    let board = OrderBoardProjection::new(Arc::new(InMemoryRestaurantStore::new()));
    let stock = StockLevelsProjection::new(Arc::new(InMemoryRestaurantStore::new()));

    for env in drain(&sub) {
        match env.aggregate_type() {
            streams::ORDER => board.apply_envelope(&env).unwrap(),
            streams::STOCK_LEDGER => stock.apply_envelope(&env).unwrap(),
            _ => {}
        }
    }

    let rows = board.list(rig.restaurant_id);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].order_id, order.id_typed());
    assert_eq!(rows[0].status, OrderStatus::Paid);
    assert_eq!(rows[0].kitchen_stage, comanda_orders::KitchenStage::Preparing);
    assert_eq!(rows[0].gross_minor, 2200);

    let level = stock.get(rig.restaurant_id, &pizza).unwrap();
    assert_eq!(level.quantity, 3);
}

#[test]
fn stock_adjustment_validation_flows_through_dispatch() {
    let rig = Rig::new();
    let pizza = rig.register_item("Margherita", 1000, 10, StockMode::Finite, "EUR");

    let ledger_id = StockLedgerId::for_item(pizza);
    let err = rig
        .dispatcher
        .dispatch::<StockLedger>(
            rig.restaurant_id,
            ledger_id.0,
            streams::STOCK_LEDGER,
            StockLedgerCommand::RecordAdjustment(RecordAdjustment {
                restaurant_id: rig.restaurant_id,
                item_id: pizza,
                kind: AdjustmentKind::In,
                quantity: 0,
                reason: None,
                actor: None,
                occurred_at: Utc::now(),
            }),
            |_r, id| StockLedger::empty(StockLedgerId::new(id)),
        )
        .unwrap_err();
    assert!(matches!(err, DispatchError::Validation(_)));
}

#[test]
fn current_stock_for_unknown_item_is_not_found() {
    let rig = Rig::new();
    let err = rig
        .coordinator
        .current_stock(rig.restaurant_id, MenuItemId::new(AggregateId::new()))
        .unwrap_err();
    assert!(matches!(err, CheckoutError::NotFound(_)));
}
