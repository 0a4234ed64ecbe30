//! Order transaction coordinator.
//!
//! Turns a validated cart into one durable commit: an order stream plus one
//! ledger debit per finite item, appended atomically. The stock pre-check is
//! advisory only — the ledger aggregate re-decides "sufficient?" against the
//! version the atomic append then verifies, so the storage layer's conflict
//! detection is the final gate against over-selling (no in-process lock).

use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use chrono::Utc;

use comanda_core::{
    ActorId, Aggregate, AggregateId, AggregateRoot, CurrencyCode, DomainError, ExpectedVersion,
    RestaurantId,
};
use comanda_events::{EventBus, EventEnvelope};
use comanda_inventory::{DebitForOrder, StockLedger, StockLedgerCommand, StockLedgerId};
use comanda_menu::{MenuItem, MenuItemId, StockMode};
use comanda_orders::{Order, OrderCommand, OrderId, PlaceOrder, TableId, pricing};

use crate::command_dispatcher::{DispatchError, apply_history, stream_version};
use crate::directory::TableDirectory;
use crate::event_store::{EventStore, EventStoreError, StreamAppend, UncommittedEvent};
use crate::idempotency::IdempotencyKeys;
use crate::streams;

/// Bounded re-read/re-decide attempts when a concurrent commit invalidates
/// an observed ledger version.
const MAX_COMMIT_ATTEMPTS: usize = 3;

/// One requested line: item + quantity. Prices are never taken from the
/// caller; they are re-resolved from the menu streams at commit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLine {
    pub item_id: MenuItemId,
    pub quantity: u32,
}

/// Checkout input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub table_id: TableId,
    pub lines: Vec<CheckoutLine>,
    pub notes: Option<String>,
    /// Optional caller-supplied token making retries safe: a replayed key
    /// returns the originally placed order instead of double-submitting.
    pub idempotency_key: Option<String>,
}

/// Checkout failure taxonomy. Always a typed result; nothing panics across
/// this boundary.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("out of stock: item {item_id} has {available}, requested {requested}")]
    OutOfStock {
        item_id: MenuItemId,
        requested: u32,
        available: i64,
    },

    #[error("unauthorized")]
    Unauthorized,

    /// Storage commit failure. Surfaced generically; storage internals stay
    /// out of user-facing messages.
    #[error("transaction failed: {0}")]
    TransactionFailed(String),
}

impl CheckoutError {
    fn from_domain(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                CheckoutError::Validation(msg)
            }
            DomainError::OutOfStock {
                item_id,
                requested,
                available,
            } => CheckoutError::OutOfStock {
                item_id: MenuItemId::new(item_id),
                requested,
                available,
            },
            DomainError::NotFound => CheckoutError::NotFound("resource not found".to_string()),
            DomainError::Unauthorized => CheckoutError::Unauthorized,
            // Invariant/conflict/transition failures at checkout mean the
            // coordinator assembled an inconsistent commit.
            other => CheckoutError::TransactionFailed(format!("{other:?}")),
        }
    }

    fn from_dispatch(err: DispatchError) -> Self {
        match err {
            DispatchError::Validation(msg) => CheckoutError::Validation(msg),
            DispatchError::NotFound => CheckoutError::NotFound("resource not found".to_string()),
            DispatchError::Unauthorized => CheckoutError::Unauthorized,
            DispatchError::OutOfStock {
                item_id,
                requested,
                available,
            } => CheckoutError::OutOfStock {
                item_id: MenuItemId::new(item_id),
                requested,
                available,
            },
            other => CheckoutError::TransactionFailed(format!("{other:?}")),
        }
    }
}

/// The order transaction coordinator.
///
/// Composes the event store (atomic multi-stream append), the bus (change
/// notifications) and the table directory (external registry seam). Not
/// idempotent without a caller-supplied key.
#[derive(Debug)]
pub struct OrderCoordinator<S, B, T> {
    store: S,
    bus: B,
    tables: T,
    idempotency: IdempotencyKeys,
}

impl<S, B, T> OrderCoordinator<S, B, T>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    T: TableDirectory,
{
    pub fn new(store: S, bus: B, tables: T) -> Self {
        Self {
            store,
            bus,
            tables,
            idempotency: IdempotencyKeys::new(),
        }
    }

    /// Create a durable order from a cart's lines.
    ///
    /// On success the order is `PENDING` and every finite line has debited
    /// its ledger in the same commit. On any failure nothing is written.
    pub fn place_order(
        &self,
        restaurant_id: RestaurantId,
        actor: Option<ActorId>,
        request: CheckoutRequest,
    ) -> Result<Order, CheckoutError> {
        // 1) Resolve table -> location -> restaurant.
        let table = self
            .tables
            .resolve(request.table_id)
            .filter(|t| t.active)
            .ok_or_else(|| CheckoutError::NotFound("unknown or inactive table".to_string()))?;
        if table.restaurant_id != restaurant_id {
            return Err(CheckoutError::Unauthorized);
        }

        // 2) Validate and merge requested lines.
        let merged = merge_lines(&request.lines)?;

        // 3) Idempotent replay: a known key returns the original order.
        if let Some(key) = &request.idempotency_key {
            if let Some(existing) = self.idempotency.get(restaurant_id, key) {
                return self.load_order(restaurant_id, existing);
            }
        }

        let order_id = OrderId::new(AggregateId::new());

        for _attempt in 0..MAX_COMMIT_ATTEMPTS {
            match self.try_commit(restaurant_id, actor, &table.location_id, &request, &merged, order_id)
            {
                Ok(order) => {
                    if let Some(key) = request.idempotency_key.clone() {
                        self.idempotency.record(restaurant_id, key, order_id);
                    }
                    return Ok(order);
                }
                // A concurrent commit moved one of the ledger streams between
                // our read and our append. Re-read and re-decide: the fresh
                // balance may now be insufficient (-> OutOfStock).
                Err(CommitAttemptError::Conflict) => continue,
                Err(CommitAttemptError::Fatal(err)) => return Err(err),
            }
        }

        Err(CheckoutError::TransactionFailed(
            "persistent write conflicts on stock ledgers".to_string(),
        ))
    }

    /// Current stock for an item: `Some(balance)` for finite items, `None`
    /// for infinite ones (which never consult the ledger).
    pub fn current_stock(
        &self,
        restaurant_id: RestaurantId,
        item_id: MenuItemId,
    ) -> Result<Option<i64>, CheckoutError> {
        let item = self.load_menu_item(restaurant_id, item_id)?;
        if item.stock_mode() == StockMode::Infinite {
            return Ok(None);
        }
        let ledger = self.load_ledger(restaurant_id, item_id)?;
        Ok(Some(ledger.balance()))
    }

    /// Rehydrate a placed order from its stream.
    pub fn load_order(
        &self,
        restaurant_id: RestaurantId,
        order_id: OrderId,
    ) -> Result<Order, CheckoutError> {
        let history = self
            .store
            .load_stream(restaurant_id, order_id.0)
            .map_err(|e| CheckoutError::TransactionFailed(e.to_string()))?;
        if history.is_empty() {
            return Err(CheckoutError::NotFound(format!("order {order_id}")));
        }

        let mut order = Order::empty(order_id);
        apply_history::<Order>(&mut order, &history).map_err(CheckoutError::from_dispatch)?;
        Ok(order)
    }

    /// One read-decide-append attempt.
    fn try_commit(
        &self,
        restaurant_id: RestaurantId,
        actor: Option<ActorId>,
        location_id: &comanda_orders::LocationId,
        request: &CheckoutRequest,
        merged: &[CheckoutLine],
        order_id: OrderId,
    ) -> Result<Order, CommitAttemptError> {
        let now = Utc::now();

        let mut currency: Option<CurrencyCode> = None;
        let mut priced = Vec::with_capacity(merged.len());
        let mut ledger_appends = Vec::new();

        for line in merged {
            // Bulk item resolution: every id must exist and be orderable.
            let item = self
                .load_menu_item(restaurant_id, line.item_id)
                .map_err(CommitAttemptError::Fatal)?;

            // One currency per order, fixed by the owning restaurant.
            let item_currency = item.currency().cloned().ok_or_else(|| {
                CommitAttemptError::Fatal(CheckoutError::TransactionFailed(
                    "registered item has no currency".to_string(),
                ))
            })?;
            match &currency {
                None => currency = Some(item_currency),
                Some(c) if *c == item_currency => {}
                Some(_) => {
                    return Err(CommitAttemptError::Fatal(CheckoutError::Validation(
                        "order mixes items with different currencies".to_string(),
                    )));
                }
            }

            priced.push(pricing::price_line(
                line.item_id,
                item.name(),
                item.unit_price_minor(),
                item.tax_rate(),
                line.quantity,
            ));

            // Finite lines debit their ledger inside this commit; infinite
            // lines never consult it.
            if item.stock_mode() == StockMode::Finite {
                let ledger = self
                    .load_ledger(restaurant_id, line.item_id)
                    .map_err(CommitAttemptError::Fatal)?;
                let observed_version = ledger.version();

                let events = ledger
                    .handle(&StockLedgerCommand::DebitForOrder(DebitForOrder {
                        restaurant_id,
                        item_id: line.item_id,
                        order_id: order_id.0,
                        quantity: line.quantity,
                        occurred_at: now,
                    }))
                    .map_err(|e| CommitAttemptError::Fatal(CheckoutError::from_domain(e)))?;

                let ledger_id = StockLedgerId::for_item(line.item_id);
                let uncommitted = events
                    .iter()
                    .map(|ev| {
                        UncommittedEvent::from_typed(
                            restaurant_id,
                            ledger_id.0,
                            streams::STOCK_LEDGER,
                            Uuid::now_v7(),
                            ev,
                        )
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(CommitAttemptError::from_store)?;

                ledger_appends.push(StreamAppend {
                    expected_version: ExpectedVersion::Exact(observed_version),
                    events: uncommitted,
                });
            }
        }

        let currency = currency.ok_or_else(|| {
            CommitAttemptError::Fatal(CheckoutError::Validation(
                "order must contain at least one line".to_string(),
            ))
        })?;
        let totals = pricing::totals_for(&priced);

        // Decide the order events through the aggregate so its invariants
        // (non-empty lines, totals consistency) gate the commit.
        let order_shell = Order::empty(order_id);
        let order_events = order_shell
            .handle(&OrderCommand::PlaceOrder(PlaceOrder {
                restaurant_id,
                order_id,
                table_id: request.table_id,
                location_id: *location_id,
                currency,
                lines: priced,
                totals,
                notes: request.notes.clone(),
                actor,
                occurred_at: now,
            }))
            .map_err(|e| CommitAttemptError::Fatal(CheckoutError::from_domain(e)))?;

        let order_uncommitted = order_events
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    restaurant_id,
                    order_id.0,
                    streams::ORDER,
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(CommitAttemptError::from_store)?;

        let mut batches = vec![StreamAppend {
            expected_version: ExpectedVersion::Exact(0),
            events: order_uncommitted,
        }];
        batches.extend(ledger_appends);

        // 4) The transactional boundary: all streams commit together or the
        // whole checkout is rejected with no orphaned order.
        let committed = match self.store.append_multi(batches) {
            Ok(committed) => committed,
            Err(EventStoreError::Concurrency(_)) => return Err(CommitAttemptError::Conflict),
            Err(e) => {
                return Err(CommitAttemptError::Fatal(CheckoutError::TransactionFailed(
                    e.to_string(),
                )));
            }
        };

        // 5) Best-effort publication. The facts are durable; a dropped push
        // is covered by the live view's poll fallback.
        for stored in &committed {
            if let Err(e) = self.bus.publish(stored.to_envelope()) {
                tracing::warn!("event publication failed after commit: {e:?}");
            }
        }

        let mut order = Order::empty(order_id);
        for ev in &order_events {
            order.apply(ev);
        }
        Ok(order)
    }

    fn load_menu_item(
        &self,
        restaurant_id: RestaurantId,
        item_id: MenuItemId,
    ) -> Result<MenuItem, CheckoutError> {
        let history = self
            .store
            .load_stream(restaurant_id, item_id.0)
            .map_err(|e| CheckoutError::TransactionFailed(e.to_string()))?;
        if history.is_empty() {
            return Err(CheckoutError::NotFound(format!("menu item {item_id}")));
        }

        let mut item = MenuItem::empty(item_id);
        apply_history::<MenuItem>(&mut item, &history).map_err(CheckoutError::from_dispatch)?;

        if !item.can_be_ordered() {
            return Err(CheckoutError::NotFound(format!(
                "menu item {item_id} is retired"
            )));
        }

        Ok(item)
    }

    fn load_ledger(
        &self,
        restaurant_id: RestaurantId,
        item_id: MenuItemId,
    ) -> Result<StockLedger, CheckoutError> {
        let ledger_id = StockLedgerId::for_item(item_id);
        let history = self
            .store
            .load_stream(restaurant_id, ledger_id.0)
            .map_err(|e| CheckoutError::TransactionFailed(e.to_string()))?;

        let mut ledger = StockLedger::empty(ledger_id);
        apply_history::<StockLedger>(&mut ledger, &history)
            .map_err(CheckoutError::from_dispatch)?;
        debug_assert_eq!(ledger.version(), stream_version(&history));
        Ok(ledger)
    }
}

/// Internal outcome of one commit attempt.
enum CommitAttemptError {
    /// Optimistic check lost a race; re-read and re-decide.
    Conflict,
    Fatal(CheckoutError),
}

impl CommitAttemptError {
    fn from_store(err: EventStoreError) -> Self {
        match err {
            EventStoreError::Concurrency(_) => CommitAttemptError::Conflict,
            other => CommitAttemptError::Fatal(CheckoutError::TransactionFailed(other.to_string())),
        }
    }
}

/// Validate quantities and merge duplicate item ids (summing quantities),
/// preserving first-seen order.
fn merge_lines(lines: &[CheckoutLine]) -> Result<Vec<CheckoutLine>, CheckoutError> {
    if lines.is_empty() {
        return Err(CheckoutError::Validation(
            "order must contain at least one line".to_string(),
        ));
    }

    let mut merged: Vec<CheckoutLine> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.quantity == 0 {
            return Err(CheckoutError::Validation(format!(
                "quantity for item {} must be at least 1",
                line.item_id
            )));
        }
        match merged.iter_mut().find(|m| m.item_id == line.item_id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
            None => merged.push(line.clone()),
        }
    }
    Ok(merged)
}
