//! Staff-facing order board read model.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

use comanda_core::{AggregateId, CurrencyCode, RestaurantId};
use comanda_events::EventEnvelope;
use comanda_orders::{KitchenStage, OrderEvent, OrderId, OrderLine, OrderStatus, TableId};

use crate::read_model::RestaurantStore;

/// One row on the order board.
///
/// Carries both the canonical status and its derived kitchen stage so
/// consoles can render either vocabulary from the same row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBoardRow {
    pub order_id: OrderId,
    pub table_id: TableId,
    pub status: OrderStatus,
    pub kitchen_stage: KitchenStage,
    pub currency: CurrencyCode,
    pub net_minor: i64,
    pub tax_minor: i64,
    pub gross_minor: i64,
    pub lines: Vec<OrderLine>,
    pub notes: Option<String>,
    pub placed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Restaurant+aggregate cursor to support at-least-once delivery.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    restaurant_id: RestaurantId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Error)]
pub enum OrderBoardProjectionError {
    #[error("failed to deserialize order event: {0}")]
    Deserialize(String),

    #[error("restaurant scope violation: {0}")]
    ScopeIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Order board projection.
///
/// Consumes published envelopes (JSON payloads) and maintains a
/// restaurant-isolated read model. Rows are disposable and rebuildable from
/// the order streams.
#[derive(Debug)]
pub struct OrderBoardProjection<S>
where
    S: RestaurantStore<OrderId, OrderBoardRow>,
{
    store: S,
    cursors: RwLock<HashMap<CursorKey, u64>>,
}

impl<S> OrderBoardProjection<S>
where
    S: RestaurantStore<OrderId, OrderBoardRow>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    /// Query one order's row.
    pub fn get(&self, restaurant_id: RestaurantId, order_id: &OrderId) -> Option<OrderBoardRow> {
        self.store.get(restaurant_id, order_id)
    }

    /// Full board for a restaurant, most recently placed first.
    pub fn list(&self, restaurant_id: RestaurantId) -> Vec<OrderBoardRow> {
        let mut rows = self.store.list(restaurant_id);
        rows.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
        rows
    }

    /// Apply a published envelope into the projection.
    ///
    /// - Enforces restaurant isolation
    /// - Enforces monotonic sequence per (restaurant, aggregate) stream
    /// - Idempotent for at-least-once delivery (replays <= cursor are ignored)
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), OrderBoardProjectionError> {
        let restaurant_id = envelope.restaurant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if let Ok(mut cursors) = self.cursors.write() {
            let key = CursorKey {
                restaurant_id,
                aggregate_id,
            };
            let last = *cursors.get(&key).unwrap_or(&0);

            if seq == 0 {
                return Err(OrderBoardProjectionError::NonMonotonicSequence { last, found: seq });
            }

            if seq <= last {
                // Duplicate or replay; safe to ignore.
                return Ok(());
            }

            if seq != last + 1 && last != 0 {
                return Err(OrderBoardProjectionError::NonMonotonicSequence { last, found: seq });
            }

            let event: OrderEvent = serde_json::from_value(envelope.payload().clone())
                .map_err(|e| OrderBoardProjectionError::Deserialize(e.to_string()))?;

            let (event_restaurant, order_id) = match &event {
                OrderEvent::OrderPlaced(e) => (e.restaurant_id, e.order_id),
                OrderEvent::OrderStatusChanged(e) => (e.restaurant_id, e.order_id),
            };

            if event_restaurant != restaurant_id {
                return Err(OrderBoardProjectionError::ScopeIsolation(
                    "event restaurant_id does not match envelope restaurant_id".to_string(),
                ));
            }
            if order_id.0 != aggregate_id {
                return Err(OrderBoardProjectionError::ScopeIsolation(
                    "event order_id does not match envelope aggregate_id".to_string(),
                ));
            }

            match event {
                OrderEvent::OrderPlaced(e) => {
                    self.store.upsert(
                        restaurant_id,
                        e.order_id,
                        OrderBoardRow {
                            order_id: e.order_id,
                            table_id: e.table_id,
                            status: OrderStatus::Pending,
                            kitchen_stage: OrderStatus::Pending.kitchen_stage(),
                            currency: e.currency,
                            net_minor: e.net_minor,
                            tax_minor: e.tax_minor,
                            gross_minor: e.gross_minor,
                            lines: e.lines,
                            notes: e.notes,
                            placed_at: e.occurred_at,
                            updated_at: e.occurred_at,
                        },
                    );
                }
                OrderEvent::OrderStatusChanged(e) => {
                    // Monotonic cursors guarantee the placement event came
                    // first; a missing row would mean a cleared read model,
                    // which a rebuild will repopulate.
                    if let Some(mut row) = self.store.get(restaurant_id, &e.order_id) {
                        row.status = e.to;
                        row.kitchen_stage = e.to.kitchen_stage();
                        row.updated_at = e.occurred_at;
                        self.store.upsert(restaurant_id, e.order_id, row);
                    }
                }
            }

            // Advance cursor after successful apply.
            cursors.insert(key, seq);
        }

        Ok(())
    }

    /// Rebuild the read model from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), OrderBoardProjectionError> {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.clear();
        }

        let mut envs: Vec<_> = envelopes.into_iter().collect();

        // Clear read model per restaurant before rebuilding.
        {
            let mut scopes = envs.iter().map(|e| e.restaurant_id()).collect::<Vec<_>>();
            scopes.sort_by_key(|r| *r.as_uuid().as_bytes());
            scopes.dedup();
            for r in scopes {
                self.store.clear_restaurant(r);
            }
        }

        // Deterministic replay order: restaurant, aggregate, sequence.
        envs.sort_by_key(|e| {
            (
                *e.restaurant_id().as_uuid().as_bytes(),
                *e.aggregate_id().as_uuid().as_bytes(),
                e.sequence_number(),
            )
        });

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }
}
