//! Stock level read model (derived balances per item).

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use thiserror::Error;

use comanda_core::{AggregateId, RestaurantId};
use comanda_events::EventEnvelope;
use comanda_inventory::{StockLedgerEvent, StockLedgerId};
use comanda_menu::MenuItemId;

use crate::read_model::RestaurantStore;

/// Queryable stock level for one item.
///
/// A convenience view only — the authoritative balance is always re-derived
/// from the ledger stream at commit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLevelRow {
    pub item_id: MenuItemId,
    pub quantity: i64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    restaurant_id: RestaurantId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Error)]
pub enum StockLevelsProjectionError {
    #[error("failed to deserialize ledger event: {0}")]
    Deserialize(String),

    #[error("restaurant scope violation: {0}")]
    ScopeIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Stock levels projection over ledger adjustment envelopes.
#[derive(Debug)]
pub struct StockLevelsProjection<S>
where
    S: RestaurantStore<MenuItemId, StockLevelRow>,
{
    store: S,
    cursors: RwLock<HashMap<CursorKey, u64>>,
}

impl<S> StockLevelsProjection<S>
where
    S: RestaurantStore<MenuItemId, StockLevelRow>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, restaurant_id: RestaurantId, item_id: &MenuItemId) -> Option<StockLevelRow> {
        self.store.get(restaurant_id, item_id)
    }

    pub fn list(&self, restaurant_id: RestaurantId) -> Vec<StockLevelRow> {
        self.store.list(restaurant_id)
    }

    /// Apply a published envelope into the projection (idempotent for
    /// at-least-once delivery).
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), StockLevelsProjectionError> {
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
                return Err(StockLevelsProjectionError::NonMonotonicSequence { last, found: seq });
            }

            if seq <= last {
                return Ok(());
            }

            if seq != last + 1 && last != 0 {
                return Err(StockLevelsProjectionError::NonMonotonicSequence { last, found: seq });
            }

            let StockLedgerEvent::StockAdjusted(e) =
                serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| StockLevelsProjectionError::Deserialize(e.to_string()))?;

            if e.restaurant_id != restaurant_id {
                return Err(StockLevelsProjectionError::ScopeIsolation(
                    "event restaurant_id does not match envelope restaurant_id".to_string(),
                ));
            }
            if StockLedgerId::for_item(e.item_id).0 != aggregate_id {
                return Err(StockLevelsProjectionError::ScopeIsolation(
                    "event item_id does not match envelope aggregate_id".to_string(),
                ));
            }

            let mut row = self
                .store
                .get(restaurant_id, &e.item_id)
                .unwrap_or(StockLevelRow {
                    item_id: e.item_id,
                    quantity: 0,
                });
            row.quantity += e.kind.sign() * i64::from(e.quantity);
            self.store.upsert(restaurant_id, e.item_id, row);

            cursors.insert(key, seq);
        }

        Ok(())
    }
}
