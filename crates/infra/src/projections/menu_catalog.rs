//! Menu catalog read model.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use thiserror::Error;

use comanda_core::{AggregateId, CurrencyCode, RestaurantId, TaxRate};
use comanda_events::EventEnvelope;
use comanda_menu::{MenuItemEvent, MenuItemId, StockMode};

use crate::read_model::RestaurantStore;

/// One catalog row (what menus and carts read).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItemRow {
    pub item_id: MenuItemId,
    pub name: String,
    pub unit_price_minor: i64,
    pub tax_rate: TaxRate,
    pub currency: CurrencyCode,
    pub stock_mode: StockMode,
    pub retired: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    restaurant_id: RestaurantId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Error)]
pub enum MenuCatalogProjectionError {
    #[error("failed to deserialize menu event: {0}")]
    Deserialize(String),

    #[error("restaurant scope violation: {0}")]
    ScopeIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Menu catalog projection over menu item envelopes.
#[derive(Debug)]
pub struct MenuCatalogProjection<S>
where
    S: RestaurantStore<MenuItemId, MenuItemRow>,
{
    store: S,
    cursors: RwLock<HashMap<CursorKey, u64>>,
}

impl<S> MenuCatalogProjection<S>
where
    S: RestaurantStore<MenuItemId, MenuItemRow>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, restaurant_id: RestaurantId, item_id: &MenuItemId) -> Option<MenuItemRow> {
        self.store.get(restaurant_id, item_id)
    }

    /// Active (non-retired) catalog for a restaurant.
    pub fn list(&self, restaurant_id: RestaurantId) -> Vec<MenuItemRow> {
        let mut rows: Vec<_> = self
            .store
            .list(restaurant_id)
            .into_iter()
            .filter(|r| !r.retired)
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }

    /// Apply a published envelope into the projection (idempotent for
    /// at-least-once delivery).
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), MenuCatalogProjectionError> {
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
                return Err(MenuCatalogProjectionError::NonMonotonicSequence { last, found: seq });
            }

            if seq <= last {
                return Ok(());
            }

            if seq != last + 1 && last != 0 {
                return Err(MenuCatalogProjectionError::NonMonotonicSequence { last, found: seq });
            }

            let event: MenuItemEvent = serde_json::from_value(envelope.payload().clone())
                .map_err(|e| MenuCatalogProjectionError::Deserialize(e.to_string()))?;

            let (event_restaurant, item_id) = match &event {
                MenuItemEvent::ItemRegistered(e) => (e.restaurant_id, e.item_id),
                MenuItemEvent::ItemRepriced(e) => (e.restaurant_id, e.item_id),
                MenuItemEvent::ItemRetired(e) => (e.restaurant_id, e.item_id),
            };

            if event_restaurant != restaurant_id {
                return Err(MenuCatalogProjectionError::ScopeIsolation(
                    "event restaurant_id does not match envelope restaurant_id".to_string(),
                ));
            }
            if item_id.0 != aggregate_id {
                return Err(MenuCatalogProjectionError::ScopeIsolation(
                    "event item_id does not match envelope aggregate_id".to_string(),
                ));
            }

            match event {
                MenuItemEvent::ItemRegistered(e) => {
                    self.store.upsert(
                        restaurant_id,
                        e.item_id,
                        MenuItemRow {
                            item_id: e.item_id,
                            name: e.name,
                            unit_price_minor: e.unit_price_minor,
                            tax_rate: e.tax_rate,
                            currency: e.currency,
                            stock_mode: e.stock_mode,
                            retired: false,
                        },
                    );
                }
                MenuItemEvent::ItemRepriced(e) => {
                    if let Some(mut row) = self.store.get(restaurant_id, &e.item_id) {
                        row.unit_price_minor = e.unit_price_minor;
                        row.tax_rate = e.tax_rate;
                        self.store.upsert(restaurant_id, e.item_id, row);
                    }
                }
                MenuItemEvent::ItemRetired(e) => {
                    if let Some(mut row) = self.store.get(restaurant_id, &e.item_id) {
                        row.retired = true;
                        self.store.upsert(restaurant_id, e.item_id, row);
                    }
                }
            }

            cursors.insert(key, seq);
        }

        Ok(())
    }
}
