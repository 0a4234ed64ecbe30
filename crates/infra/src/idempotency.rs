//! Idempotency keys for order creation.
//!
//! `place_order` is not idempotent on its own; a caller that wants safe
//! retries supplies a key, and a replayed key resolves to the order the
//! first attempt created instead of double-submitting.

use std::collections::HashMap;
use std::sync::RwLock;

use comanda_core::RestaurantId;
use comanda_orders::OrderId;

/// Restaurant-scoped key → order mapping.
#[derive(Debug, Default)]
pub struct IdempotencyKeys {
    inner: RwLock<HashMap<(RestaurantId, String), OrderId>>,
}

impl IdempotencyKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, restaurant_id: RestaurantId, key: &str) -> Option<OrderId> {
        let map = self.inner.read().ok()?;
        map.get(&(restaurant_id, key.to_string())).copied()
    }

    /// Record a key for a freshly placed order. First writer wins; a
    /// concurrent duplicate keeps the original mapping.
    pub fn record(&self, restaurant_id: RestaurantId, key: String, order_id: OrderId) {
        if let Ok(mut map) = self.inner.write() {
            map.entry((restaurant_id, key)).or_insert(order_id);
        }
    }
}
