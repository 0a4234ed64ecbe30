//! In-memory cart session store.

use std::collections::HashMap;
use std::sync::RwLock;

use comanda_cart::{Cart, CartStore, SessionToken};

/// In-memory `CartStore` for dev/tests.
///
/// Carts are working state, not facts: losing this map loses nothing
/// durable, so a plain map behind a lock is enough. A cache-backed
/// implementation can replace it behind the same trait.
#[derive(Debug, Default)]
pub struct InMemoryCartStore {
    inner: RwLock<HashMap<SessionToken, Cart>>,
}

impl InMemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CartStore for InMemoryCartStore {
    fn load(&self, token: &SessionToken) -> Option<Cart> {
        self.inner.read().ok()?.get(token).cloned()
    }

    fn save(&self, token: SessionToken, cart: Cart) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(token, cart);
        }
    }

    fn remove(&self, token: &SessionToken) {
        if let Ok(mut map) = self.inner.write() {
            map.remove(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use comanda_cart::ItemSnapshot;
    use comanda_core::{AggregateId, TaxRate};
    use comanda_menu::MenuItemId;

    #[test]
    fn save_load_remove_round_trip() {
        let store = InMemoryCartStore::new();
        let token = SessionToken::new("table-7");

        let mut cart = Cart::new();
        cart.add_line(
            ItemSnapshot {
                item_id: MenuItemId::new(AggregateId::new()),
                name: "Espresso".to_string(),
                unit_price_minor: 250,
                tax_rate: TaxRate::ZERO,
            },
            2,
        );

        store.save(token.clone(), cart.clone());
        assert_eq!(store.load(&token), Some(cart));

        store.remove(&token);
        assert_eq!(store.load(&token), None);
    }
}
