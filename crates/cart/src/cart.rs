use serde::{Deserialize, Serialize};

use comanda_core::{TaxRate, line_net_minor, line_tax_minor};
use comanda_menu::MenuItemId;

/// Price/name snapshot taken from the menu at add-time.
///
/// Later menu repricings do not touch carts already holding the item; the
/// order coordinator re-reads the menu at commit time anyway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub item_id: MenuItemId,
    pub name: String,
    pub unit_price_minor: i64,
    pub tax_rate: TaxRate,
}

/// One cart line, keyed by item id within its cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub item_id: MenuItemId,
    pub name_snapshot: String,
    pub unit_price_minor: i64,
    pub tax_rate: TaxRate,
    pub quantity: u32,
    pub note: Option<String>,
}

impl CartLine {
    pub fn net_minor(&self) -> i64 {
        line_net_minor(self.unit_price_minor, self.quantity)
    }

    pub fn tax_minor(&self) -> i64 {
        line_tax_minor(self.net_minor(), self.tax_rate)
    }
}

/// Computed cart totals (minor units).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartTotals {
    pub subtotal_minor: i64,
    pub tax_minor: i64,
    pub total_minor: i64,
}

/// A session-scoped cart.
///
/// Mutated synchronously by one caller at a time (single session, no
/// concurrent writers); serialization is the snapshot/restore contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Add `quantity` of an item; merges into an existing line for the same
    /// item. Adding zero is a no-op.
    pub fn add_line(&mut self, snapshot: ItemSnapshot, quantity: u32) {
        if quantity == 0 {
            return;
        }

        if let Some(line) = self.lines.iter_mut().find(|l| l.item_id == snapshot.item_id) {
            line.quantity = line.quantity.saturating_add(quantity);
            return;
        }

        self.lines.push(CartLine {
            item_id: snapshot.item_id,
            name_snapshot: snapshot.name,
            unit_price_minor: snapshot.unit_price_minor,
            tax_rate: snapshot.tax_rate,
            quantity,
            note: None,
        });
    }

    /// Remove a line; absent ids are a no-op.
    pub fn remove_line(&mut self, item_id: MenuItemId) {
        self.lines.retain(|l| l.item_id != item_id);
    }

    /// Set a line's quantity; zero or negative removes the line, absent ids
    /// are a no-op.
    pub fn set_quantity(&mut self, item_id: MenuItemId, quantity: i64) {
        if quantity <= 0 {
            self.remove_line(item_id);
            return;
        }

        let clamped = u32::try_from(quantity).unwrap_or(u32::MAX);
        if let Some(line) = self.lines.iter_mut().find(|l| l.item_id == item_id) {
            line.quantity = clamped;
        }
    }

    /// Attach a note to a line; absent ids are a no-op.
    pub fn set_note(&mut self, item_id: MenuItemId, note: impl Into<String>) {
        if let Some(line) = self.lines.iter_mut().find(|l| l.item_id == item_id) {
            let note = note.into();
            line.note = if note.is_empty() { None } else { Some(note) };
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Σ(unit_price × quantity) over all lines.
    pub fn subtotal_minor(&self) -> i64 {
        self.lines.iter().map(CartLine::net_minor).sum()
    }

    /// Tax computed **per line** and then summed, so lines with different
    /// rates never accumulate rounding drift.
    pub fn tax_minor(&self) -> i64 {
        self.lines.iter().map(CartLine::tax_minor).sum()
    }

    pub fn total_minor(&self) -> i64 {
        self.subtotal_minor() + self.tax_minor()
    }

    pub fn totals(&self) -> CartTotals {
        CartTotals {
            subtotal_minor: self.subtotal_minor(),
            tax_minor: self.tax_minor(),
            total_minor: self.total_minor(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use comanda_core::AggregateId;
    use proptest::prelude::*;

    fn snapshot(unit_price_minor: i64, tax_percent: u32) -> ItemSnapshot {
        ItemSnapshot {
            item_id: MenuItemId::new(AggregateId::new()),
            name: format!("item@{unit_price_minor}"),
            unit_price_minor,
            tax_rate: TaxRate::from_percent(tax_percent).unwrap(),
        }
    }

    #[test]
    fn worked_example_totals() {
        // [{1000 × 2 @ 10%}, {500 × 1 @ 0%}] -> 2500 / 200 / 2700
        let mut cart = Cart::new();
        cart.add_line(snapshot(1000, 10), 2);
        cart.add_line(snapshot(500, 0), 1);

        assert_eq!(cart.subtotal_minor(), 2500);
        assert_eq!(cart.tax_minor(), 200);
        assert_eq!(cart.total_minor(), 2700);
    }

    #[test]
    fn add_merges_lines_for_the_same_item() {
        let snap = snapshot(300, 10);
        let mut cart = Cart::new();
        cart.add_line(snap.clone(), 1);
        cart.add_line(snap.clone(), 2);

        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity, 3);
    }

    #[test]
    fn add_zero_is_a_no_op() {
        let mut cart = Cart::new();
        cart.add_line(snapshot(300, 10), 0);
        assert!(cart.is_empty());
    }

    #[test]
    fn remove_absent_line_is_a_no_op() {
        let mut cart = Cart::new();
        cart.add_line(snapshot(300, 10), 1);
        cart.remove_line(MenuItemId::new(AggregateId::new()));
        assert_eq!(cart.lines().len(), 1);
    }

    #[test]
    fn non_positive_quantity_removes_the_line() {
        let snap = snapshot(300, 10);
        let item_id = snap.item_id;
        let mut cart = Cart::new();
        cart.add_line(snap, 2);

        cart.set_quantity(item_id, 0);
        assert!(cart.is_empty());

        let snap = snapshot(300, 10);
        let item_id = snap.item_id;
        cart.add_line(snap, 2);
        cart.set_quantity(item_id, -4);
        assert!(cart.is_empty());
    }

    #[test]
    fn notes_attach_and_clear() {
        let snap = snapshot(300, 10);
        let item_id = snap.item_id;
        let mut cart = Cart::new();
        cart.add_line(snap, 1);

        cart.set_note(item_id, "no onions");
        assert_eq!(cart.lines()[0].note.as_deref(), Some("no onions"));

        cart.set_note(item_id, "");
        assert_eq!(cart.lines()[0].note, None);

        // Absent id: no-op, no panic.
        cart.set_note(MenuItemId::new(AggregateId::new()), "x");
    }

    #[test]
    fn snapshot_round_trips_through_serde() {
        let mut cart = Cart::new();
        cart.add_line(snapshot(1000, 10), 2);
        cart.add_line(snapshot(500, 0), 1);
        let item_id = cart.lines()[0].item_id;
        cart.set_note(item_id, "rare");

        let json = serde_json::to_string(&cart).unwrap();
        let restored: Cart = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, cart);
        assert_eq!(restored.totals(), cart.totals());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add { item: usize, qty: u32 },
        Remove { item: usize },
        SetQuantity { item: usize, qty: i64 },
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..4, 0u32..6).prop_map(|(item, qty)| Op::Add { item, qty }),
            (0usize..4).prop_map(|item| Op::Remove { item }),
            (0usize..4, -3i64..8).prop_map(|(item, qty)| Op::SetQuantity { item, qty }),
        ]
    }

    proptest! {
        #[test]
        fn totals_algebra_holds_for_all_op_sequences(
            ops in prop::collection::vec(op_strategy(), 0..48)
        ) {
            let pool = [
                snapshot(1000, 10),
                snapshot(500, 0),
                snapshot(333, 21),
                snapshot(799, 7),
            ];

            let mut cart = Cart::new();
            for op in ops {
                match op {
                    Op::Add { item, qty } => cart.add_line(pool[item].clone(), qty),
                    Op::Remove { item } => cart.remove_line(pool[item].item_id),
                    Op::SetQuantity { item, qty } => cart.set_quantity(pool[item].item_id, qty),
                }
            }

            let expected_subtotal: i64 = cart
                .lines()
                .iter()
                .map(|l| l.unit_price_minor * i64::from(l.quantity))
                .sum();

            prop_assert_eq!(cart.subtotal_minor(), expected_subtotal);
            prop_assert_eq!(cart.total_minor(), cart.subtotal_minor() + cart.tax_minor());
            for line in cart.lines() {
                prop_assert!(line.quantity >= 1);
            }
        }
    }
}
