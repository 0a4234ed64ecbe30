//! Pure order pricing (integer minor-unit arithmetic).
//!
//! Tax is computed per line and then summed; the order's `gross` is the sum
//! of line totals, so `gross = net + tax` holds by construction.

use serde::{Deserialize, Serialize};

use comanda_core::{TaxRate, line_net_minor, line_tax_minor};
use comanda_menu::MenuItemId;

use crate::order::OrderLine;

/// Accumulated order totals (minor units).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub net_minor: i64,
    pub tax_minor: i64,
    pub gross_minor: i64,
}

/// Price one line from its snapshot inputs.
pub fn price_line(
    item_id: MenuItemId,
    name_snapshot: impl Into<String>,
    unit_price_minor: i64,
    tax_rate: TaxRate,
    quantity: u32,
) -> OrderLine {
    let net_minor = line_net_minor(unit_price_minor, quantity);
    let tax_minor = line_tax_minor(net_minor, tax_rate);

    OrderLine {
        item_id,
        name_snapshot: name_snapshot.into(),
        quantity,
        unit_price_minor,
        tax_rate,
        net_minor,
        tax_minor,
        line_total_minor: net_minor + tax_minor,
    }
}

/// Accumulate totals across priced lines.
pub fn totals_for(lines: &[OrderLine]) -> OrderTotals {
    let mut totals = OrderTotals::default();
    for line in lines {
        totals.net_minor += line.net_minor;
        totals.tax_minor += line.tax_minor;
        totals.gross_minor += line.line_total_minor;
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use comanda_core::AggregateId;

    fn item() -> MenuItemId {
        MenuItemId::new(AggregateId::new())
    }

    #[test]
    fn worked_example() {
        let lines = vec![
            price_line(item(), "a", 1000, TaxRate::from_percent(10).unwrap(), 2),
            price_line(item(), "b", 500, TaxRate::ZERO, 1),
        ];
        let totals = totals_for(&lines);

        assert_eq!(totals.net_minor, 2500);
        assert_eq!(totals.tax_minor, 200);
        assert_eq!(totals.gross_minor, 2700);
    }

    #[test]
    fn gross_equals_net_plus_tax_even_with_odd_rates() {
        let lines = vec![
            price_line(item(), "a", 333, TaxRate::from_basis_points(2150).unwrap(), 3),
            price_line(item(), "b", 799, TaxRate::from_percent(7).unwrap(), 2),
            price_line(item(), "c", 1, TaxRate::from_percent(10).unwrap(), 1),
        ];
        let totals = totals_for(&lines);
        assert_eq!(totals.gross_minor, totals.net_minor + totals.tax_minor);

        for line in &lines {
            assert_eq!(line.line_total_minor, line.net_minor + line.tax_minor);
        }
    }
}
