use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::round_amount;
use crate::core::InvoiceLine;

/// Computed amounts of one invoice line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineAmounts {
    /// `price / base_quantity × quantity`, the basis of line-level percentages.
    pub net_before_adjustments: Decimal,
    /// BT-136: emitted amount of each line allowance, in line order.
    pub allowances: Vec<Decimal>,
    /// BT-141: emitted amount of each line charge, in line order.
    pub charges: Vec<Decimal>,
    /// BT-131: line net amount after the line's own allowances and charges.
    pub net_amount: Decimal,
}

/// Compute a line's net amount before and after its own allowances/charges.
///
/// The net is derived from the unrounded item amounts and rounded once;
/// the per-item amounts are rounded independently for emission.
pub fn calculate_line(line: &InvoiceLine) -> LineAmounts {
    let basis = line.price * line.quantity / line.effective_base_quantity();

    let allowances: Vec<Decimal> = line
        .allowances
        .iter()
        .map(|a| a.effective_amount(basis))
        .collect();
    let charges: Vec<Decimal> = line
        .charges
        .iter()
        .map(|c| c.effective_amount(basis))
        .collect();

    let net = basis - allowances.iter().sum::<Decimal>() + charges.iter().sum::<Decimal>();

    LineAmounts {
        net_before_adjustments: round_amount(basis),
        allowances: allowances.into_iter().map(round_amount).collect(),
        charges: charges.into_iter().map(round_amount).collect(),
        net_amount: round_amount(net),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::*;
    use rust_decimal_macros::dec;

    fn line(quantity: Decimal, price: Decimal) -> InvoiceLineBuilder {
        InvoiceLineBuilder::new("1", "Item", quantity, "C62", price)
            .vat(TaxCategory::StandardRate, dec!(20))
    }

    #[test]
    fn plain_line() {
        let amounts = calculate_line(&line(dec!(2), dec!(10.00)).build());
        assert_eq!(amounts.net_before_adjustments, dec!(20.00));
        assert_eq!(amounts.net_amount, dec!(20.00));
        assert!(amounts.allowances.is_empty());
    }

    #[test]
    fn fixed_line_allowance() {
        let l = line(dec!(1), dec!(100.00))
            .add_allowance(AllowanceCharge::fixed(dec!(10.00)))
            .build();
        let amounts = calculate_line(&l);
        assert_eq!(amounts.allowances, vec![dec!(10.00)]);
        assert_eq!(amounts.net_amount, dec!(90.00));
    }

    #[test]
    fn percentage_items_use_pre_adjustment_net() {
        // Both percentages apply to 200.00, not to a running balance.
        let l = line(dec!(4), dec!(50))
            .add_allowance(AllowanceCharge::percentage(dec!(10)))
            .add_allowance(AllowanceCharge::percentage(dec!(5)))
            .add_charge(AllowanceCharge::percentage(dec!(2.5)))
            .build();
        let amounts = calculate_line(&l);
        assert_eq!(amounts.allowances, vec![dec!(20.00), dec!(10.00)]);
        assert_eq!(amounts.charges, vec![dec!(5.00)]);
        assert_eq!(amounts.net_amount, dec!(175.00));
    }

    #[test]
    fn base_quantity_divides_price() {
        let l = line(dec!(250), dec!(12)).base_quantity(dec!(100)).build();
        assert_eq!(calculate_line(&l).net_amount, dec!(30.00));
    }

    #[test]
    fn zero_base_quantity_counts_as_one() {
        let l = line(dec!(3), dec!(7)).base_quantity(dec!(0)).build();
        assert_eq!(calculate_line(&l).net_amount, dec!(21.00));
    }

    #[test]
    fn net_is_rounded_once() {
        // 3 × 3.333 = 9.999, minus 0.3333% → 9.96567 → 9.97
        let l = line(dec!(3), dec!(3.333))
            .add_allowance(AllowanceCharge::percentage(dec!(0.3333)))
            .build();
        let amounts = calculate_line(&l);
        assert_eq!(amounts.net_before_adjustments, dec!(10.00));
        assert_eq!(amounts.allowances, vec![dec!(0.03)]);
        assert_eq!(amounts.net_amount, dec!(9.97));
    }
}
