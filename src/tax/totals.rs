use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::breakdown::tax_amount;
use super::{AdjustmentKind, AllowanceChargeShare, LineAmounts, VatBreakdown, round_amount};

/// BG-22: Document totals, derived from one tax computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    /// BT-106: Sum of line net amounts.
    pub line_total: Decimal,
    /// BT-107: Sum of the emitted document allowance shares.
    pub allowance_total: Decimal,
    /// BT-108: Sum of the emitted document charge shares.
    pub charge_total: Decimal,
    /// BT-109: line_total - allowance_total + charge_total.
    pub tax_basis_total: Decimal,
    /// BT-110: Sum of bucket tax amounts.
    pub vat_total: Decimal,
    /// BT-112: tax_basis_total + vat_total.
    pub grand_total: Decimal,
    /// BT-115 before any prepayment or rounding; equal to the grand total.
    /// See [`Invoice::amount_due`](crate::core::Invoice::amount_due).
    pub payable_amount: Decimal,
    /// BG-23: VAT breakdown after document-level allowances and charges.
    pub vat_breakdown: Vec<VatBreakdown>,
}

/// Apply the prorated shares to the bucket snapshot, recompute each
/// bucket's tax, and derive the document totals.
///
/// Allowance and charge totals are the sums of the given shares, so the
/// written detail records and the written totals cannot diverge. A bucket
/// pushed below zero by allowances is clamped to zero.
pub fn reconcile(
    lines: &[LineAmounts],
    buckets: &[VatBreakdown],
    allowances: &[AllowanceChargeShare],
    charges: &[AllowanceChargeShare],
) -> Totals {
    let mut vat_breakdown = buckets.to_vec();

    for share in allowances.iter().chain(charges) {
        let Some(key) = share.bucket else {
            continue;
        };
        if let Some(bucket) = vat_breakdown.iter_mut().find(|b| b.key() == key) {
            match share.kind {
                AdjustmentKind::Allowance => bucket.taxable_amount -= share.amount,
                AdjustmentKind::Charge => bucket.taxable_amount += share.amount,
            }
        }
    }

    for bucket in &mut vat_breakdown {
        bucket.taxable_amount = round_amount(bucket.taxable_amount.max(Decimal::ZERO));
        bucket.tax_amount = tax_amount(bucket.taxable_amount, bucket.rate);
    }

    let line_total = round_amount(lines.iter().map(|l| l.net_amount).sum());
    let allowance_total = round_amount(allowances.iter().map(|s| s.amount).sum());
    let charge_total = round_amount(charges.iter().map(|s| s.amount).sum());
    let tax_basis_total = round_amount(line_total - allowance_total + charge_total);
    let vat_total = round_amount(
        vat_breakdown
            .iter()
            .filter(|b| b.rate.is_some())
            .map(|b| b.tax_amount)
            .sum(),
    );
    let grand_total = round_amount(tax_basis_total + vat_total);

    Totals {
        line_total,
        allowance_total,
        charge_total,
        tax_basis_total,
        vat_total,
        grand_total,
        payable_amount: grand_total,
        vat_breakdown,
    }
}
