//! Tax engine: line nets, VAT buckets, proration of document-level
//! allowances/charges, and totals reconciliation.
//!
//! The engine is a pure function of (lines, allowances, charges). It keeps
//! no state between calls: every accumulator lives on the stack of
//! [`compute`], so concurrent computations never interfere and the same
//! input always yields the same [`TaxComputation`].
//!
//! ```text
//! lines ──► calculate_line ──► aggregate ──► prorate (per header item) ──► reconcile
//!            (LineAmounts)     (buckets)     (AllowanceChargeShare)        (Totals)
//! ```
//!
//! Every emitted amount carries exactly two decimals, rounded half-up
//! once, where it is produced.

mod breakdown;
mod line;
mod proration;
mod totals;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::core::{AllowanceCharge, Invoice, InvoiceLine};

pub use breakdown::{VatBreakdown, VatKey, aggregate};
pub use line::{LineAmounts, calculate_line};
pub use proration::{AdjustmentKind, AllowanceChargeShare, prorate};
pub use totals::{Totals, reconcile};

/// Round to 2 decimal places, half-up (commercial rounding), and fix the
/// scale to exactly 2 so that `7` is emitted as `7.00`.
pub fn round_amount(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Everything a writer needs to serialize the monetary part of an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxComputation {
    /// Per-line amounts, in line order.
    pub lines: Vec<LineAmounts>,
    /// VAT buckets before any document-level allowance or charge.
    pub line_breakdown: Vec<VatBreakdown>,
    /// Emitted per-bucket shares of every document-level allowance.
    pub allowances: Vec<AllowanceChargeShare>,
    /// Emitted per-bucket shares of every document-level charge.
    pub charges: Vec<AllowanceChargeShare>,
    /// Document totals and the post-proration VAT breakdown.
    pub totals: Totals,
}

/// Run the full pipeline over one invoice's monetary content.
///
/// Each header item is prorated against the same pre-adjustment bucket
/// snapshot; their shares are then summed onto the buckets together.
pub fn compute(
    lines: &[InvoiceLine],
    allowances: &[AllowanceCharge],
    charges: &[AllowanceCharge],
) -> TaxComputation {
    let line_amounts: Vec<LineAmounts> = lines.iter().map(calculate_line).collect();
    let line_breakdown = aggregate(lines.iter().zip(&line_amounts));

    let allowance_shares: Vec<AllowanceChargeShare> = allowances
        .iter()
        .enumerate()
        .flat_map(|(i, item)| prorate(item, AdjustmentKind::Allowance, i, &line_breakdown))
        .collect();
    let charge_shares: Vec<AllowanceChargeShare> = charges
        .iter()
        .enumerate()
        .flat_map(|(i, item)| prorate(item, AdjustmentKind::Charge, i, &line_breakdown))
        .collect();

    let totals = reconcile(
        &line_amounts,
        &line_breakdown,
        &allowance_shares,
        &charge_shares,
    );

    tracing::debug!(
        lines = lines.len(),
        buckets = line_breakdown.len(),
        allowances = allowances.len(),
        charges = charges.len(),
        grand_total = %totals.grand_total,
        "tax computation finished"
    );

    TaxComputation {
        lines: line_amounts,
        line_breakdown,
        allowances: allowance_shares,
        charges: charge_shares,
        totals,
    }
}

impl Invoice {
    /// Derive line amounts, VAT breakdown and totals for this invoice.
    ///
    /// Invoices from [`InvoiceBuilder::build`](crate::core::InvoiceBuilder::build)
    /// are always within [`validate_ranges`](crate::core::validate_ranges).
    /// Outside those limits the decimal arithmetic can overflow.
    pub fn compute_tax(&self) -> TaxComputation {
        compute(&self.lines, &self.allowances, &self.charges)
    }

    /// BT-115 as written on the document: the payable amount less the
    /// prepaid amount (BT-113) plus the rounding amount (BT-114), each
    /// taken to the cent first.
    pub fn amount_due(&self, totals: &Totals) -> Decimal {
        let prepaid = round_amount(self.prepaid_amount.unwrap_or_default());
        let rounding = round_amount(self.rounding_amount.unwrap_or_default());
        round_amount(totals.payable_amount - prepaid + rounding)
    }
}
