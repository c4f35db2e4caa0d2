use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{VatBreakdown, VatKey, round_amount};
use crate::core::{AdjustmentAmount, AllowanceCharge, TaxCategory};

/// Whether a document-level item lowers (allowance) or raises (charge) the
/// taxable amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdjustmentKind {
    Allowance,
    Charge,
}

impl AdjustmentKind {
    pub fn is_charge(&self) -> bool {
        matches!(self, Self::Charge)
    }
}

/// One emitted record of a document-level allowance or charge: the part of
/// the item that lands on a single VAT bucket.
///
/// A writer serializes each share as its own BG-20/BG-21 entry. The
/// document allowance/charge totals are the sums of these amounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllowanceChargeShare {
    pub kind: AdjustmentKind,
    /// Index of the originating item in the invoice's allowance or charge list.
    pub source: usize,
    /// Bucket this share adjusts. `None` for an unsplit fallback record.
    pub bucket: Option<VatKey>,
    /// BT-95/BT-102: VAT category written on the record.
    pub vat_category: Option<TaxCategory>,
    /// BT-96/BT-103: VAT rate written on the record.
    pub vat_rate: Option<Decimal>,
    /// BT-94/BT-101: percentage, for percentage items.
    pub percent: Option<Decimal>,
    /// BT-93/BT-100: basis the percentage was applied to.
    pub basis_amount: Option<Decimal>,
    /// BT-92/BT-99: emitted amount.
    pub amount: Decimal,
    pub reason_code: Option<String>,
    pub reason: Option<String>,
}

/// Distribute one document-level item across the VAT buckets.
///
/// `buckets` is the snapshot taken before any document-level adjustment.
/// Eligible buckets have a rate and a positive taxable amount; an item that
/// pins both category and rate is only eligible for its own bucket.
///
/// - Percentage: every eligible bucket gets `round(taxable × pct / 100)`,
///   computed independently.
/// - Fixed: every eligible bucket but the last gets
///   `round(amount × (taxable / Σ taxable))`; the last gets what remains, so
///   the shares always add up to the rounded item amount.
///
/// Without any eligible bucket the item is emitted as one record attached
/// to no bucket.
pub fn prorate(
    item: &AllowanceCharge,
    kind: AdjustmentKind,
    source: usize,
    buckets: &[VatBreakdown],
) -> Vec<AllowanceChargeShare> {
    let pinned = match (item.vat_category, item.vat_rate) {
        (Some(category), Some(rate)) => Some(VatKey {
            category: Some(category),
            rate: Some(rate),
        }),
        _ => None,
    };

    let eligible: Vec<&VatBreakdown> = buckets
        .iter()
        .filter(|b| b.is_prorable())
        .filter(|b| pinned.is_none_or(|key| b.key() == key))
        .collect();
    let total: Decimal = eligible.iter().map(|b| b.taxable_amount).sum();

    if eligible.is_empty() || total <= Decimal::ZERO {
        return vec![unsplit(item, kind, source, buckets)];
    }

    let share = |bucket: &VatBreakdown, basis: Option<Decimal>, amount: Decimal| {
        AllowanceChargeShare {
            kind,
            source,
            bucket: Some(bucket.key()),
            vat_category: bucket.category,
            vat_rate: bucket.rate,
            percent: item.percent(),
            basis_amount: basis,
            amount,
            reason_code: item.reason_code.clone(),
            reason: item.reason.clone(),
        }
    };

    match item.amount {
        AdjustmentAmount::Percentage(_) => eligible
            .iter()
            .copied()
            .map(|b| {
                let amount = round_amount(item.effective_amount(b.taxable_amount));
                share(b, Some(round_amount(b.taxable_amount)), amount)
            })
            .collect(),
        AdjustmentAmount::Fixed(fixed) => {
            let fixed = round_amount(fixed);
            let last = eligible.len() - 1;
            let mut allocated = Decimal::ZERO;
            let mut shares = Vec::with_capacity(eligible.len());

            for (i, b) in eligible.iter().copied().enumerate() {
                let amount = if i < last {
                    let amount = round_amount(fixed * (b.taxable_amount / total));
                    allocated += amount;
                    amount
                } else {
                    round_amount(fixed - allocated)
                };
                shares.push(share(b, None, amount));
            }
            shares
        }
    }
}

/// Fallback record for an item with nothing to prorate onto. A percentage
/// is taken of every positive taxable amount on the invoice, or of nothing
/// at all.
fn unsplit(
    item: &AllowanceCharge,
    kind: AdjustmentKind,
    source: usize,
    buckets: &[VatBreakdown],
) -> AllowanceChargeShare {
    let available: Decimal = buckets
        .iter()
        .map(|b| b.taxable_amount)
        .filter(|t| *t > Decimal::ZERO)
        .sum();
    let basis = (available > Decimal::ZERO).then_some(available);

    let amount = match (item.amount, basis) {
        (AdjustmentAmount::Fixed(fixed), _) => fixed,
        (AdjustmentAmount::Percentage(_), Some(basis)) => item.effective_amount(basis),
        (AdjustmentAmount::Percentage(_), None) => Decimal::ZERO,
    };

    tracing::warn!(
        kind = ?kind,
        source,
        buckets = buckets.len(),
        "no eligible VAT bucket, emitting unsplit record"
    );

    AllowanceChargeShare {
        kind,
        source,
        bucket: None,
        vat_category: item.vat_category,
        vat_rate: item.vat_rate,
        percent: item.percent(),
        basis_amount: if item.is_percentage() {
            basis.map(round_amount)
        } else {
            None
        },
        amount: round_amount(amount),
        reason_code: item.reason_code.clone(),
        reason: item.reason.clone(),
    }
}
