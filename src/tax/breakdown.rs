use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::{LineAmounts, round_amount};
use crate::core::{InvoiceLine, TaxCategory};

/// Identity of a VAT bucket: (category, rate).
///
/// Rates compare by value, so `20` and `20.00` name the same bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VatKey {
    pub category: Option<TaxCategory>,
    pub rate: Option<Decimal>,
}

/// BG-23: VAT breakdown per category/rate combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VatBreakdown {
    /// BT-118: VAT category.
    pub category: Option<TaxCategory>,
    /// BT-119: VAT rate. `None` marks an exempt/unclassified bucket, which
    /// never takes part in proration or in the VAT total.
    pub rate: Option<Decimal>,
    /// BT-116: Taxable amount.
    pub taxable_amount: Decimal,
    /// BT-117: Tax amount.
    pub tax_amount: Decimal,
}

impl VatBreakdown {
    pub fn key(&self) -> VatKey {
        VatKey {
            category: self.category,
            rate: self.rate,
        }
    }

    /// Whether header-level items may be prorated onto this bucket.
    pub fn is_prorable(&self) -> bool {
        self.rate.is_some() && self.taxable_amount > Decimal::ZERO
    }
}

/// `round(taxable × rate / 100)`, zero for a bucket without rate.
pub(crate) fn tax_amount(taxable: Decimal, rate: Option<Decimal>) -> Decimal {
    match rate {
        Some(rate) => round_amount(taxable * rate / dec!(100)),
        None => round_amount(Decimal::ZERO),
    }
}

/// Group line nets into VAT buckets keyed by (category, rate).
///
/// Buckets come out in first-seen order; that order is the iteration
/// order used by proration.
pub fn aggregate<'a, I>(lines: I) -> Vec<VatBreakdown>
where
    I: IntoIterator<Item = (&'a InvoiceLine, &'a LineAmounts)>,
{
    let mut buckets: Vec<VatBreakdown> = Vec::new();

    for (line, amounts) in lines {
        let key = VatKey {
            category: line.vat_category,
            rate: line.vat_rate,
        };
        match buckets.iter_mut().find(|b| b.key() == key) {
            Some(bucket) => bucket.taxable_amount += amounts.net_amount,
            None => buckets.push(VatBreakdown {
                category: key.category,
                rate: key.rate,
                taxable_amount: amounts.net_amount,
                tax_amount: Decimal::ZERO,
            }),
        }
    }

    for bucket in &mut buckets {
        bucket.tax_amount = tax_amount(bucket.taxable_amount, bucket.rate);
    }

    buckets
}
