use std::collections::HashSet;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::error::ValidationError;
use super::types::*;
use crate::tax::{AllowanceChargeShare, TaxComputation, VatKey, round_amount};

/// Validate the structure of an invoice against EN 16931 business rules.
/// Returns all validation errors found (not just the first).
///
/// Monetary consistency is not checked here; see [`validate_arithmetic`].
pub fn validate_invoice(invoice: &Invoice) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    // BR-02: An Invoice shall have an Invoice number
    if invoice.number.trim().is_empty() {
        errors.push(ValidationError::with_rule(
            "number",
            "invoice number must not be empty",
            "BR-02",
        ));
    }

    // BR-05: An Invoice shall have an Invoice currency code
    if invoice.currency_code.trim().is_empty() {
        errors.push(ValidationError::with_rule(
            "currency_code",
            "currency code must not be empty",
            "BR-05",
        ));
    } else if invoice.currency_code.len() != 3
        || !invoice.currency_code.chars().all(|c| c.is_ascii_uppercase())
    {
        errors.push(ValidationError::with_rule(
            "currency_code",
            format!(
                "currency code '{}' must be 3 uppercase letters (ISO 4217)",
                invoice.currency_code
            ),
            "BR-05",
        ));
    }

    // BR-06 / BR-07: party names, when the parties are present
    if let Some(seller) = &invoice.seller {
        validate_party(seller, "seller", "BR-06", &mut errors);
    }
    if let Some(buyer) = &invoice.buyer {
        validate_party(buyer, "buyer", "BR-07", &mut errors);
    }

    // BR-16: An Invoice shall have at least one Invoice line
    if invoice.lines.is_empty() {
        errors.push(ValidationError::with_rule(
            "lines",
            "invoice must have at least one line",
            "BR-16",
        ));
    }

    let mut seen = HashSet::new();
    for (i, line) in invoice.lines.iter().enumerate() {
        validate_line(line, i, &mut errors);

        if !line.id.trim().is_empty() && !seen.insert(line.id.as_str()) {
            errors.push(ValidationError::new(
                format!("lines[{i}].id"),
                format!("duplicate line identifier '{}'", line.id),
            ));
        }
    }

    for (i, item) in invoice.allowances.iter().enumerate() {
        validate_adjustment(item, &format!("allowances[{i}]"), &mut errors);
    }
    for (i, item) in invoice.charges.iter().enumerate() {
        validate_adjustment(item, &format!("charges[{i}]"), &mut errors);
    }

    errors.extend(validate_ranges(invoice));

    errors
}

/// Largest magnitude of any amount, quantity or line net.
pub const MAX_AMOUNT: Decimal = dec!(1_000_000_000_000);

/// Largest magnitude of any percentage or VAT rate.
pub const MAX_PERCENT: Decimal = dec!(1_000);

/// Check that every number stays within [`MAX_AMOUNT`] and [`MAX_PERCENT`].
///
/// The tax engine has no error path; an invoice that passes this check
/// can be computed without decimal overflow. The net before adjustments
/// of each line (`price × quantity / base quantity`) is bounded too, so a
/// tiny base quantity cannot blow up an otherwise small price.
pub fn validate_ranges(invoice: &Invoice) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for (i, line) in invoice.lines.iter().enumerate() {
        let prefix = format!("lines[{i}]");
        check_amount(&mut errors, &format!("{prefix}.price"), line.price);
        check_amount(&mut errors, &format!("{prefix}.quantity"), line.quantity);
        if let Some(base) = line.base_quantity {
            check_amount(&mut errors, &format!("{prefix}.base_quantity"), base);
        }
        check_percent(&mut errors, &format!("{prefix}.vat_rate"), line.vat_rate);

        let basis = line
            .price
            .checked_mul(line.quantity)
            .and_then(|v| v.checked_div(line.effective_base_quantity()));
        match basis {
            Some(basis) if basis.abs() <= MAX_AMOUNT => {}
            _ => errors.push(ValidationError::new(
                format!("{prefix}.net_amount"),
                format!("price × quantity / base quantity exceeds {MAX_AMOUNT}"),
            )),
        }

        for (j, item) in line.allowances.iter().enumerate() {
            check_adjustment_range(&mut errors, &format!("{prefix}.allowances[{j}]"), item);
        }
        for (j, item) in line.charges.iter().enumerate() {
            check_adjustment_range(&mut errors, &format!("{prefix}.charges[{j}]"), item);
        }
    }

    for (i, item) in invoice.allowances.iter().enumerate() {
        check_adjustment_range(&mut errors, &format!("allowances[{i}]"), item);
    }
    for (i, item) in invoice.charges.iter().enumerate() {
        check_adjustment_range(&mut errors, &format!("charges[{i}]"), item);
    }

    if let Some(paid) = invoice.prepaid_amount {
        check_amount(&mut errors, "prepaid_amount", paid);
    }
    if let Some(rounding) = invoice.rounding_amount {
        check_amount(&mut errors, "rounding_amount", rounding);
    }

    errors
}

/// Validate the arithmetic of a computation derived from `invoice`.
///
/// Checks the document-level identities BR-CO-10 to BR-CO-16, the per-bucket
/// tax of BR-CO-17, and that the shares of every fixed-amount header item add
/// up to the rounded item amount.
pub fn validate_arithmetic(invoice: &Invoice, computation: &TaxComputation) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let totals = &computation.totals;

    if computation.lines.len() != invoice.lines.len() {
        errors.push(ValidationError::new(
            "lines",
            format!(
                "computation has {} lines, invoice has {}",
                computation.lines.len(),
                invoice.lines.len()
            ),
        ));
    }

    // BR-CO-10: Sum of Invoice line net amount
    let expected_line_total: Decimal = computation.lines.iter().map(|l| l.net_amount).sum();
    check(
        &mut errors,
        "totals.line_total",
        "BR-CO-10",
        totals.line_total,
        expected_line_total,
        "sum of line net amounts",
    );

    // BR-CO-11: Sum of allowances on document level
    let expected_allowances: Decimal = computation.allowances.iter().map(|s| s.amount).sum();
    check(
        &mut errors,
        "totals.allowance_total",
        "BR-CO-11",
        totals.allowance_total,
        expected_allowances,
        "sum of document allowances",
    );

    // BR-CO-12: Sum of charges on document level
    let expected_charges: Decimal = computation.charges.iter().map(|s| s.amount).sum();
    check(
        &mut errors,
        "totals.charge_total",
        "BR-CO-12",
        totals.charge_total,
        expected_charges,
        "sum of document charges",
    );

    // BR-CO-13: tax basis = line total - allowances + charges
    check(
        &mut errors,
        "totals.tax_basis_total",
        "BR-CO-13",
        totals.tax_basis_total,
        totals.line_total - totals.allowance_total + totals.charge_total,
        "line total - allowances + charges",
    );

    // BR-CO-14: VAT total = sum of breakdown tax amounts
    let breakdown_vat_total: Decimal = totals
        .vat_breakdown
        .iter()
        .filter(|b| b.rate.is_some())
        .map(|b| b.tax_amount)
        .sum();
    check(
        &mut errors,
        "totals.vat_total",
        "BR-CO-14",
        totals.vat_total,
        breakdown_vat_total,
        "sum of breakdown tax amounts",
    );

    // BR-CO-15: grand total = tax basis + VAT
    check(
        &mut errors,
        "totals.grand_total",
        "BR-CO-15",
        totals.grand_total,
        totals.tax_basis_total + totals.vat_total,
        "tax basis + VAT total",
    );

    // BR-CO-16: amount due = grand total (no prepaid amount)
    check(
        &mut errors,
        "totals.payable_amount",
        "BR-CO-16",
        totals.payable_amount,
        totals.grand_total,
        "grand total",
    );

    // BR-CO-17: tax per bucket = taxable × rate / 100, rounded
    for (i, bucket) in totals.vat_breakdown.iter().enumerate() {
        let expected = match bucket.rate {
            Some(rate) => round_amount(bucket.taxable_amount * rate / Decimal::ONE_HUNDRED),
            None => Decimal::ZERO,
        };
        check(
            &mut errors,
            &format!("totals.vat_breakdown[{i}].tax_amount"),
            "BR-CO-17",
            bucket.tax_amount,
            expected,
            "taxable amount × rate",
        );
    }

    check_reconstitution(&invoice.allowances, &computation.allowances, "allowances", &mut errors);
    check_reconstitution(&invoice.charges, &computation.charges, "charges", &mut errors);

    errors
}

/// BG-23 figures as stated by an imported document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatedVatBreakdown {
    pub category: Option<TaxCategory>,
    pub rate: Option<Decimal>,
    pub taxable_amount: Option<Decimal>,
    pub tax_amount: Option<Decimal>,
}

/// Monetary figures as stated by an imported document, before any
/// recomputation. Absent elements stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatedTotals {
    /// BT-131 per line, in line order.
    pub line_nets: Vec<Option<Decimal>>,
    pub vat_breakdown: Vec<StatedVatBreakdown>,
    pub line_total: Option<Decimal>,
    pub allowance_total: Option<Decimal>,
    pub charge_total: Option<Decimal>,
    pub tax_basis_total: Option<Decimal>,
    pub vat_total: Option<Decimal>,
    pub grand_total: Option<Decimal>,
    /// BT-113
    pub prepaid_amount: Option<Decimal>,
    /// BT-114
    pub rounding_amount: Option<Decimal>,
    /// BT-115, net of the stated prepaid and rounding amounts.
    pub payable_amount: Option<Decimal>,
}

/// Compare stated figures with a fresh computation, field by field.
///
/// Stated values that are absent are not compared. The stated amount due is
/// compared with the computed grand total less the stated prepaid amount plus
/// the stated rounding amount. Every VAT bucket must be stated exactly once
/// when any bucket is stated at all.
pub fn compare_stated_totals(
    stated: &StatedTotals,
    computation: &TaxComputation,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let totals = &computation.totals;

    if !stated.line_nets.is_empty() && stated.line_nets.len() != computation.lines.len() {
        errors.push(ValidationError::new(
            "lines",
            format!(
                "{} line amounts stated, {} lines computed",
                stated.line_nets.len(),
                computation.lines.len()
            ),
        ));
    }

    for (i, (stated_net, computed)) in stated.line_nets.iter().zip(&computation.lines).enumerate() {
        compare(
            &mut errors,
            &format!("lines[{i}].net_amount"),
            *stated_net,
            computed.net_amount,
        );
    }

    let amount_due = round_amount(
        totals.payable_amount - round_amount(stated.prepaid_amount.unwrap_or_default())
            + round_amount(stated.rounding_amount.unwrap_or_default()),
    );

    let document = [
        ("line_total", stated.line_total, totals.line_total),
        ("allowance_total", stated.allowance_total, totals.allowance_total),
        ("charge_total", stated.charge_total, totals.charge_total),
        ("tax_basis_total", stated.tax_basis_total, totals.tax_basis_total),
        ("vat_total", stated.vat_total, totals.vat_total),
        ("grand_total", stated.grand_total, totals.grand_total),
        ("payable_amount", stated.payable_amount, amount_due),
    ];
    for (field, stated_value, computed) in document {
        compare(&mut errors, &format!("totals.{field}"), stated_value, computed);
    }

    if stated.vat_breakdown.is_empty() {
        return errors;
    }

    for (i, stated_bucket) in stated.vat_breakdown.iter().enumerate() {
        let key = VatKey {
            category: stated_bucket.category,
            rate: stated_bucket.rate,
        };
        let prefix = format!("vat_breakdown[{i}]");
        match totals.vat_breakdown.iter().find(|b| b.key() == key) {
            Some(bucket) => {
                compare(
                    &mut errors,
                    &format!("{prefix}.taxable_amount"),
                    stated_bucket.taxable_amount,
                    bucket.taxable_amount,
                );
                compare(
                    &mut errors,
                    &format!("{prefix}.tax_amount"),
                    stated_bucket.tax_amount,
                    bucket.tax_amount,
                );
            }
            None => errors.push(ValidationError::with_rule(
                prefix,
                format!("stated VAT bucket {} has no lines", describe(key)),
                "BR-CO-18",
            )),
        }
    }

    for bucket in &totals.vat_breakdown {
        let key = bucket.key();
        let count = stated
            .vat_breakdown
            .iter()
            .filter(|s| s.category == key.category && s.rate == key.rate)
            .count();
        if count != 1 {
            errors.push(ValidationError::with_rule(
                "vat_breakdown",
                format!("VAT bucket {} is stated {count} times", describe(key)),
                "BR-CO-18",
            ));
        }
    }

    errors
}

fn validate_party(party: &Party, prefix: &str, rule: &str, errors: &mut Vec<ValidationError>) {
    if party.name.trim().is_empty() {
        errors.push(ValidationError::with_rule(
            format!("{prefix}.name"),
            "name must not be empty",
            rule,
        ));
    }
}

fn validate_line(line: &InvoiceLine, index: usize, errors: &mut Vec<ValidationError>) {
    let prefix = format!("lines[{index}]");

    if line.id.trim().is_empty() {
        errors.push(ValidationError::with_rule(
            format!("{prefix}.id"),
            "line identifier must not be empty",
            "BR-21",
        ));
    }

    if line.name.trim().is_empty() {
        errors.push(ValidationError::with_rule(
            format!("{prefix}.name"),
            "item name must not be empty",
            "BR-25",
        ));
    }

    if line.vat_rate.is_some_and(|r| r.is_sign_negative()) {
        errors.push(ValidationError::new(
            format!("{prefix}.vat_rate"),
            "line VAT rate (BT-152) must not be negative",
        ));
    }

    if line.vat_rate.is_some() && line.vat_category.is_none() {
        errors.push(ValidationError::with_rule(
            format!("{prefix}.vat_category"),
            "a line with a VAT rate must have a VAT category code",
            "BR-CO-04",
        ));
    }

    for (i, item) in line.allowances.iter().enumerate() {
        validate_adjustment(item, &format!("{prefix}.allowances[{i}]"), errors);
    }
    for (i, item) in line.charges.iter().enumerate() {
        validate_adjustment(item, &format!("{prefix}.charges[{i}]"), errors);
    }
}

fn validate_adjustment(item: &AllowanceCharge, prefix: &str, errors: &mut Vec<ValidationError>) {
    let negative = match item.amount {
        AdjustmentAmount::Percentage(p) => p.is_sign_negative(),
        AdjustmentAmount::Fixed(a) => a.is_sign_negative(),
    };
    if negative {
        errors.push(ValidationError::new(
            format!("{prefix}.amount"),
            "allowance or charge amount must not be negative",
        ));
    }

    if item.vat_rate.is_some_and(|r| r.is_sign_negative()) {
        errors.push(ValidationError::new(
            format!("{prefix}.vat_rate"),
            "VAT rate must not be negative",
        ));
    }
}

fn check_amount(errors: &mut Vec<ValidationError>, field: &str, value: Decimal) {
    if value.abs() > MAX_AMOUNT {
        errors.push(ValidationError::new(
            field,
            format!("{value} exceeds {MAX_AMOUNT} in magnitude"),
        ));
    }
}

fn check_percent(errors: &mut Vec<ValidationError>, field: &str, value: Option<Decimal>) {
    if let Some(value) = value.filter(|v| v.abs() > MAX_PERCENT) {
        errors.push(ValidationError::new(
            field,
            format!("{value}% exceeds {MAX_PERCENT}%"),
        ));
    }
}

fn check_adjustment_range(errors: &mut Vec<ValidationError>, prefix: &str, item: &AllowanceCharge) {
    match item.amount {
        AdjustmentAmount::Percentage(p) => check_percent(errors, &format!("{prefix}.amount"), Some(p)),
        AdjustmentAmount::Fixed(a) => check_amount(errors, &format!("{prefix}.amount"), a),
    }
    check_percent(errors, &format!("{prefix}.vat_rate"), item.vat_rate);
}

fn check_reconstitution(
    items: &[AllowanceCharge],
    shares: &[AllowanceChargeShare],
    field: &str,
    errors: &mut Vec<ValidationError>,
) {
    for (i, item) in items.iter().enumerate() {
        let AdjustmentAmount::Fixed(fixed) = item.amount else {
            continue;
        };
        let emitted: Decimal = shares.iter().filter(|s| s.source == i).map(|s| s.amount).sum();
        if emitted != round_amount(fixed) {
            errors.push(ValidationError::new(
                format!("{field}[{i}]"),
                format!(
                    "emitted shares {} do not reconstitute the amount {}",
                    emitted,
                    round_amount(fixed)
                ),
            ));
        }
    }
}

fn check(
    errors: &mut Vec<ValidationError>,
    field: &str,
    rule: &str,
    actual: Decimal,
    expected: Decimal,
    what: &str,
) {
    if actual != expected {
        errors.push(ValidationError::with_rule(
            field,
            format!("{actual} does not match {what} {expected}"),
            rule,
        ));
    }
}

fn compare(
    errors: &mut Vec<ValidationError>,
    field: &str,
    stated: Option<Decimal>,
    computed: Decimal,
) {
    match stated {
        Some(stated) if stated != computed => errors.push(ValidationError::new(
            field,
            format!("stated {stated}, computed {computed}"),
        )),
        _ => {}
    }
}

fn describe(key: VatKey) -> String {
    let category = key.category.map_or("-", |c| c.code());
    match key.rate {
        Some(rate) => format!("{category} {rate}%"),
        None => category.to_string(),
    }
}
