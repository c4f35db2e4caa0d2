//! Integration tests for the tax engine: the worked scenarios, header
//! proration against the pre-adjustment snapshot, and purity.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use vatsplit::core::*;
use vatsplit::tax::{self, TaxComputation};

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

fn line(id: &str, quantity: Decimal, price: Decimal, rate: Decimal) -> InvoiceLineBuilder {
    InvoiceLineBuilder::new(id, format!("Item {id}"), quantity, "C62", price)
        .vat(TaxCategory::StandardRate, rate)
}

fn amounts(shares: &[tax::AllowanceChargeShare]) -> Vec<Decimal> {
    shares.iter().map(|s| s.amount).collect()
}

#[test]
fn scenario_a_single_rate_no_adjustments() {
    let inv = InvoiceBuilder::new("A-1", date())
        .add_line(line("1", dec!(2), dec!(10.00), dec!(20)).build())
        .build()
        .unwrap();

    let totals = inv.compute_tax().totals;
    assert_eq!(totals.line_total, dec!(20.00));
    assert_eq!(totals.vat_total, dec!(4.00));
    assert_eq!(totals.grand_total, dec!(24.00));
    assert_eq!(totals.payable_amount, dec!(24.00));
    assert_eq!(totals.allowance_total, dec!(0));
    assert_eq!(totals.charge_total, dec!(0));
}

#[test]
fn scenario_b_line_level_fixed_allowance() {
    let inv = InvoiceBuilder::new("B-1", date())
        .add_line(
            line("1", dec!(1), dec!(100.00), dec!(20))
                .add_allowance(AllowanceCharge::fixed(dec!(10.00)).reason("Discount"))
                .build(),
        )
        .build()
        .unwrap();

    let c = inv.compute_tax();
    assert_eq!(c.lines[0].net_amount, dec!(90.00));
    assert_eq!(c.lines[0].allowances, vec![dec!(10.00)]);
    assert_eq!(c.totals.line_total, dec!(90.00));
    // line allowances are not document allowances
    assert_eq!(c.totals.allowance_total, dec!(0));
    assert_eq!(c.totals.vat_total, dec!(18.00));
}

#[test]
fn scenario_c_header_percentage_charge() {
    let inv = InvoiceBuilder::new("C-1", date())
        .add_line(line("1", dec!(1), dec!(90.00), dec!(20)).build())
        .add_charge(AllowanceCharge::percentage(dec!(10)).reason("Handling"))
        .build()
        .unwrap();

    let c = inv.compute_tax();
    assert_eq!(c.charges.len(), 1);
    assert_eq!(c.charges[0].amount, dec!(9.00));
    assert_eq!(c.charges[0].basis_amount, Some(dec!(90.00)));
    assert_eq!(c.totals.charge_total, dec!(9.00));
    assert_eq!(c.totals.tax_basis_total, dec!(99.00));
    assert_eq!(c.totals.vat_breakdown[0].taxable_amount, dec!(99.00));
    assert_eq!(c.totals.vat_total, dec!(19.80));
    assert_eq!(c.totals.grand_total, dec!(118.80));
}

#[test]
fn scenario_d_fixed_allowance_across_two_buckets() {
    let inv = InvoiceBuilder::new("D-1", date())
        .add_line(line("1", dec!(1), dec!(70.00), dec!(20)).build())
        .add_line(line("2", dec!(1), dec!(30.00), dec!(10)).build())
        .add_allowance(AllowanceCharge::fixed(dec!(10.00)))
        .build()
        .unwrap();

    let c = inv.compute_tax();
    assert_eq!(amounts(&c.allowances), vec![dec!(7.00), dec!(3.00)]);
    assert_eq!(amounts(&c.allowances).iter().sum::<Decimal>(), dec!(10.00));
    assert_eq!(c.totals.allowance_total, dec!(10.00));
    assert_eq!(c.totals.vat_breakdown[0].taxable_amount, dec!(63.00));
    assert_eq!(c.totals.vat_breakdown[1].taxable_amount, dec!(27.00));
}

#[test]
fn header_items_prorate_against_the_original_buckets() {
    let inv = InvoiceBuilder::new("S-1", date())
        .add_line(line("1", dec!(1), dec!(70.00), dec!(20)).build())
        .add_line(line("2", dec!(1), dec!(30.00), dec!(10)).build())
        .add_allowance(AllowanceCharge::fixed(dec!(80.00)))
        .add_allowance(AllowanceCharge::percentage(dec!(10)))
        .build()
        .unwrap();

    let c = inv.compute_tax();
    // The 10% item sees 70.00/30.00, not what the 80.00 item left over.
    let second: Vec<_> = c.allowances.iter().filter(|s| s.source == 1).collect();
    assert_eq!(second[0].basis_amount, Some(dec!(70.00)));
    assert_eq!(second[0].amount, dec!(7.00));
    assert_eq!(second[1].amount, dec!(3.00));

    // 70 - 56 - 7 = 7, 30 - 24 - 3 = 3
    let taxable: Vec<_> = c.totals.vat_breakdown.iter().map(|b| b.taxable_amount).collect();
    assert_eq!(taxable, vec![dec!(7.00), dec!(3.00)]);
    assert_eq!(c.totals.allowance_total, dec!(90.00));
    assert_eq!(c.totals.tax_basis_total, dec!(10.00));
}

#[test]
fn rates_compare_by_value() {
    let inv = InvoiceBuilder::new("R-1", date())
        .add_line(line("1", dec!(1), dec!(10), dec!(20)).build())
        .add_line(line("2", dec!(1), dec!(10), dec!(20.00)).build())
        .build()
        .unwrap();
    let c = inv.compute_tax();
    assert_eq!(c.totals.vat_breakdown.len(), 1);
    assert_eq!(c.totals.vat_breakdown[0].taxable_amount, dec!(20.00));
}

#[test]
fn exempt_only_invoice_falls_back_to_unsplit_records() {
    let inv = InvoiceBuilder::new("E-1", date())
        .add_line(
            InvoiceLineBuilder::new("1", "Training", dec!(1), "C62", dec!(200))
                .exempt(TaxCategory::Exempt)
                .build(),
        )
        .add_allowance(AllowanceCharge::fixed(dec!(20)).vat(TaxCategory::Exempt, dec!(0)))
        .add_charge(AllowanceCharge::percentage(dec!(5)))
        .build()
        .unwrap();

    let c = inv.compute_tax();
    assert_eq!(c.allowances.len(), 1);
    assert_eq!(c.allowances[0].bucket, None);
    assert_eq!(c.allowances[0].vat_category, Some(TaxCategory::Exempt));
    assert_eq!(c.allowances[0].amount, dec!(20.00));
    assert_eq!(c.charges[0].basis_amount, Some(dec!(200.00)));
    assert_eq!(c.charges[0].amount, dec!(10.00));

    // Unsplit records count in the totals but leave the bucket as is.
    assert_eq!(c.totals.vat_breakdown[0].taxable_amount, dec!(200.00));
    assert_eq!(c.totals.tax_basis_total, dec!(190.00));
    assert_eq!(c.totals.vat_total, dec!(0.00));
    assert_eq!(c.totals.grand_total, dec!(190.00));
}

#[test]
fn recomputing_is_idempotent() {
    let inv = mixed_invoice();
    let first = inv.compute_tax();
    let second = inv.compute_tax();
    assert_eq!(first, second);
    assert_eq!(first, tax::compute(&inv.lines, &inv.allowances, &inv.charges));
}

#[test]
fn concurrent_computations_do_not_interfere() {
    let inv = mixed_invoice();
    let expected = inv.compute_tax();

    let results: Vec<TaxComputation> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8).map(|_| s.spawn(|| inv.compute_tax())).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(results.iter().all(|r| *r == expected));
}

#[test]
fn computation_serializes_amounts_as_strings() {
    let c = mixed_invoice().compute_tax();
    let json = serde_json::to_value(&c.totals).unwrap();
    assert_eq!(json["grand_total"], "126.15");
    assert_eq!(json["vat_breakdown"][2]["rate"], serde_json::Value::Null);
}

fn mixed_invoice() -> Invoice {
    InvoiceBuilder::new("M-1", date())
        .add_line(line("1", dec!(1), dec!(70.00), dec!(20)).build())
        .add_line(line("2", dec!(3), dec!(10.00), dec!(10)).build())
        .add_line(
            InvoiceLineBuilder::new("3", "Stamps", dec!(1), "C62", dec!(15))
                .exempt(TaxCategory::Exempt)
                .build(),
        )
        .add_allowance(AllowanceCharge::fixed(dec!(10)).reason_code("95"))
        .add_charge(AllowanceCharge::percentage(dec!(5)).reason("Handling"))
        .build()
        .unwrap()
}

fn render(c: &TaxComputation) -> String {
    let classification = |category: Option<TaxCategory>, rate: Option<Decimal>| {
        format!(
            "{}/{}",
            category.map_or("-", |c| c.code()),
            rate.map_or("-".to_string(), |r| r.to_string())
        )
    };

    let mut out = Vec::new();
    for s in c.allowances.iter().chain(&c.charges) {
        let pct = match (s.percent, s.basis_amount) {
            (Some(p), Some(b)) => format!(" {p}% of {b}"),
            _ => String::new(),
        };
        out.push(format!(
            "{:?}[{}] {}{} = {}",
            s.kind,
            s.source,
            classification(s.vat_category, s.vat_rate),
            pct,
            s.amount
        ));
    }
    for b in &c.totals.vat_breakdown {
        out.push(format!(
            "bucket {} taxable {} tax {}",
            classification(b.category, b.rate),
            b.taxable_amount,
            b.tax_amount
        ));
    }
    let t = &c.totals;
    out.push(format!(
        "{} - {} + {} = {}; + {} = {}",
        t.line_total, t.allowance_total, t.charge_total, t.tax_basis_total, t.vat_total, t.grand_total
    ));
    out.join("\n")
}

#[test]
fn mixed_invoice_snapshot() {
    insta::assert_snapshot!(render(&mixed_invoice().compute_tax()), @r"
    Allowance[0] S/20 = 7.00
    Allowance[0] S/10 = 3.00
    Charge[0] S/20 5% of 70.00 = 3.50
    Charge[0] S/10 5% of 30.00 = 1.50
    bucket S/20 taxable 66.50 tax 13.30
    bucket S/10 taxable 28.50 tax 2.85
    bucket E/- taxable 15.00 tax 0.00
    115.00 - 10.00 + 5.00 = 110.00; + 16.15 = 126.15
    ");
}
