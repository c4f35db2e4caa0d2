//! CII writer/reader integration tests.
//!
//! Run with: `cargo test --features cii --test cii_tests`

#![cfg(feature = "cii")]

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use vatsplit::cii::{self, TotalsPolicy};
use vatsplit::core::*;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn seller() -> Party {
    PartyBuilder::new(
        "Atelier Durand SARL",
        AddressBuilder::new("Lyon", "69002", "FR")
            .line("12 rue de la République")
            .build(),
    )
    .legal_id("0002", "552100554")
    .vat_id("FR40552100554")
    .electronic_address("EM", "factures@durand.example")
    .build()
}

fn buyer() -> Party {
    PartyBuilder::new("Maison Petit", AddressBuilder::new("Paris", "75011", "FR").build())
        .legal_id("0002", "732829320")
        .build()
}

fn line(id: &str, price: Decimal, rate: Decimal) -> InvoiceLineBuilder {
    InvoiceLineBuilder::new(id, format!("Service {id}"), dec!(1), "C62", price)
        .vat(TaxCategory::StandardRate, rate)
}

/// 70.00 at 20% and 30.00 at 10%, less a 10.00 document allowance.
fn split_allowance_invoice() -> Invoice {
    InvoiceBuilder::new("FA-2024-007", date(2024, 5, 2))
        .seller(seller())
        .buyer(buyer())
        .add_line(line("1", dec!(70.00), dec!(20)).build())
        .add_line(line("2", dec!(30.00), dec!(10)).build())
        .add_allowance(AllowanceCharge::fixed(dec!(10.00)).reason_code("95").reason("Remise"))
        .build()
        .unwrap()
}

fn detailed_invoice() -> Invoice {
    InvoiceBuilder::new("FA-2024-008", date(2024, 5, 31))
        .due_date(date(2024, 6, 30))
        .buyer_reference("PO-5512")
        .note("Merci pour votre confiance")
        .payment_terms("30 jours net")
        .delivery_date(date(2024, 5, 28))
        .seller(seller())
        .buyer(buyer())
        .add_line(
            InvoiceLineBuilder::new("1", "Conseil", dec!(7.5), "HUR", dec!(120.00))
                .vat(TaxCategory::StandardRate, dec!(20))
                .description("Atelier de cadrage")
                .period(date(2024, 5, 1), date(2024, 5, 31))
                .add_allowance(AllowanceCharge::percentage(dec!(5)).reason("Fidélité"))
                .build(),
        )
        .add_line(
            InvoiceLineBuilder::new("2", "Livres", dec!(3), "C62", dec!(45.90))
                .vat(TaxCategory::StandardRate, dec!(5.5))
                .base_quantity(dec!(2))
                .seller_item_id("LIV-01")
                .build(),
        )
        .add_line(
            InvoiceLineBuilder::new("3", "Formation", dec!(1), "C62", dec!(300))
                .exempt(TaxCategory::Exempt)
                .build(),
        )
        .add_allowance(AllowanceCharge::fixed(dec!(25.00)))
        .add_charge(AllowanceCharge::percentage(dec!(2.5)).reason_code("FC").reason("Transport"))
        .build()
        .unwrap()
}

// ── Writer ──────────────────────────────────────────────────────────────────

#[test]
fn writer_emits_one_record_per_bucket_share() {
    let xml = cii::to_cii_xml(&split_allowance_invoice()).unwrap();

    assert_eq!(xml.matches("<ram:SpecifiedTradeAllowanceCharge>").count(), 2);
    assert!(xml.contains("<udt:Indicator>false</udt:Indicator>"));
    assert!(xml.contains("<ram:ActualAmount>7.00</ram:ActualAmount>"));
    assert!(xml.contains("<ram:ActualAmount>3.00</ram:ActualAmount>"));
    assert_eq!(xml.matches("<ram:ReasonCode>95</ram:ReasonCode>").count(), 2);

    assert!(xml.contains("<ram:BasisAmount>63.00</ram:BasisAmount>"));
    assert!(xml.contains("<ram:CalculatedAmount>12.60</ram:CalculatedAmount>"));
    assert!(xml.contains("<ram:BasisAmount>27.00</ram:BasisAmount>"));
    assert!(xml.contains("<ram:CalculatedAmount>2.70</ram:CalculatedAmount>"));

    assert!(xml.contains("<ram:LineTotalAmount>100.00</ram:LineTotalAmount>"));
    assert!(xml.contains("<ram:ChargeTotalAmount>0.00</ram:ChargeTotalAmount>"));
    assert!(xml.contains("<ram:AllowanceTotalAmount>10.00</ram:AllowanceTotalAmount>"));
    assert!(xml.contains("<ram:TaxBasisTotalAmount>90.00</ram:TaxBasisTotalAmount>"));
    assert!(xml.contains(r#"<ram:TaxTotalAmount currencyID="EUR">15.30</ram:TaxTotalAmount>"#));
    assert!(xml.contains("<ram:GrandTotalAmount>105.30</ram:GrandTotalAmount>"));
    assert!(xml.contains("<ram:DuePayableAmount>105.30</ram:DuePayableAmount>"));
}

#[test]
fn writer_orders_header_settlement() {
    let xml = cii::to_cii_xml(&detailed_invoice()).unwrap();
    let settlement = xml.find("<ram:ApplicableHeaderTradeSettlement>").unwrap();
    let header = &xml[settlement..];

    let currency = header.find("<ram:InvoiceCurrencyCode>").unwrap();
    let breakdown = header.find("<ram:ApplicableTradeTax>").unwrap();
    let adjustments = header.find("<ram:SpecifiedTradeAllowanceCharge>").unwrap();
    let terms = header.find("<ram:SpecifiedTradePaymentTerms>").unwrap();
    let summation = header
        .find("<ram:SpecifiedTradeSettlementHeaderMonetarySummation>")
        .unwrap();
    assert!(currency < breakdown);
    assert!(breakdown < adjustments);
    assert!(adjustments < terms);
    assert!(terms < summation);
}

#[test]
fn writer_requires_legal_ids() {
    let mut inv = split_allowance_invoice();
    inv.buyer = Some(
        PartyBuilder::new("Maison Petit", AddressBuilder::new("Paris", "75011", "FR").build())
            .build(),
    );
    let err = cii::to_cii_xml(&inv).unwrap_err();
    assert!(
        matches!(&err, InvoiceError::MissingField { field, .. } if field == "buyer.legal_id"),
        "got {err:?}"
    );

    inv.seller = None;
    let err = cii::to_cii_xml(&inv).unwrap_err();
    assert!(matches!(&err, InvoiceError::MissingField { field, .. } if field == "seller"));
}

#[test]
fn writer_requires_category_with_rate() {
    let mut inv = split_allowance_invoice();
    inv.lines[1].vat_category = None;
    let err = cii::to_cii_xml(&inv).unwrap_err();
    assert!(
        matches!(&err, InvoiceError::MissingField { field, .. } if field == "lines[1].vat_category")
    );
}

#[test]
fn writer_omits_rate_for_exempt_bucket() {
    let xml = cii::to_cii_xml(&detailed_invoice()).unwrap();
    let doc = cii::from_cii_xml(&xml).unwrap();

    let exempt = doc
        .stated
        .vat_breakdown
        .iter()
        .find(|b| b.category == Some(TaxCategory::Exempt))
        .unwrap();
    assert_eq!(exempt.rate, None);
    assert_eq!(exempt.taxable_amount, Some(dec!(300.00)));
    assert_eq!(exempt.tax_amount, Some(dec!(0.00)));
}

#[test]
fn writer_rejects_out_of_range_numbers() {
    let mut inv = split_allowance_invoice();
    inv.lines[0].price = dec!(1_000_000_000_000);
    inv.lines[0].quantity = dec!(1_000_000_000_000);
    inv.lines[0].base_quantity = Some(dec!(0.0000001));

    let err = cii::to_cii_xml(&inv).unwrap_err();
    match err {
        InvoiceError::Validation(msg) => assert!(msg.contains("lines[0].net_amount"), "got {msg}"),
        other => panic!("expected validation error, got {other:?}"),
    }
}

/// 105.30 grand total, 50.00 already paid, -0.30 rounding.
fn prepaid_invoice() -> Invoice {
    InvoiceBuilder::new("FA-2024-010", date(2024, 8, 1))
        .seller(seller())
        .buyer(buyer())
        .order_reference("PO-456")
        .sales_order_reference("SO-123")
        .contract_reference("CT-789")
        .buyer_accounting_reference("4110")
        .tax_currency("USD")
        .tax_point_date(date(2024, 7, 31))
        .payment(
            PaymentInstructions::new(PaymentMeansCode::SepaCreditTransfer)
                .means_text("Virement")
                .remittance_info("FA-2024-010")
                .credit_transfer(CreditTransfer {
                    iban: "FR7630006000011234567890189".into(),
                    account_name: Some("Atelier Durand".into()),
                    bic: Some("AGRIFRPP".into()),
                }),
        )
        .prepaid_amount(dec!(50.00))
        .rounding_amount(dec!(-0.30))
        .add_line(
            line("1", dec!(70.00), dec!(20))
                .order_line_reference("7")
                .buyer_accounting_reference("6061")
                .build(),
        )
        .add_line(line("2", dec!(30.00), dec!(10)).build())
        .add_allowance(AllowanceCharge::fixed(dec!(10.00)))
        .build()
        .unwrap()
}

#[test]
fn writer_nets_prepayment_in_amount_due() {
    let xml = cii::to_cii_xml(&prepaid_invoice()).unwrap();
    assert!(xml.contains("<ram:GrandTotalAmount>105.30</ram:GrandTotalAmount>"));
    assert!(xml.contains("<ram:RoundingAmount>-0.30</ram:RoundingAmount>"));
    assert!(xml.contains("<ram:TotalPrepaidAmount>50.00</ram:TotalPrepaidAmount>"));
    assert!(xml.contains("<ram:DuePayableAmount>55.00</ram:DuePayableAmount>"));

    let summation = xml.find("<ram:SpecifiedTradeSettlementHeaderMonetarySummation>").unwrap();
    let rounding = xml.find("<ram:RoundingAmount>").unwrap();
    let grand = xml.find("<ram:GrandTotalAmount>").unwrap();
    let prepaid = xml.find("<ram:TotalPrepaidAmount>").unwrap();
    let due = xml.find("<ram:DuePayableAmount>").unwrap();
    assert!(summation < rounding && rounding < grand && grand < prepaid && prepaid < due);
}

#[test]
fn writer_emits_gross_and_net_price() {
    let xml = cii::to_cii_xml(&detailed_invoice()).unwrap();
    assert_eq!(xml.matches("<ram:GrossPriceProductTradePrice>").count(), 3);
    assert_eq!(xml.matches("<ram:NetPriceProductTradePrice>").count(), 3);
    let gross = xml.find("<ram:GrossPriceProductTradePrice>").unwrap();
    let net = xml.find("<ram:NetPriceProductTradePrice>").unwrap();
    assert!(gross < net);
}

#[test]
fn writer_orders_payment_and_references() {
    let xml = cii::to_cii_xml(&prepaid_invoice()).unwrap();

    let agreement = xml.find("<ram:ApplicableHeaderTradeAgreement>").unwrap();
    let header = &xml[agreement..];
    let buyer_party = header.find("<ram:BuyerTradeParty>").unwrap();
    let sales_order = header.find("<ram:SellerOrderReferencedDocument>").unwrap();
    let order = header.find("<ram:BuyerOrderReferencedDocument>").unwrap();
    let contract = header.find("<ram:ContractReferencedDocument>").unwrap();
    assert!(buyer_party < sales_order && sales_order < order && order < contract);

    let settlement = xml.find("<ram:ApplicableHeaderTradeSettlement>").unwrap();
    let header = &xml[settlement..];
    let reference = header.find("<ram:PaymentReference>").unwrap();
    let tax_currency = header.find("<ram:TaxCurrencyCode>").unwrap();
    let currency = header.find("<ram:InvoiceCurrencyCode>").unwrap();
    let means = header.find("<ram:SpecifiedTradeSettlementPaymentMeans>").unwrap();
    let breakdown = header.find("<ram:ApplicableTradeTax>").unwrap();
    let summation = header
        .find("<ram:SpecifiedTradeSettlementHeaderMonetarySummation>")
        .unwrap();
    let account = header.find("<ram:ReceivableSpecifiedTradeAccountingAccount>").unwrap();
    assert!(reference < tax_currency && tax_currency < currency);
    assert!(currency < means && means < breakdown);
    assert!(summation < account);
    assert_eq!(header.matches("<ram:TaxPointDate>").count(), 2);
}

// ── Reader ──────────────────────────────────────────────────────────────────

#[test]
fn round_trip_preserves_payment_and_references() {
    let inv = prepaid_invoice();
    let xml = cii::to_cii_xml(&inv).unwrap();
    let doc = cii::from_cii_xml_with(&xml, TotalsPolicy::Verify).unwrap();
    let parsed = doc.invoice;

    assert_eq!(parsed.order_reference.as_deref(), Some("PO-456"));
    assert_eq!(parsed.sales_order_reference.as_deref(), Some("SO-123"));
    assert_eq!(parsed.contract_reference.as_deref(), Some("CT-789"));
    assert_eq!(parsed.buyer_accounting_reference.as_deref(), Some("4110"));
    assert_eq!(parsed.tax_currency_code.as_deref(), Some("USD"));
    assert_eq!(parsed.tax_point_date, Some(date(2024, 7, 31)));
    assert_eq!(parsed.payment, inv.payment);
    assert_eq!(parsed.prepaid_amount, Some(dec!(50.00)));
    assert_eq!(parsed.rounding_amount, Some(dec!(-0.30)));
    assert_eq!(parsed.lines[0].order_line_reference.as_deref(), Some("7"));
    assert_eq!(parsed.lines[0].buyer_accounting_reference.as_deref(), Some("6061"));
    assert_eq!(parsed.lines[1].order_line_reference, None);

    assert_eq!(doc.stated.payable_amount, Some(dec!(55.00)));
    assert_eq!(parsed.amount_due(&parsed.compute_tax().totals), dec!(55.00));
}


#[test]
fn round_trip_preserves_totals() {
    let inv = detailed_invoice();
    let original = inv.compute_tax();

    let xml = cii::to_cii_xml(&inv).unwrap();
    let doc = cii::from_cii_xml(&xml).unwrap();

    assert_eq!(doc.invoice.compute_tax().totals, original.totals);
    assert_eq!(doc.stated.grand_total, Some(original.totals.grand_total));
    assert_eq!(doc.stated.line_nets.len(), 3);
    assert!(compare_stated_totals(&doc.stated, &original).is_empty());
}

#[test]
fn round_trip_preserves_document_fields() {
    let inv = detailed_invoice();
    let xml = cii::to_cii_xml(&inv).unwrap();
    let parsed = cii::from_cii_xml(&xml).unwrap().invoice;

    assert_eq!(parsed.number, "FA-2024-008");
    assert_eq!(parsed.issue_date, date(2024, 5, 31));
    assert_eq!(parsed.due_date, Some(date(2024, 6, 30)));
    assert_eq!(parsed.delivery_date, Some(date(2024, 5, 28)));
    assert_eq!(parsed.buyer_reference.as_deref(), Some("PO-5512"));
    assert_eq!(parsed.notes, vec!["Merci pour votre confiance".to_string()]);
    assert_eq!(parsed.payment_terms.as_deref(), Some("30 jours net"));
    assert_eq!(parsed.specification.as_deref(), Some(cii::EN16931_SPECIFICATION_ID));

    let seller = parsed.seller.unwrap();
    assert_eq!(seller.name, "Atelier Durand SARL");
    assert_eq!(seller.legal_id, Some(Identifier::new("552100554", Some("0002"))));
    assert_eq!(seller.vat_id.as_deref(), Some("FR40552100554"));
    assert_eq!(seller.address.lines, vec!["12 rue de la République".to_string()]);
    assert_eq!(seller.address.city.as_deref(), Some("Lyon"));

    let l1 = &parsed.lines[0];
    assert_eq!(l1.quantity, dec!(7.5));
    assert_eq!(l1.unit, "HUR");
    assert_eq!(l1.description.as_deref(), Some("Atelier de cadrage"));
    assert_eq!(l1.period.as_ref().map(|p| p.end), Some(date(2024, 5, 31)));
    assert_eq!(l1.allowances[0].percent(), Some(dec!(5)));
    assert_eq!(l1.allowances[0].reason.as_deref(), Some("Fidélité"));

    let l2 = &parsed.lines[1];
    assert_eq!(l2.base_quantity, Some(dec!(2)));
    assert_eq!(l2.seller_item_id.as_deref(), Some("LIV-01"));
    assert_eq!(parsed.lines[2].vat_rate, None);
    assert_eq!(parsed.lines[2].vat_category, Some(TaxCategory::Exempt));
}

#[test]
fn reader_keeps_share_classification() {
    let xml = cii::to_cii_xml(&split_allowance_invoice()).unwrap();
    let parsed = cii::from_cii_xml(&xml).unwrap().invoice;

    assert_eq!(parsed.allowances.len(), 2);
    assert_eq!(parsed.allowances[0].vat_category, Some(TaxCategory::StandardRate));
    assert_eq!(parsed.allowances[0].vat_rate, Some(dec!(20)));
    assert_eq!(parsed.allowances[0].amount, AdjustmentAmount::Fixed(dec!(7.00)));
    assert_eq!(parsed.allowances[1].vat_rate, Some(dec!(10)));
    assert_eq!(parsed.allowances[1].reason_code.as_deref(), Some("95"));
}

#[test]
fn verify_accepts_writer_output() {
    let inv = detailed_invoice();
    let xml = cii::to_cii_xml(&inv).unwrap();
    let doc = cii::from_cii_xml_with(&xml, TotalsPolicy::Verify).unwrap();
    assert_eq!(doc.invoice.number, inv.number);
}

#[test]
fn verify_rejects_tampered_grand_total() {
    let xml = cii::to_cii_xml(&split_allowance_invoice())
        .unwrap()
        .replace(
            "<ram:GrandTotalAmount>105.30</ram:GrandTotalAmount>",
            "<ram:GrandTotalAmount>150.30</ram:GrandTotalAmount>",
        );

    // Trust hands the stated figure back untouched.
    let trusted = cii::from_cii_xml(&xml).unwrap();
    assert_eq!(trusted.stated.grand_total, Some(dec!(150.30)));

    let err = cii::from_cii_xml_with(&xml, TotalsPolicy::Verify).unwrap_err();
    match err {
        InvoiceError::Validation(msg) => {
            assert!(msg.contains("totals.grand_total"), "got {msg}");
            assert!(!msg.contains("totals.payable_amount"), "got {msg}");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn verify_rejects_tampered_bucket() {
    let xml = cii::to_cii_xml(&split_allowance_invoice())
        .unwrap()
        .replace(
            "<ram:CalculatedAmount>2.70</ram:CalculatedAmount>",
            "<ram:CalculatedAmount>2.71</ram:CalculatedAmount>",
        );
    let err = cii::from_cii_xml_with(&xml, TotalsPolicy::Verify).unwrap_err();
    assert!(err.to_string().contains("tax_amount"), "got {err}");
}

#[test]
fn malformed_xml_is_a_parse_error() {
    let err = cii::from_cii_xml("<rsm:CrossIndustryInvoice><rsm:ExchangedDocument></rsm:Oops>")
        .unwrap_err();
    assert!(matches!(err, InvoiceError::Parse(_)), "got {err:?}");
}

#[test]
fn unsplit_record_round_trips() {
    let inv = InvoiceBuilder::new("FA-2024-009", date(2024, 7, 1))
        .seller(seller())
        .buyer(buyer())
        .add_line(
            InvoiceLineBuilder::new("1", "Formation", dec!(2), "C62", dec!(150))
                .exempt(TaxCategory::Exempt)
                .build(),
        )
        .add_allowance(AllowanceCharge::fixed(dec!(30)).vat(TaxCategory::Exempt, dec!(0)))
        .build()
        .unwrap();
    let original = inv.compute_tax();
    assert_eq!(original.allowances[0].bucket, None);

    let xml = cii::to_cii_xml(&inv).unwrap();
    assert!(xml.contains("<ram:ActualAmount>30.00</ram:ActualAmount>"));
    assert!(xml.contains("<ram:CategoryCode>E</ram:CategoryCode>"));

    let doc = cii::from_cii_xml_with(&xml, TotalsPolicy::Verify).unwrap();
    let recomputed = doc.invoice.compute_tax();
    assert_eq!(recomputed.totals, original.totals);
    assert_eq!(recomputed.totals.tax_basis_total, dec!(270.00));
    assert_eq!(recomputed.allowances[0].vat_category, Some(TaxCategory::Exempt));
}

// ── Property Tests ──────────────────────────────────────────────────────────

fn arb_line() -> impl Strategy<Value = InvoiceLine> {
    (
        1i64..20,
        1i64..50_000,
        prop_oneof![
            Just(Some(dec!(20))),
            Just(Some(dec!(10))),
            Just(Some(dec!(5.5))),
            Just(None),
        ],
        prop::option::of(1i64..2_000),
    )
        .prop_map(|(qty, cents, rate, discount)| {
            let b = InvoiceLineBuilder::new("1", "Item", Decimal::from(qty), "C62", Decimal::new(cents, 2));
            let mut b = match rate {
                Some(rate) => b.vat(TaxCategory::StandardRate, rate),
                None => b.exempt(TaxCategory::NotSubjectToVat),
            };
            if let Some(pct) = discount {
                b = b.add_allowance(AllowanceCharge::percentage(Decimal::new(pct, 2)));
            }
            b.build()
        })
}

fn arb_adjustment() -> impl Strategy<Value = AllowanceCharge> {
    prop_oneof![
        (1i64..10_000).prop_map(|c| AllowanceCharge::fixed(Decimal::new(c, 2))),
        (1i64..2_000).prop_map(|p| AllowanceCharge::percentage(Decimal::new(p, 2))),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Whatever the writer produces, the reader accepts under Verify and
    /// recomputes to the same totals.
    #[test]
    fn written_documents_verify(
        lines in prop::collection::vec(arb_line(), 1..6),
        allowances in prop::collection::vec(arb_adjustment(), 0..3),
        charges in prop::collection::vec(arb_adjustment(), 0..3),
    ) {
        let mut builder = InvoiceBuilder::new("PROP-CII", date(2024, 1, 15))
            .seller(seller())
            .buyer(buyer());
        for (i, mut line) in lines.into_iter().enumerate() {
            line.id = (i + 1).to_string();
            builder = builder.add_line(line);
        }
        for a in allowances {
            builder = builder.add_allowance(a);
        }
        for c in charges {
            builder = builder.add_charge(c);
        }
        let inv = builder.build_unchecked();

        let xml = cii::to_cii_xml(&inv).unwrap();
        let doc = cii::from_cii_xml_with(&xml, TotalsPolicy::Verify);
        prop_assert!(doc.is_ok(), "verify failed: {:?}", doc.as_ref().err());
        let parsed = doc.unwrap().invoice;
        prop_assert_eq!(parsed.compute_tax().totals, inv.compute_tax().totals);
    }
}
