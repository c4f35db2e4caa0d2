use chrono::NaiveDate;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use rust_decimal::Decimal;
use std::str::FromStr;

use super::{CiiDocument, TotalsPolicy};
use crate::core::*;

/// Parse a CII (Cross Industry Invoice) XML string, trusting its totals.
///
/// Equivalent to [`from_cii_xml_with`] with [`TotalsPolicy::Trust`].
pub fn from_cii_xml(xml: &str) -> Result<CiiDocument, InvoiceError> {
    from_cii_xml_with(xml, TotalsPolicy::Trust)
}

/// Parse a CII (Cross Industry Invoice) XML string.
///
/// Malformed XML, unparsable decimals or dates, unknown VAT category or
/// type codes, and a missing issue date are [`InvoiceError::Parse`] errors.
/// So is any number outside [`validate_ranges`], which keeps every
/// imported invoice computable.
/// Other absent elements take these defaults:
///
/// | Element | Default |
/// |---------|---------|
/// | `BilledQuantity` | 1 |
/// | `NetPriceProductTradePrice/ChargeAmount` | 0 |
/// | `BilledQuantity/@unitCode` | `C62` |
/// | `InvoiceCurrencyCode` | `EUR` |
/// | `ExchangedDocument/TypeCode` | 380 |
/// | allowance/charge `ActualAmount` | 0 |
/// | `SpecifiedTradeSettlementPaymentMeans/TypeCode` | 1 (not defined) |
///
/// Stated totals that are absent stay `None` in [`CiiDocument::stated`].
/// With [`TotalsPolicy::Verify`] the invoice is recomputed and every
/// difference from the stated figures is reported as one
/// [`InvoiceError::Validation`]. The stated `DuePayableAmount` is checked
/// against the grand total less `TotalPrepaidAmount` plus `RoundingAmount`.
pub fn from_cii_xml_with(xml: &str, policy: TotalsPolicy) -> Result<CiiDocument, InvoiceError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut p = CiiParsed::default();
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = element_name(e)?;
                p.capture_attributes(e)?;
                path.push(name);
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| InvoiceError::Parse(format!("invalid text content: {e}")))?;
                if !text.is_empty() {
                    p.handle_text(&path, &text);
                }
            }
            Ok(Event::End(_)) => {
                let ended = path.pop().unwrap_or_default();
                p.handle_end(&ended, &path);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(InvoiceError::Parse(format!(
                    "XML error at position {}: {e}",
                    reader.buffer_position()
                )));
            }
            _ => {}
        }
    }

    if let Some(open) = path.last() {
        return Err(InvoiceError::Parse(format!(
            "unexpected end of document inside <{open}>"
        )));
    }

    let (invoice, stated) = p.into_document()?;

    let range_errors = validate_ranges(&invoice);
    if !range_errors.is_empty() {
        return Err(InvoiceError::Parse(join_errors(&range_errors)));
    }

    if policy == TotalsPolicy::Verify {
        let computation = invoice.compute_tax();
        let errors = compare_stated_totals(&stated, &computation);
        if !errors.is_empty() {
            tracing::warn!(
                number = %invoice.number,
                mismatches = errors.len(),
                "stated totals differ from recomputation"
            );
            return Err(InvoiceError::Validation(join_errors(&errors)));
        }
    }

    tracing::debug!(
        number = %invoice.number,
        lines = invoice.lines.len(),
        allowances = invoice.allowances.len(),
        charges = invoice.charges.len(),
        ?policy,
        "CII document read"
    );

    Ok(CiiDocument { invoice, stated })
}

fn element_name(e: &BytesStart<'_>) -> Result<String, InvoiceError> {
    std::str::from_utf8(e.name().as_ref())
        .map(str::to_string)
        .map_err(|e| InvoiceError::Parse(format!("invalid element name: {e}")))
}

fn within(path: &[String], element: &str) -> bool {
    path.iter().any(|p| p == element)
}

#[derive(Default)]
struct CiiParsed {
    specification: Option<String>,
    number: Option<String>,
    type_code: Option<String>,
    issue_date: Option<String>,
    notes: Vec<String>,
    buyer_reference: Option<String>,
    contract_reference: Option<String>,
    order_reference: Option<String>,
    sales_order_reference: Option<String>,
    buyer_accounting_reference: Option<String>,
    currency_code: Option<String>,
    tax_currency_code: Option<String>,
    delivery_date: Option<String>,
    tax_point_date: Option<String>,
    payment_terms: Option<String>,
    due_date: Option<String>,

    payment_reference: Option<String>,
    means_code: Option<String>,
    means_text: Option<String>,
    iban: Option<String>,
    account_name: Option<String>,
    bic: Option<String>,

    seller: Option<CiiParty>,
    buyer: Option<CiiParty>,

    lines: Vec<CiiLine>,
    current_line: Option<CiiLine>,

    vat_breakdown: Vec<CiiVatBreakdown>,
    current_breakdown: Option<CiiVatBreakdown>,

    doc_allowances_charges: Vec<CiiAllowanceCharge>,
    current_doc_ac: Option<CiiAllowanceCharge>,

    line_total: Option<String>,
    charge_total: Option<String>,
    allowance_total: Option<String>,
    tax_basis_total: Option<String>,
    tax_total: Option<String>,
    grand_total: Option<String>,
    prepaid: Option<String>,
    rounding: Option<String>,
    due_payable: Option<String>,

    // Attributes of the element last opened
    current_scheme_id: Option<String>,
    current_unit_code: Option<String>,
}

#[derive(Default)]
struct CiiParty {
    name: Option<String>,
    global_id: Option<Identifier>,
    legal_id: Option<Identifier>,
    trading_name: Option<String>,
    vat_id: Option<String>,
    tax_number: Option<String>,
    address_lines: Vec<String>,
    city: Option<String>,
    postal_code: Option<String>,
    country_code: Option<String>,
    electronic_address: Option<Identifier>,
}

#[derive(Default)]
struct CiiVatBreakdown {
    calculated_amount: Option<String>,
    basis_amount: Option<String>,
    category_code: Option<String>,
    rate: Option<String>,
}

#[derive(Default)]
struct CiiLine {
    id: Option<String>,
    name: Option<String>,
    description: Option<String>,
    seller_item_id: Option<String>,
    quantity: Option<String>,
    unit: Option<String>,
    price: Option<String>,
    base_quantity: Option<String>,
    tax_category: Option<String>,
    tax_rate: Option<String>,
    period_start: Option<String>,
    period_end: Option<String>,
    line_total: Option<String>,
    order_line_reference: Option<String>,
    buyer_accounting_reference: Option<String>,
    allowances_charges: Vec<CiiAllowanceCharge>,
    current_ac: Option<CiiAllowanceCharge>,
}

#[derive(Default)]
struct CiiAllowanceCharge {
    is_charge: Option<String>,
    percent: Option<String>,
    amount: Option<String>,
    reason: Option<String>,
    reason_code: Option<String>,
    tax_category: Option<String>,
    tax_rate: Option<String>,
}

impl CiiAllowanceCharge {
    fn handle_text(&mut self, leaf: &str, text: &str) {
        match leaf {
            "udt:Indicator" | "ram:ChargeIndicator" => self.is_charge = Some(text.to_string()),
            "ram:CalculationPercent" => self.percent = Some(text.to_string()),
            "ram:ActualAmount" => self.amount = Some(text.to_string()),
            "ram:Reason" => self.reason = Some(text.to_string()),
            "ram:ReasonCode" => self.reason_code = Some(text.to_string()),
            "ram:CategoryCode" => self.tax_category = Some(text.to_string()),
            "ram:RateApplicablePercent" => self.tax_rate = Some(text.to_string()),
            _ => {}
        }
    }
}

impl CiiParty {
    fn handle_text(&mut self, path: &[String], leaf: &str, parent: &str, text: &str, scheme: Option<String>) {
        match leaf {
            "ram:Name" if parent.ends_with("TradeParty") => self.name = Some(text.to_string()),
            "ram:GlobalID" => {
                self.global_id = Some(Identifier {
                    value: text.to_string(),
                    scheme,
                })
            }
            "ram:ID" if parent == "ram:SpecifiedLegalOrganization" => {
                self.legal_id = Some(Identifier {
                    value: text.to_string(),
                    scheme,
                })
            }
            "ram:TradingBusinessName" => self.trading_name = Some(text.to_string()),
            "ram:ID" if parent == "ram:SpecifiedTaxRegistration" => match scheme.as_deref() {
                Some("FC") => self.tax_number = Some(text.to_string()),
                _ => self.vat_id = Some(text.to_string()),
            },
            "ram:URIID" if parent == "ram:URIUniversalCommunication" => {
                self.electronic_address = Some(Identifier {
                    value: text.to_string(),
                    scheme,
                })
            }
            "ram:LineOne" | "ram:LineTwo" | "ram:LineThree"
                if within(path, "ram:PostalTradeAddress") =>
            {
                self.address_lines.push(text.to_string())
            }
            "ram:CityName" => self.city = Some(text.to_string()),
            "ram:PostcodeCode" => self.postal_code = Some(text.to_string()),
            "ram:CountryID" => self.country_code = Some(text.to_string()),
            _ => {}
        }
    }

    fn into_party(self) -> Party {
        Party {
            name: self.name.unwrap_or_default(),
            global_id: self.global_id,
            legal_id: self.legal_id,
            trading_name: self.trading_name,
            vat_id: self.vat_id,
            tax_number: self.tax_number,
            address: Address {
                lines: self.address_lines,
                city: self.city,
                postal_code: self.postal_code,
                country_code: self.country_code,
            },
            electronic_address: self.electronic_address,
        }
    }
}

impl CiiParsed {
    fn capture_attributes(&mut self, e: &BytesStart<'_>) -> Result<(), InvoiceError> {
        self.current_scheme_id = None;
        self.current_unit_code = None;
        for attr in e.attributes() {
            let attr = attr.map_err(|e| InvoiceError::Parse(format!("invalid attribute: {e}")))?;
            let value = attr
                .unescape_value()
                .map_err(|e| InvoiceError::Parse(format!("invalid attribute value: {e}")))?;
            match attr.key.as_ref() {
                b"schemeID" => self.current_scheme_id = Some(value.into_owned()),
                b"unitCode" => self.current_unit_code = Some(value.into_owned()),
                _ => {}
            }
        }
        Ok(())
    }

    fn handle_text(&mut self, path: &[String], text: &str) {
        let leaf = path.last().map(|s| s.as_str()).unwrap_or("");
        let parent = if path.len() >= 2 {
            path[path.len() - 2].as_str()
        } else {
            ""
        };

        if within(path, "ram:IncludedSupplyChainTradeLineItem") {
            self.handle_line_text(path, leaf, parent, text);
            return;
        }

        // Document level
        match leaf {
            "ram:ID" if parent == "ram:GuidelineSpecifiedDocumentContextParameter" => {
                self.specification = Some(text.to_string())
            }
            "ram:ID" if parent == "rsm:ExchangedDocument" => self.number = Some(text.to_string()),
            "ram:TypeCode" if parent == "rsm:ExchangedDocument" => {
                self.type_code = Some(text.to_string())
            }
            "udt:DateTimeString" if parent == "ram:IssueDateTime" => {
                self.issue_date = Some(text.to_string())
            }
            "ram:Content" if within(path, "rsm:ExchangedDocument") => {
                self.notes.push(text.to_string())
            }
            "ram:BuyerReference" => self.buyer_reference = Some(text.to_string()),
            "ram:IssuerAssignedID" if within(path, "ram:ApplicableHeaderTradeAgreement") => {
                let slot = match parent {
                    "ram:BuyerOrderReferencedDocument" => &mut self.order_reference,
                    "ram:SellerOrderReferencedDocument" => &mut self.sales_order_reference,
                    "ram:ContractReferencedDocument" => &mut self.contract_reference,
                    _ => return,
                };
                *slot = Some(text.to_string());
                return;
            }
            "udt:DateTimeString"
                if parent == "ram:OccurrenceDateTime"
                    && within(path, "ram:ActualDeliverySupplyChainEvent") =>
            {
                self.delivery_date = Some(text.to_string())
            }
            _ => {}
        }

        let scheme = self.current_scheme_id.take();
        if within(path, "ram:SellerTradeParty") {
            self.seller
                .get_or_insert_with(Default::default)
                .handle_text(path, leaf, parent, text, scheme);
            return;
        }
        if within(path, "ram:BuyerTradeParty") {
            self.buyer
                .get_or_insert_with(Default::default)
                .handle_text(path, leaf, parent, text, scheme);
            return;
        }

        if !within(path, "ram:ApplicableHeaderTradeSettlement") {
            return;
        }

        if within(path, "ram:SpecifiedTradeAllowanceCharge") {
            self.current_doc_ac
                .get_or_insert_with(Default::default)
                .handle_text(leaf, text);
        } else if within(path, "ram:ApplicableTradeTax") {
            let bd = self.current_breakdown.get_or_insert_with(Default::default);
            match leaf {
                "ram:CalculatedAmount" => bd.calculated_amount = Some(text.to_string()),
                "ram:BasisAmount" => bd.basis_amount = Some(text.to_string()),
                "ram:CategoryCode" => bd.category_code = Some(text.to_string()),
                "ram:RateApplicablePercent" => bd.rate = Some(text.to_string()),
                "udt:DateString" if parent == "ram:TaxPointDate" => {
                    self.tax_point_date = Some(text.to_string())
                }
                _ => {}
            }
        } else if within(path, "ram:SpecifiedTradeSettlementHeaderMonetarySummation") {
            let slot = match leaf {
                "ram:LineTotalAmount" => &mut self.line_total,
                "ram:ChargeTotalAmount" => &mut self.charge_total,
                "ram:AllowanceTotalAmount" => &mut self.allowance_total,
                "ram:TaxBasisTotalAmount" => &mut self.tax_basis_total,
                "ram:TaxTotalAmount" => &mut self.tax_total,
                "ram:GrandTotalAmount" => &mut self.grand_total,
                "ram:TotalPrepaidAmount" => &mut self.prepaid,
                "ram:RoundingAmount" => &mut self.rounding,
                "ram:DuePayableAmount" => &mut self.due_payable,
                _ => return,
            };
            *slot = Some(text.to_string());
        } else if within(path, "ram:SpecifiedTradeSettlementPaymentMeans") {
            let slot = match leaf {
                "ram:TypeCode" if parent == "ram:SpecifiedTradeSettlementPaymentMeans" => {
                    &mut self.means_code
                }
                "ram:Information" => &mut self.means_text,
                "ram:IBANID" if parent == "ram:PayeePartyCreditorFinancialAccount" => &mut self.iban,
                "ram:AccountName" => &mut self.account_name,
                "ram:BICID" => &mut self.bic,
                _ => return,
            };
            *slot = Some(text.to_string());
        } else {
            match leaf {
                "ram:InvoiceCurrencyCode" => self.currency_code = Some(text.to_string()),
                "ram:TaxCurrencyCode" => self.tax_currency_code = Some(text.to_string()),
                "ram:PaymentReference" => self.payment_reference = Some(text.to_string()),
                "ram:DateString" if parent == "ram:TaxApplicableTradeCurrencyExchange" => {
                    self.tax_point_date = Some(text.to_string())
                }
                "ram:ID" if parent == "ram:ReceivableSpecifiedTradeAccountingAccount" => {
                    self.buyer_accounting_reference = Some(text.to_string())
                }
                "ram:Description" if parent == "ram:SpecifiedTradePaymentTerms" => {
                    self.payment_terms = Some(text.to_string())
                }
                "udt:DateTimeString" if parent == "ram:DueDateDateTime" => {
                    self.due_date = Some(text.to_string())
                }
                _ => {}
            }
        }
    }

    fn handle_line_text(&mut self, path: &[String], leaf: &str, parent: &str, text: &str) {
        let unit = self.current_unit_code.take();
        let line = self.current_line.get_or_insert_with(Default::default);

        if within(path, "ram:SpecifiedTradeAllowanceCharge") {
            line.current_ac
                .get_or_insert_with(Default::default)
                .handle_text(leaf, text);
            return;
        }

        if within(path, "ram:BillingSpecifiedPeriod") {
            match parent {
                "ram:StartDateTime" => line.period_start = Some(text.to_string()),
                "ram:EndDateTime" => line.period_end = Some(text.to_string()),
                _ => {}
            }
            return;
        }

        match leaf {
            "ram:LineID" if parent == "ram:AssociatedDocumentLineDocument" => {
                line.id = Some(text.to_string())
            }
            "ram:LineID" if parent == "ram:BuyerOrderReferencedDocument" => {
                line.order_line_reference = Some(text.to_string())
            }
            "ram:ID" if parent == "ram:ReceivableSpecifiedTradeAccountingAccount" => {
                line.buyer_accounting_reference = Some(text.to_string())
            }
            "ram:Name" if parent == "ram:SpecifiedTradeProduct" => {
                line.name = Some(text.to_string())
            }
            "ram:Description" if parent == "ram:SpecifiedTradeProduct" => {
                line.description = Some(text.to_string())
            }
            "ram:SellerAssignedID" => line.seller_item_id = Some(text.to_string()),
            "ram:ChargeAmount" if parent == "ram:NetPriceProductTradePrice" => {
                line.price = Some(text.to_string())
            }
            "ram:BasisQuantity" if parent == "ram:NetPriceProductTradePrice" => {
                line.base_quantity = Some(text.to_string())
            }
            "ram:BilledQuantity" => {
                line.quantity = Some(text.to_string());
                line.unit = unit;
            }
            "ram:CategoryCode" if within(path, "ram:ApplicableTradeTax") => {
                line.tax_category = Some(text.to_string())
            }
            "ram:RateApplicablePercent" if within(path, "ram:ApplicableTradeTax") => {
                line.tax_rate = Some(text.to_string())
            }
            "ram:LineTotalAmount" => line.line_total = Some(text.to_string()),
            _ => {}
        }
    }

    fn handle_end(&mut self, ended: &str, path: &[String]) {
        let in_line = within(path, "ram:IncludedSupplyChainTradeLineItem");
        match ended {
            "ram:IncludedSupplyChainTradeLineItem" => {
                if let Some(line) = self.current_line.take() {
                    self.lines.push(line);
                }
            }
            "ram:SpecifiedTradeAllowanceCharge" if in_line => {
                if let Some(line) = self.current_line.as_mut() {
                    if let Some(ac) = line.current_ac.take() {
                        line.allowances_charges.push(ac);
                    }
                }
            }
            "ram:SpecifiedTradeAllowanceCharge" => {
                if let Some(ac) = self.current_doc_ac.take() {
                    self.doc_allowances_charges.push(ac);
                }
            }
            "ram:ApplicableTradeTax" if !in_line => {
                if let Some(bd) = self.current_breakdown.take() {
                    self.vat_breakdown.push(bd);
                }
            }
            _ => {}
        }
    }

    fn into_document(self) -> Result<(Invoice, StatedTotals), InvoiceError> {
        let issue_date = parse_date(
            self.issue_date
                .as_deref()
                .ok_or_else(|| InvoiceError::Parse("missing issue date (BT-2)".into()))?,
        )?;

        let type_code_num: u16 = self
            .type_code
            .as_deref()
            .unwrap_or("380")
            .trim()
            .parse()
            .map_err(|e| InvoiceError::Parse(format!("invalid type code: {e}")))?;
        let type_code = InvoiceTypeCode::from_code(type_code_num)
            .ok_or_else(|| InvoiceError::Parse(format!("unknown type code {type_code_num}")))?;

        let mut lines = Vec::with_capacity(self.lines.len());
        let mut line_nets = Vec::with_capacity(self.lines.len());
        for pl in self.lines {
            line_nets.push(parse_optional_decimal(pl.line_total.as_deref())?);

            let mut allowances = Vec::new();
            let mut charges = Vec::new();
            for pac in pl.allowances_charges {
                let (is_charge, item) = convert_allowance_charge(pac)?;
                if is_charge {
                    charges.push(item);
                } else {
                    allowances.push(item);
                }
            }

            let period = match (pl.period_start, pl.period_end) {
                (Some(start), Some(end)) => Some(Period {
                    start: parse_date(&start)?,
                    end: parse_date(&end)?,
                }),
                _ => None,
            };

            lines.push(InvoiceLine {
                id: pl.id.unwrap_or_default(),
                name: pl.name.unwrap_or_default(),
                description: pl.description,
                seller_item_id: pl.seller_item_id,
                quantity: parse_optional_decimal(pl.quantity.as_deref())?.unwrap_or(Decimal::ONE),
                unit: pl.unit.unwrap_or_else(|| "C62".to_string()),
                price: parse_optional_decimal(pl.price.as_deref())?.unwrap_or(Decimal::ZERO),
                base_quantity: parse_optional_decimal(pl.base_quantity.as_deref())?,
                vat_category: parse_optional_category(pl.tax_category.as_deref())?,
                vat_rate: parse_optional_decimal(pl.tax_rate.as_deref())?,
                allowances,
                charges,
                period,
                order_line_reference: pl.order_line_reference,
                buyer_accounting_reference: pl.buyer_accounting_reference,
            });
        }

        let mut allowances = Vec::new();
        let mut charges = Vec::new();
        for pac in self.doc_allowances_charges {
            let (is_charge, item) = convert_allowance_charge(pac)?;
            if is_charge {
                charges.push(item);
            } else {
                allowances.push(item);
            }
        }

        let vat_breakdown = self
            .vat_breakdown
            .into_iter()
            .map(|bd| {
                Ok(StatedVatBreakdown {
                    category: parse_optional_category(bd.category_code.as_deref())?,
                    rate: parse_optional_decimal(bd.rate.as_deref())?,
                    taxable_amount: parse_optional_decimal(bd.basis_amount.as_deref())?,
                    tax_amount: parse_optional_decimal(bd.calculated_amount.as_deref())?,
                })
            })
            .collect::<Result<Vec<_>, InvoiceError>>()?;

        let stated = StatedTotals {
            line_nets,
            vat_breakdown,
            line_total: parse_optional_decimal(self.line_total.as_deref())?,
            allowance_total: parse_optional_decimal(self.allowance_total.as_deref())?,
            charge_total: parse_optional_decimal(self.charge_total.as_deref())?,
            tax_basis_total: parse_optional_decimal(self.tax_basis_total.as_deref())?,
            vat_total: parse_optional_decimal(self.tax_total.as_deref())?,
            grand_total: parse_optional_decimal(self.grand_total.as_deref())?,
            prepaid_amount: parse_optional_decimal(self.prepaid.as_deref())?,
            rounding_amount: parse_optional_decimal(self.rounding.as_deref())?,
            payable_amount: parse_optional_decimal(self.due_payable.as_deref())?,
        };

        let has_payment = self.means_code.is_some()
            || self.means_text.is_some()
            || self.iban.is_some()
            || self.payment_reference.is_some();
        let payment = if has_payment {
            let code = match self.means_code.as_deref() {
                Some(code) => code
                    .trim()
                    .parse()
                    .map_err(|e| InvoiceError::Parse(format!("invalid payment means code: {e}")))?,
                None => 1,
            };
            Some(PaymentInstructions {
                means_code: PaymentMeansCode::from_code(code),
                means_text: self.means_text,
                remittance_info: self.payment_reference,
                credit_transfer: self.iban.map(|iban| CreditTransfer {
                    iban,
                    account_name: self.account_name,
                    bic: self.bic,
                }),
            })
        } else {
            None
        };

        let invoice = Invoice {
            number: self.number.unwrap_or_default(),
            issue_date,
            due_date: self.due_date.as_deref().map(parse_date).transpose()?,
            type_code,
            currency_code: self.currency_code.unwrap_or_else(|| "EUR".to_string()),
            tax_currency_code: self.tax_currency_code,
            specification: self.specification,
            notes: self.notes,
            buyer_reference: self.buyer_reference,
            contract_reference: self.contract_reference,
            order_reference: self.order_reference,
            sales_order_reference: self.sales_order_reference,
            buyer_accounting_reference: self.buyer_accounting_reference,
            seller: self.seller.map(CiiParty::into_party),
            buyer: self.buyer.map(CiiParty::into_party),
            delivery_date: self.delivery_date.as_deref().map(parse_date).transpose()?,
            tax_point_date: self.tax_point_date.as_deref().map(parse_date).transpose()?,
            payment_terms: self.payment_terms,
            payment,
            prepaid_amount: stated.prepaid_amount,
            rounding_amount: stated.rounding_amount,
            lines,
            allowances,
            charges,
        };

        Ok((invoice, stated))
    }
}

/// A record with both category and rate keeps them as a pinned
/// classification, so recomputing places it on the same VAT bucket.
fn convert_allowance_charge(
    pac: CiiAllowanceCharge,
) -> Result<(bool, AllowanceCharge), InvoiceError> {
    let is_charge = pac
        .is_charge
        .as_deref()
        .is_some_and(|s| s.trim().eq_ignore_ascii_case("true"));

    let mut item = match parse_optional_decimal(pac.percent.as_deref())? {
        Some(percent) => AllowanceCharge::percentage(percent),
        None => AllowanceCharge::fixed(
            parse_optional_decimal(pac.amount.as_deref())?.unwrap_or(Decimal::ZERO),
        ),
    };
    item.reason = pac.reason;
    item.reason_code = pac.reason_code;
    item.vat_category = parse_optional_category(pac.tax_category.as_deref())?;
    item.vat_rate = parse_optional_decimal(pac.tax_rate.as_deref())?;

    Ok((is_charge, item))
}

fn parse_decimal(s: &str) -> Result<Decimal, InvoiceError> {
    let value = Decimal::from_str(s.trim())
        .map_err(|e| InvoiceError::Parse(format!("invalid decimal '{s}': {e}")))?;
    if value.abs() > MAX_AMOUNT {
        return Err(InvoiceError::Parse(format!("value '{s}' exceeds {MAX_AMOUNT}")));
    }
    Ok(value)
}

fn parse_optional_decimal(s: Option<&str>) -> Result<Option<Decimal>, InvoiceError> {
    s.map(parse_decimal).transpose()
}

fn parse_date(s: &str) -> Result<NaiveDate, InvoiceError> {
    NaiveDate::parse_from_str(s.trim(), "%Y%m%d")
        .map_err(|e| InvoiceError::Parse(format!("invalid CII date '{s}': {e}")))
}

fn parse_optional_category(code: Option<&str>) -> Result<Option<TaxCategory>, InvoiceError> {
    code.map(|c| {
        TaxCategory::from_code(c.trim())
            .ok_or_else(|| InvoiceError::Parse(format!("unknown VAT category code '{c}'")))
    })
    .transpose()
}
