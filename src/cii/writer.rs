use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::xml_utils::{XmlResult, XmlWriter, format_amount, format_decimal};
use super::{EN16931_SPECIFICATION_ID, cii_ns};
use crate::core::*;
use crate::tax::{AllowanceChargeShare, LineAmounts, TaxComputation};

/// Generate EN 16931 CII (Cross Industry Invoice) XML.
///
/// Every monetary figure is taken from one [`Invoice::compute_tax`] call.
/// Seller and buyer must both be present and carry a legal registration
/// identifier (BT-30 / BT-47), otherwise [`InvoiceError::MissingField`] is
/// returned. Numbers outside [`validate_ranges`] are an
/// [`InvoiceError::Validation`].
pub fn to_cii_xml(invoice: &Invoice) -> XmlResult {
    let seller = invoice
        .seller
        .as_ref()
        .ok_or_else(|| InvoiceError::missing("seller", "invoice has no seller"))?;
    let buyer = invoice
        .buyer
        .as_ref()
        .ok_or_else(|| InvoiceError::missing("buyer", "invoice has no buyer"))?;
    require_legal_id(seller, "seller")?;
    require_legal_id(buyer, "buyer")?;

    for (i, line) in invoice.lines.iter().enumerate() {
        if line.vat_rate.is_some() && line.vat_category.is_none() {
            return Err(InvoiceError::missing(
                format!("lines[{i}].vat_category"),
                "a line with a VAT rate needs a VAT category code",
            ));
        }
    }

    let range_errors = validate_ranges(invoice);
    if !range_errors.is_empty() {
        return Err(InvoiceError::Validation(join_errors(&range_errors)));
    }

    let computation = invoice.compute_tax();
    let currency = invoice.currency_code.as_str();
    let mut w = XmlWriter::new()?;

    w.start_element_with_attrs(
        "rsm:CrossIndustryInvoice",
        &[
            ("xmlns:rsm", cii_ns::RSM),
            ("xmlns:ram", cii_ns::RAM),
            ("xmlns:qdt", cii_ns::QDT),
            ("xmlns:udt", cii_ns::UDT),
        ],
    )?;

    // --- ExchangedDocumentContext ---
    w.start_element("rsm:ExchangedDocumentContext")?;
    w.start_element("ram:GuidelineSpecifiedDocumentContextParameter")?;
    w.text_element(
        "ram:ID",
        invoice
            .specification
            .as_deref()
            .unwrap_or(EN16931_SPECIFICATION_ID),
    )?;
    w.end_element("ram:GuidelineSpecifiedDocumentContextParameter")?;
    w.end_element("rsm:ExchangedDocumentContext")?;

    // --- ExchangedDocument ---
    w.start_element("rsm:ExchangedDocument")?;
    w.text_element("ram:ID", &invoice.number)?;
    w.text_element("ram:TypeCode", &invoice.type_code.code().to_string())?;
    w.date_element("ram:IssueDateTime", invoice.issue_date)?;
    for note in &invoice.notes {
        w.start_element("ram:IncludedNote")?;
        w.text_element("ram:Content", note)?;
        w.end_element("ram:IncludedNote")?;
    }
    w.end_element("rsm:ExchangedDocument")?;

    // --- SupplyChainTradeTransaction ---
    w.start_element("rsm:SupplyChainTradeTransaction")?;

    for (line, amounts) in invoice.lines.iter().zip(&computation.lines) {
        write_line(&mut w, line, amounts)?;
    }

    // --- ApplicableHeaderTradeAgreement ---
    w.start_element("ram:ApplicableHeaderTradeAgreement")?;
    if let Some(br) = &invoice.buyer_reference {
        w.text_element("ram:BuyerReference", br)?;
    }
    write_party(&mut w, seller, "ram:SellerTradeParty")?;
    write_party(&mut w, buyer, "ram:BuyerTradeParty")?;
    write_referenced_document(&mut w, "ram:SellerOrderReferencedDocument", &invoice.sales_order_reference)?;
    write_referenced_document(&mut w, "ram:BuyerOrderReferencedDocument", &invoice.order_reference)?;
    write_referenced_document(&mut w, "ram:ContractReferencedDocument", &invoice.contract_reference)?;
    w.end_element("ram:ApplicableHeaderTradeAgreement")?;

    // --- ApplicableHeaderTradeDelivery ---
    w.start_element("ram:ApplicableHeaderTradeDelivery")?;
    if let Some(date) = invoice.delivery_date {
        w.start_element("ram:ActualDeliverySupplyChainEvent")?;
        w.date_element("ram:OccurrenceDateTime", date)?;
        w.end_element("ram:ActualDeliverySupplyChainEvent")?;
    }
    w.end_element("ram:ApplicableHeaderTradeDelivery")?;

    // --- ApplicableHeaderTradeSettlement ---
    w.start_element("ram:ApplicableHeaderTradeSettlement")?;
    if let Some(reference) = invoice.payment.as_ref().and_then(|p| p.remittance_info.as_ref()) {
        w.text_element("ram:PaymentReference", reference)?;
    }
    if let Some(tcc) = &invoice.tax_currency_code {
        w.text_element("ram:TaxCurrencyCode", tcc)?;
    }
    w.text_element("ram:InvoiceCurrencyCode", currency)?;

    if let Some(payment) = &invoice.payment {
        write_payment_means(&mut w, payment)?;
    }

    write_breakdown(&mut w, &computation, invoice.tax_point_date)?;

    for share in computation.allowances.iter().chain(&computation.charges) {
        write_header_share(&mut w, share)?;
    }

    if invoice.payment_terms.is_some() || invoice.due_date.is_some() {
        w.start_element("ram:SpecifiedTradePaymentTerms")?;
        if let Some(terms) = &invoice.payment_terms {
            w.text_element("ram:Description", terms)?;
        }
        if let Some(due) = invoice.due_date {
            w.date_element("ram:DueDateDateTime", due)?;
        }
        w.end_element("ram:SpecifiedTradePaymentTerms")?;
    }

    // Monetary summation
    let totals = &computation.totals;
    w.start_element("ram:SpecifiedTradeSettlementHeaderMonetarySummation")?;
    w.amount_element("ram:LineTotalAmount", totals.line_total)?;
    w.amount_element("ram:ChargeTotalAmount", totals.charge_total)?;
    w.amount_element("ram:AllowanceTotalAmount", totals.allowance_total)?;
    w.amount_element("ram:TaxBasisTotalAmount", totals.tax_basis_total)?;
    w.text_element_with_attrs(
        "ram:TaxTotalAmount",
        &format_amount(totals.vat_total),
        &[("currencyID", currency)],
    )?;
    if let Some(rounding) = invoice.rounding_amount {
        w.amount_element("ram:RoundingAmount", rounding)?;
    }
    w.amount_element("ram:GrandTotalAmount", totals.grand_total)?;
    if let Some(prepaid) = invoice.prepaid_amount {
        w.amount_element("ram:TotalPrepaidAmount", prepaid)?;
    }
    w.amount_element("ram:DuePayableAmount", invoice.amount_due(totals))?;
    w.end_element("ram:SpecifiedTradeSettlementHeaderMonetarySummation")?;

    // BT-19
    if let Some(account) = &invoice.buyer_accounting_reference {
        w.start_element("ram:ReceivableSpecifiedTradeAccountingAccount")?;
        w.text_element("ram:ID", account)?;
        w.end_element("ram:ReceivableSpecifiedTradeAccountingAccount")?;
    }

    w.end_element("ram:ApplicableHeaderTradeSettlement")?;
    w.end_element("rsm:SupplyChainTradeTransaction")?;
    w.end_element("rsm:CrossIndustryInvoice")?;

    tracing::debug!(
        number = %invoice.number,
        lines = invoice.lines.len(),
        buckets = totals.vat_breakdown.len(),
        shares = computation.allowances.len() + computation.charges.len(),
        "CII document written"
    );

    w.into_string()
}

fn write_referenced_document(
    w: &mut XmlWriter,
    element: &str,
    id: &Option<String>,
) -> Result<(), InvoiceError> {
    if let Some(id) = id {
        w.start_element(element)?;
        w.text_element("ram:IssuerAssignedID", id)?;
        w.end_element(element)?;
    }
    Ok(())
}

fn write_payment_means(w: &mut XmlWriter, payment: &PaymentInstructions) -> Result<(), InvoiceError> {
    w.start_element("ram:SpecifiedTradeSettlementPaymentMeans")?;
    w.text_element("ram:TypeCode", &payment.means_code.code().to_string())?;
    if let Some(text) = &payment.means_text {
        w.text_element("ram:Information", text)?;
    }
    if let Some(ct) = &payment.credit_transfer {
        w.start_element("ram:PayeePartyCreditorFinancialAccount")?;
        w.text_element("ram:IBANID", &ct.iban)?;
        if let Some(name) = &ct.account_name {
            w.text_element("ram:AccountName", name)?;
        }
        w.end_element("ram:PayeePartyCreditorFinancialAccount")?;
        if let Some(bic) = &ct.bic {
            w.start_element("ram:PayeeSpecifiedCreditorFinancialInstitution")?;
            w.text_element("ram:BICID", bic)?;
            w.end_element("ram:PayeeSpecifiedCreditorFinancialInstitution")?;
        }
    }
    w.end_element("ram:SpecifiedTradeSettlementPaymentMeans")?;
    Ok(())
}

fn require_legal_id(party: &Party, role: &str) -> Result<(), InvoiceError> {
    match &party.legal_id {
        Some(id) if !id.value.trim().is_empty() => Ok(()),
        _ => Err(InvoiceError::missing(
            format!("{role}.legal_id"),
            format!("{role} '{}' has no legal registration identifier", party.name),
        )),
    }
}

fn write_party(w: &mut XmlWriter, party: &Party, element: &str) -> Result<(), InvoiceError> {
    // CII schema requires strict element order within TradeParty:
    // GlobalID → Name → SpecifiedLegalOrganization → PostalTradeAddress →
    // URIUniversalCommunication → SpecifiedTaxRegistration
    w.start_element(element)?;

    if let Some(id) = &party.global_id {
        write_identifier(w, "ram:GlobalID", id)?;
    }
    w.text_element("ram:Name", &party.name)?;

    if let Some(legal) = &party.legal_id {
        w.start_element("ram:SpecifiedLegalOrganization")?;
        write_identifier(w, "ram:ID", legal)?;
        if let Some(tn) = &party.trading_name {
            w.text_element("ram:TradingBusinessName", tn)?;
        }
        w.end_element("ram:SpecifiedLegalOrganization")?;
    }

    let address = &party.address;
    w.start_element("ram:PostalTradeAddress")?;
    if let Some(pc) = &address.postal_code {
        w.text_element("ram:PostcodeCode", pc)?;
    }
    for (element, line) in ["ram:LineOne", "ram:LineTwo", "ram:LineThree"]
        .into_iter()
        .zip(&address.lines)
    {
        w.text_element(element, line)?;
    }
    if let Some(city) = &address.city {
        w.text_element("ram:CityName", city)?;
    }
    if let Some(country) = &address.country_code {
        w.text_element("ram:CountryID", country)?;
    }
    w.end_element("ram:PostalTradeAddress")?;

    if let Some(ea) = &party.electronic_address {
        w.start_element("ram:URIUniversalCommunication")?;
        write_identifier(w, "ram:URIID", ea)?;
        w.end_element("ram:URIUniversalCommunication")?;
    }

    // Tax registrations (must come LAST per CII schema)
    if let Some(vat_id) = &party.vat_id {
        w.start_element("ram:SpecifiedTaxRegistration")?;
        w.text_element_with_attrs("ram:ID", vat_id, &[("schemeID", "VA")])?;
        w.end_element("ram:SpecifiedTaxRegistration")?;
    }
    if let Some(tax_num) = &party.tax_number {
        w.start_element("ram:SpecifiedTaxRegistration")?;
        w.text_element_with_attrs("ram:ID", tax_num, &[("schemeID", "FC")])?;
        w.end_element("ram:SpecifiedTaxRegistration")?;
    }

    w.end_element(element)?;
    Ok(())
}

fn write_identifier(w: &mut XmlWriter, element: &str, id: &Identifier) -> Result<(), InvoiceError> {
    match &id.scheme {
        Some(scheme) => w.text_element_with_attrs(element, &id.value, &[("schemeID", scheme.as_str())])?,
        None => w.text_element(element, &id.value)?,
    };
    Ok(())
}

fn write_line(
    w: &mut XmlWriter,
    line: &InvoiceLine,
    amounts: &LineAmounts,
) -> Result<(), InvoiceError> {
    w.start_element("ram:IncludedSupplyChainTradeLineItem")?;

    w.start_element("ram:AssociatedDocumentLineDocument")?;
    w.text_element("ram:LineID", &line.id)?;
    w.end_element("ram:AssociatedDocumentLineDocument")?;

    w.start_element("ram:SpecifiedTradeProduct")?;
    if let Some(sid) = &line.seller_item_id {
        w.text_element("ram:SellerAssignedID", sid)?;
    }
    w.text_element("ram:Name", &line.name)?;
    if let Some(desc) = &line.description {
        w.text_element("ram:Description", desc)?;
    }
    w.end_element("ram:SpecifiedTradeProduct")?;

    // BG-29: Price details. No price discount is modelled, so the gross
    // price equals the net price.
    w.start_element("ram:SpecifiedLineTradeAgreement")?;
    if let Some(order_line) = &line.order_line_reference {
        w.start_element("ram:BuyerOrderReferencedDocument")?;
        w.text_element("ram:LineID", order_line)?;
        w.end_element("ram:BuyerOrderReferencedDocument")?;
    }
    for element in ["ram:GrossPriceProductTradePrice", "ram:NetPriceProductTradePrice"] {
        w.start_element(element)?;
        w.text_element("ram:ChargeAmount", &format_decimal(line.price))?;
        if let Some(bq) = line.base_quantity {
            w.quantity_element("ram:BasisQuantity", bq, &line.unit)?;
        }
        w.end_element(element)?;
    }
    w.end_element("ram:SpecifiedLineTradeAgreement")?;

    w.start_element("ram:SpecifiedLineTradeDelivery")?;
    w.quantity_element("ram:BilledQuantity", line.quantity, &line.unit)?;
    w.end_element("ram:SpecifiedLineTradeDelivery")?;

    w.start_element("ram:SpecifiedLineTradeSettlement")?;
    w.start_element("ram:ApplicableTradeTax")?;
    w.text_element("ram:TypeCode", "VAT")?;
    write_classification(w, line.vat_category, line.vat_rate)?;
    w.end_element("ram:ApplicableTradeTax")?;

    // BG-26: Line invoicing period
    if let Some(period) = &line.period {
        w.start_element("ram:BillingSpecifiedPeriod")?;
        w.date_element("ram:StartDateTime", period.start)?;
        w.date_element("ram:EndDateTime", period.end)?;
        w.end_element("ram:BillingSpecifiedPeriod")?;
    }

    // BG-27/BG-28: Line allowances and charges
    let items = line
        .allowances
        .iter()
        .zip(&amounts.allowances)
        .map(|(item, amount)| (false, item, *amount))
        .chain(
            line.charges
                .iter()
                .zip(&amounts.charges)
                .map(|(item, amount)| (true, item, *amount)),
        );
    for (is_charge, item, amount) in items {
        w.start_element("ram:SpecifiedTradeAllowanceCharge")?;
        write_indicator(w, is_charge)?;
        if let Some(pct) = item.percent() {
            w.text_element("ram:CalculationPercent", &format_decimal(pct))?;
            w.amount_element("ram:BasisAmount", amounts.net_before_adjustments)?;
        }
        w.amount_element("ram:ActualAmount", amount)?;
        write_reason(w, item.reason_code.as_deref(), item.reason.as_deref())?;
        w.end_element("ram:SpecifiedTradeAllowanceCharge")?;
    }

    w.start_element("ram:SpecifiedTradeSettlementLineMonetarySummation")?;
    w.amount_element("ram:LineTotalAmount", amounts.net_amount)?;
    w.end_element("ram:SpecifiedTradeSettlementLineMonetarySummation")?;
    if let Some(account) = &line.buyer_accounting_reference {
        w.start_element("ram:ReceivableSpecifiedTradeAccountingAccount")?;
        w.text_element("ram:ID", account)?;
        w.end_element("ram:ReceivableSpecifiedTradeAccountingAccount")?;
    }
    w.end_element("ram:SpecifiedLineTradeSettlement")?;

    w.end_element("ram:IncludedSupplyChainTradeLineItem")?;
    Ok(())
}

/// BG-23, with the BT-7 tax point date on every bucket.
fn write_breakdown(
    w: &mut XmlWriter,
    computation: &TaxComputation,
    tax_point_date: Option<NaiveDate>,
) -> Result<(), InvoiceError> {
    for bucket in &computation.totals.vat_breakdown {
        w.start_element("ram:ApplicableTradeTax")?;
        w.amount_element("ram:CalculatedAmount", bucket.tax_amount)?;
        w.text_element("ram:TypeCode", "VAT")?;
        w.amount_element("ram:BasisAmount", bucket.taxable_amount)?;
        if let Some(category) = bucket.category {
            w.text_element("ram:CategoryCode", category.code())?;
        }
        if let Some(date) = tax_point_date {
            w.date_string_element("ram:TaxPointDate", date)?;
        }
        if let Some(rate) = bucket.rate {
            w.text_element("ram:RateApplicablePercent", &format_decimal(rate))?;
        }
        w.end_element("ram:ApplicableTradeTax")?;
    }
    Ok(())
}

/// One BG-20/BG-21 record per prorated share.
fn write_header_share(w: &mut XmlWriter, share: &AllowanceChargeShare) -> Result<(), InvoiceError> {
    w.start_element("ram:SpecifiedTradeAllowanceCharge")?;
    write_indicator(w, share.kind.is_charge())?;
    if let Some(pct) = share.percent {
        w.text_element("ram:CalculationPercent", &format_decimal(pct))?;
    }
    if let Some(basis) = share.basis_amount {
        w.amount_element("ram:BasisAmount", basis)?;
    }
    w.amount_element("ram:ActualAmount", share.amount)?;
    write_reason(w, share.reason_code.as_deref(), share.reason.as_deref())?;
    w.start_element("ram:CategoryTradeTax")?;
    w.text_element("ram:TypeCode", "VAT")?;
    write_classification(w, share.vat_category, share.vat_rate)?;
    w.end_element("ram:CategoryTradeTax")?;
    w.end_element("ram:SpecifiedTradeAllowanceCharge")?;
    Ok(())
}

fn write_indicator(w: &mut XmlWriter, is_charge: bool) -> Result<(), InvoiceError> {
    w.start_element("ram:ChargeIndicator")?;
    w.text_element("udt:Indicator", if is_charge { "true" } else { "false" })?;
    w.end_element("ram:ChargeIndicator")?;
    Ok(())
}

fn write_reason(
    w: &mut XmlWriter,
    code: Option<&str>,
    reason: Option<&str>,
) -> Result<(), InvoiceError> {
    if let Some(code) = code {
        w.text_element("ram:ReasonCode", code)?;
    }
    if let Some(reason) = reason {
        w.text_element("ram:Reason", reason)?;
    }
    Ok(())
}

/// CategoryCode and RateApplicablePercent, each only when known. A bucket
/// without rate is written without RateApplicablePercent.
fn write_classification(
    w: &mut XmlWriter,
    category: Option<TaxCategory>,
    rate: Option<Decimal>,
) -> Result<(), InvoiceError> {
    if let Some(category) = category {
        w.text_element("ram:CategoryCode", category.code())?;
    }
    if let Some(rate) = rate {
        w.text_element("ram:RateApplicablePercent", &format_decimal(rate))?;
    }
    Ok(())
}
