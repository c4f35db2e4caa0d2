use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::error::{InvoiceError, join_errors};
use super::types::*;
use super::validation;

/// Builder for constructing valid invoices.
///
/// ```
/// use vatsplit::core::*;
/// use rust_decimal_macros::dec;
/// use chrono::NaiveDate;
///
/// let invoice = InvoiceBuilder::new("FA-2024-001", NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
///     .seller(PartyBuilder::new("ACME SAS", AddressBuilder::new("Paris", "75001", "FR").build())
///         .legal_id("0002", "123456789")
///         .vat_id("FR12123456789")
///         .build())
///     .buyer(PartyBuilder::new("Client SARL", AddressBuilder::new("Lyon", "69001", "FR").build())
///         .legal_id("0002", "987654321")
///         .build())
///     .add_line(InvoiceLineBuilder::new("1", "Conseil", dec!(10), "HUR", dec!(150.00))
///         .vat(TaxCategory::StandardRate, dec!(20))
///         .build())
///     .add_charge(AllowanceCharge::fixed(dec!(25)).reason("Frais de port"))
///     .build()
///     .unwrap();
///
/// assert_eq!(invoice.compute_tax().totals.tax_basis_total, dec!(1525.00));
/// ```
pub struct InvoiceBuilder {
    number: String,
    issue_date: NaiveDate,
    due_date: Option<NaiveDate>,
    type_code: InvoiceTypeCode,
    currency_code: String,
    tax_currency_code: Option<String>,
    specification: Option<String>,
    notes: Vec<String>,
    buyer_reference: Option<String>,
    contract_reference: Option<String>,
    order_reference: Option<String>,
    sales_order_reference: Option<String>,
    buyer_accounting_reference: Option<String>,
    seller: Option<Party>,
    buyer: Option<Party>,
    delivery_date: Option<NaiveDate>,
    tax_point_date: Option<NaiveDate>,
    payment_terms: Option<String>,
    payment: Option<PaymentInstructions>,
    prepaid_amount: Option<Decimal>,
    rounding_amount: Option<Decimal>,
    lines: Vec<InvoiceLine>,
    allowances: Vec<AllowanceCharge>,
    charges: Vec<AllowanceCharge>,
}

impl InvoiceBuilder {
    pub fn new(number: impl Into<String>, issue_date: NaiveDate) -> Self {
        Self {
            number: number.into(),
            issue_date,
            due_date: None,
            type_code: InvoiceTypeCode::Invoice,
            currency_code: "EUR".to_string(),
            tax_currency_code: None,
            specification: None,
            notes: Vec::new(),
            buyer_reference: None,
            contract_reference: None,
            order_reference: None,
            sales_order_reference: None,
            buyer_accounting_reference: None,
            seller: None,
            buyer: None,
            delivery_date: None,
            tax_point_date: None,
            payment_terms: None,
            payment: None,
            prepaid_amount: None,
            rounding_amount: None,
            lines: Vec::new(),
            allowances: Vec::new(),
            charges: Vec::new(),
        }
    }

    pub fn due_date(mut self, date: NaiveDate) -> Self {
        self.due_date = Some(date);
        self
    }

    pub fn type_code(mut self, code: InvoiceTypeCode) -> Self {
        self.type_code = code;
        self
    }

    pub fn currency(mut self, code: impl Into<String>) -> Self {
        self.currency_code = code.into();
        self
    }

    /// BT-6, when VAT is accounted in another currency.
    pub fn tax_currency(mut self, code: impl Into<String>) -> Self {
        self.tax_currency_code = Some(code.into());
        self
    }

    /// BT-24, e.g. `urn:cen.eu:en16931:2017`.
    pub fn specification(mut self, id: impl Into<String>) -> Self {
        self.specification = Some(id.into());
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn buyer_reference(mut self, reference: impl Into<String>) -> Self {
        self.buyer_reference = Some(reference.into());
        self
    }

    pub fn contract_reference(mut self, reference: impl Into<String>) -> Self {
        self.contract_reference = Some(reference.into());
        self
    }

    pub fn order_reference(mut self, reference: impl Into<String>) -> Self {
        self.order_reference = Some(reference.into());
        self
    }

    pub fn sales_order_reference(mut self, reference: impl Into<String>) -> Self {
        self.sales_order_reference = Some(reference.into());
        self
    }

    pub fn buyer_accounting_reference(mut self, reference: impl Into<String>) -> Self {
        self.buyer_accounting_reference = Some(reference.into());
        self
    }

    pub fn seller(mut self, party: Party) -> Self {
        self.seller = Some(party);
        self
    }

    pub fn buyer(mut self, party: Party) -> Self {
        self.buyer = Some(party);
        self
    }

    pub fn delivery_date(mut self, date: NaiveDate) -> Self {
        self.delivery_date = Some(date);
        self
    }

    pub fn tax_point_date(mut self, date: NaiveDate) -> Self {
        self.tax_point_date = Some(date);
        self
    }

    pub fn payment_terms(mut self, terms: impl Into<String>) -> Self {
        self.payment_terms = Some(terms.into());
        self
    }

    pub fn payment(mut self, payment: PaymentInstructions) -> Self {
        self.payment = Some(payment);
        self
    }

    /// BT-113: amount already paid, deducted from the amount due.
    pub fn prepaid_amount(mut self, amount: Decimal) -> Self {
        self.prepaid_amount = Some(amount);
        self
    }

    /// BT-114: rounding added to the amount due.
    pub fn rounding_amount(mut self, amount: Decimal) -> Self {
        self.rounding_amount = Some(amount);
        self
    }

    pub fn add_line(mut self, line: InvoiceLine) -> Self {
        self.lines.push(line);
        self
    }

    pub fn add_allowance(mut self, allowance: AllowanceCharge) -> Self {
        self.allowances.push(allowance);
        self
    }

    pub fn add_charge(mut self, charge: AllowanceCharge) -> Self {
        self.charges.push(charge);
        self
    }

    /// Build the invoice and run structural validation.
    /// Returns all validation errors (not just the first).
    pub fn build(self) -> Result<Invoice, InvoiceError> {
        // Input limits to prevent abuse
        if self.lines.len() > 10_000 {
            return Err(InvoiceError::Builder(
                "invoice cannot have more than 10,000 lines".into(),
            ));
        }
        if self.number.len() > 200 {
            return Err(InvoiceError::Builder(
                "invoice number cannot exceed 200 characters".into(),
            ));
        }

        let invoice = self.build_unchecked();

        let errors = validation::validate_invoice(&invoice);
        if !errors.is_empty() {
            return Err(InvoiceError::Validation(join_errors(&errors)));
        }

        Ok(invoice)
    }

    /// Build without validation, for data imported from elsewhere.
    ///
    /// Run [`validate_ranges`](validation::validate_ranges) before computing
    /// tax on such an invoice: amounts beyond those limits can overflow.
    pub fn build_unchecked(self) -> Invoice {
        Invoice {
            number: self.number,
            issue_date: self.issue_date,
            due_date: self.due_date,
            type_code: self.type_code,
            currency_code: self.currency_code,
            tax_currency_code: self.tax_currency_code,
            specification: self.specification,
            notes: self.notes,
            buyer_reference: self.buyer_reference,
            contract_reference: self.contract_reference,
            order_reference: self.order_reference,
            sales_order_reference: self.sales_order_reference,
            buyer_accounting_reference: self.buyer_accounting_reference,
            seller: self.seller,
            buyer: self.buyer,
            delivery_date: self.delivery_date,
            tax_point_date: self.tax_point_date,
            payment_terms: self.payment_terms,
            payment: self.payment,
            prepaid_amount: self.prepaid_amount,
            rounding_amount: self.rounding_amount,
            lines: self.lines,
            allowances: self.allowances,
            charges: self.charges,
        }
    }
}

/// Builder for Party (seller/buyer).
pub struct PartyBuilder {
    name: String,
    global_id: Option<Identifier>,
    legal_id: Option<Identifier>,
    trading_name: Option<String>,
    vat_id: Option<String>,
    tax_number: Option<String>,
    address: Address,
    electronic_address: Option<Identifier>,
}

impl PartyBuilder {
    pub fn new(name: impl Into<String>, address: Address) -> Self {
        Self {
            name: name.into(),
            global_id: None,
            legal_id: None,
            trading_name: None,
            vat_id: None,
            tax_number: None,
            address,
            electronic_address: None,
        }
    }

    /// BT-29 / BT-46, e.g. scheme "0088" for a GLN.
    pub fn global_id(mut self, scheme: impl Into<String>, value: impl Into<String>) -> Self {
        self.global_id = Some(Identifier {
            value: value.into(),
            scheme: Some(scheme.into()),
        });
        self
    }

    /// BT-30 / BT-47, e.g. scheme "0002" for a SIREN.
    pub fn legal_id(mut self, scheme: impl Into<String>, value: impl Into<String>) -> Self {
        self.legal_id = Some(Identifier {
            value: value.into(),
            scheme: Some(scheme.into()),
        });
        self
    }

    pub fn trading_name(mut self, name: impl Into<String>) -> Self {
        self.trading_name = Some(name.into());
        self
    }

    pub fn vat_id(mut self, id: impl Into<String>) -> Self {
        self.vat_id = Some(id.into());
        self
    }

    pub fn tax_number(mut self, num: impl Into<String>) -> Self {
        self.tax_number = Some(num.into());
        self
    }

    pub fn electronic_address(
        mut self,
        scheme: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.electronic_address = Some(Identifier {
            value: value.into(),
            scheme: Some(scheme.into()),
        });
        self
    }

    pub fn build(self) -> Party {
        Party {
            name: self.name,
            global_id: self.global_id,
            legal_id: self.legal_id,
            trading_name: self.trading_name,
            vat_id: self.vat_id,
            tax_number: self.tax_number,
            address: self.address,
            electronic_address: self.electronic_address,
        }
    }
}

/// Builder for Address.
pub struct AddressBuilder {
    lines: Vec<String>,
    city: String,
    postal_code: String,
    country_code: String,
}

impl AddressBuilder {
    pub fn new(
        city: impl Into<String>,
        postal_code: impl Into<String>,
        country_code: impl Into<String>,
    ) -> Self {
        Self {
            lines: Vec::new(),
            city: city.into(),
            postal_code: postal_code.into(),
            country_code: country_code.into(),
        }
    }

    /// Append a street line. Only the first three are written.
    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    pub fn build(self) -> Address {
        Address {
            lines: self.lines,
            city: Some(self.city),
            postal_code: Some(self.postal_code),
            country_code: Some(self.country_code),
        }
    }
}

/// Builder for InvoiceLine.
///
/// A line starts without VAT classification; call [`vat`](Self::vat) or
/// [`exempt`](Self::exempt) to place it in a bucket.
pub struct InvoiceLineBuilder {
    id: String,
    name: String,
    description: Option<String>,
    seller_item_id: Option<String>,
    quantity: Decimal,
    unit: String,
    price: Decimal,
    base_quantity: Option<Decimal>,
    vat_category: Option<TaxCategory>,
    vat_rate: Option<Decimal>,
    allowances: Vec<AllowanceCharge>,
    charges: Vec<AllowanceCharge>,
    period: Option<Period>,
    order_line_reference: Option<String>,
    buyer_accounting_reference: Option<String>,
}

impl InvoiceLineBuilder {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        quantity: Decimal,
        unit: impl Into<String>,
        price: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            seller_item_id: None,
            quantity,
            unit: unit.into(),
            price,
            base_quantity: None,
            vat_category: None,
            vat_rate: None,
            allowances: Vec::new(),
            charges: Vec::new(),
            period: None,
            order_line_reference: None,
            buyer_accounting_reference: None,
        }
    }

    pub fn vat(mut self, category: TaxCategory, rate: Decimal) -> Self {
        self.vat_category = Some(category);
        self.vat_rate = Some(rate);
        self
    }

    /// Classify the line without a rate. Its bucket is kept in the
    /// breakdown but never carries tax.
    pub fn exempt(mut self, category: TaxCategory) -> Self {
        self.vat_category = Some(category);
        self.vat_rate = None;
        self
    }

    pub fn base_quantity(mut self, quantity: Decimal) -> Self {
        self.base_quantity = Some(quantity);
        self
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn seller_item_id(mut self, id: impl Into<String>) -> Self {
        self.seller_item_id = Some(id.into());
        self
    }

    pub fn period(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.period = Some(Period { start, end });
        self
    }

    /// BT-132: line of the buyer's purchase order.
    pub fn order_line_reference(mut self, reference: impl Into<String>) -> Self {
        self.order_line_reference = Some(reference.into());
        self
    }

    /// BT-133
    pub fn buyer_accounting_reference(mut self, reference: impl Into<String>) -> Self {
        self.buyer_accounting_reference = Some(reference.into());
        self
    }

    pub fn add_allowance(mut self, allowance: AllowanceCharge) -> Self {
        self.allowances.push(allowance);
        self
    }

    pub fn add_charge(mut self, charge: AllowanceCharge) -> Self {
        self.charges.push(charge);
        self
    }

    pub fn build(self) -> InvoiceLine {
        InvoiceLine {
            id: self.id,
            name: self.name,
            description: self.description,
            seller_item_id: self.seller_item_id,
            quantity: self.quantity,
            unit: self.unit,
            price: self.price,
            base_quantity: self.base_quantity,
            vat_category: self.vat_category,
            vat_rate: self.vat_rate,
            allowances: self.allowances,
            charges: self.charges,
            period: self.period,
            order_line_reference: self.order_line_reference,
            buyer_accounting_reference: self.buyer_accounting_reference,
        }
    }
}
