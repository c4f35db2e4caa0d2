use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// BG-0: Invoice, the top-level document.
///
/// Totals are never stored on the invoice. Call [`Invoice::compute_tax`]
/// to derive them; the result is a fresh value on every call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    /// BT-1: Invoice number.
    pub number: String,
    /// BT-2: Invoice issue date.
    pub issue_date: NaiveDate,
    /// BT-9: Payment due date.
    pub due_date: Option<NaiveDate>,
    /// BT-3: Invoice type code (UNTDID 1001).
    pub type_code: InvoiceTypeCode,
    /// BT-5: Invoice currency code (ISO 4217, e.g. "EUR").
    pub currency_code: String,
    /// BT-6: VAT accounting currency code, when it differs from BT-5.
    pub tax_currency_code: Option<String>,
    /// BT-24: Specification identifier.
    pub specification: Option<String>,
    /// BT-22: Note / free text.
    pub notes: Vec<String>,
    /// BT-10: Buyer reference.
    pub buyer_reference: Option<String>,
    /// BT-12: Contract reference.
    pub contract_reference: Option<String>,
    /// BT-13: Purchase order reference.
    pub order_reference: Option<String>,
    /// BT-14: Sales order reference.
    pub sales_order_reference: Option<String>,
    /// BT-19: Buyer accounting reference.
    pub buyer_accounting_reference: Option<String>,
    /// BG-4: Seller.
    pub seller: Option<Party>,
    /// BG-7: Buyer.
    pub buyer: Option<Party>,
    /// BT-72: Actual delivery date.
    pub delivery_date: Option<NaiveDate>,
    /// BT-7: VAT point date.
    pub tax_point_date: Option<NaiveDate>,
    /// BT-20: Payment terms free text.
    pub payment_terms: Option<String>,
    /// BG-16: Payment instructions.
    pub payment: Option<PaymentInstructions>,
    /// BT-113: Amount already paid. Deducted from the amount due only.
    pub prepaid_amount: Option<Decimal>,
    /// BT-114: Rounding added to the amount due.
    pub rounding_amount: Option<Decimal>,
    /// BG-25: Invoice lines.
    pub lines: Vec<InvoiceLine>,
    /// BG-20: Document-level allowances.
    pub allowances: Vec<AllowanceCharge>,
    /// BG-21: Document-level charges.
    pub charges: Vec<AllowanceCharge>,
}

/// BG-25: Invoice line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLine {
    /// BT-126: Line identifier.
    pub id: String,
    /// BT-153: Item name.
    pub name: String,
    /// BT-154: Item description.
    pub description: Option<String>,
    /// BT-155: Seller's item identifier.
    pub seller_item_id: Option<String>,
    /// BT-129: Invoiced quantity.
    pub quantity: Decimal,
    /// BT-130: Unit of measure (UNECE Rec 20, e.g. "C62" for piece).
    pub unit: String,
    /// BT-146: Item net price.
    pub price: Decimal,
    /// BT-149: Item price base quantity. `None` means 1.
    pub base_quantity: Option<Decimal>,
    /// BT-151: VAT category. `None` for unclassified lines.
    pub vat_category: Option<TaxCategory>,
    /// BT-152: VAT rate in percent. `None` for exempt/unclassified lines.
    pub vat_rate: Option<Decimal>,
    /// BG-27: Line allowances, in document order.
    pub allowances: Vec<AllowanceCharge>,
    /// BG-28: Line charges, in document order.
    pub charges: Vec<AllowanceCharge>,
    /// BG-26: Line invoicing period.
    pub period: Option<Period>,
    /// BT-132: Referenced purchase order line.
    pub order_line_reference: Option<String>,
    /// BT-133: Buyer accounting reference for this line.
    pub buyer_accounting_reference: Option<String>,
}

impl InvoiceLine {
    /// Divisor applied to the price. A zero, negative or missing base
    /// quantity counts as 1.
    pub fn effective_base_quantity(&self) -> Decimal {
        match self.base_quantity {
            Some(q) if q > Decimal::ZERO => q,
            _ => Decimal::ONE,
        }
    }
}

/// The amount of an allowance or charge: a percentage of some basis, or a
/// literal amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdjustmentAmount {
    /// Percent of the basis (e.g. `10` for 10%).
    Percentage(Decimal),
    /// Literal amount in document currency.
    Fixed(Decimal),
}

/// BG-20/BG-21/BG-27/BG-28: allowance or charge, at line or document level.
///
/// Whether it is an allowance or a charge is given by the list it is stored
/// in, not by the value itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllowanceCharge {
    /// BT-94/BT-101 (percentage) or BT-92/BT-99 (fixed amount).
    pub amount: AdjustmentAmount,
    /// BT-98/BT-105: Reason code (UNTDID 5189 for allowances, 7161 for charges).
    pub reason_code: Option<String>,
    /// BT-97/BT-104: Reason text.
    pub reason: Option<String>,
    /// BT-95/BT-102: VAT category override.
    pub vat_category: Option<TaxCategory>,
    /// BT-96/BT-103: VAT rate override.
    pub vat_rate: Option<Decimal>,
}

impl AllowanceCharge {
    /// Allowance or charge of a literal amount.
    pub fn fixed(amount: Decimal) -> Self {
        Self::new(AdjustmentAmount::Fixed(amount))
    }

    /// Allowance or charge of `percent` percent of its basis.
    pub fn percentage(percent: Decimal) -> Self {
        Self::new(AdjustmentAmount::Percentage(percent))
    }

    fn new(amount: AdjustmentAmount) -> Self {
        Self {
            amount,
            reason_code: None,
            reason: None,
            vat_category: None,
            vat_rate: None,
        }
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn reason_code(mut self, code: impl Into<String>) -> Self {
        self.reason_code = Some(code.into());
        self
    }

    /// Pin the VAT classification. At document level this restricts
    /// proration to the matching VAT bucket.
    pub fn vat(mut self, category: TaxCategory, rate: Decimal) -> Self {
        self.vat_category = Some(category);
        self.vat_rate = Some(rate);
        self
    }

    pub fn is_percentage(&self) -> bool {
        matches!(self.amount, AdjustmentAmount::Percentage(_))
    }

    /// The percentage, if this is a percentage item.
    pub fn percent(&self) -> Option<Decimal> {
        match self.amount {
            AdjustmentAmount::Percentage(p) => Some(p),
            AdjustmentAmount::Fixed(_) => None,
        }
    }

    /// Unrounded amount against `basis`: `basis × pct / 100` for
    /// percentages, the literal amount otherwise.
    pub fn effective_amount(&self, basis: Decimal) -> Decimal {
        match self.amount {
            AdjustmentAmount::Percentage(p) => basis * p / dec!(100),
            AdjustmentAmount::Fixed(a) => a,
        }
    }
}

/// BG-4 / BG-7: Party (seller or buyer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    /// BT-27 / BT-44: Name.
    pub name: String,
    /// BT-29 / BT-46: Global identifier with scheme (e.g. GLN "0088").
    pub global_id: Option<Identifier>,
    /// BT-30 / BT-47: Legal registration identifier (e.g. SIREN "0002").
    pub legal_id: Option<Identifier>,
    /// BT-28 / BT-45: Trading name.
    pub trading_name: Option<String>,
    /// BT-31 / BT-48: VAT identifier.
    pub vat_id: Option<String>,
    /// BT-32: Tax registration number.
    pub tax_number: Option<String>,
    /// BG-5 / BG-8: Postal address.
    pub address: Address,
    /// BT-34 / BT-49: Electronic address.
    pub electronic_address: Option<Identifier>,
}

/// Identifier value with an optional scheme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    pub value: String,
    pub scheme: Option<String>,
}

impl Identifier {
    pub fn new(value: impl Into<String>, scheme: Option<&str>) -> Self {
        Self {
            value: value.into(),
            scheme: scheme.map(String::from),
        }
    }
}

/// BG-5 / BG-8: Postal address.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Address {
    /// BT-35..BT-162 / BT-50..BT-163: Address lines, at most three are written.
    pub lines: Vec<String>,
    /// BT-37 / BT-52: City.
    pub city: Option<String>,
    /// BT-38 / BT-53: Postal code.
    pub postal_code: Option<String>,
    /// BT-40 / BT-55: Country code (ISO 3166-1 alpha-2).
    pub country_code: Option<String>,
}

/// UNTDID 5305 VAT category codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaxCategory {
    /// S: Standard rate.
    StandardRate,
    /// Z: Zero rated goods.
    ZeroRated,
    /// E: Exempt from tax.
    Exempt,
    /// AE: Reverse charge.
    ReverseCharge,
    /// K: Intra-community supply.
    IntraCommunitySupply,
    /// G: Export outside the EU.
    Export,
    /// O: Not subject to VAT.
    NotSubjectToVat,
    /// L: Canary Islands general indirect tax.
    CanaryIslands,
    /// M: Ceuta and Melilla tax.
    CeutaMelilla,
}

impl TaxCategory {
    /// UNTDID 5305 code letter.
    pub fn code(&self) -> &'static str {
        match self {
            Self::StandardRate => "S",
            Self::ZeroRated => "Z",
            Self::Exempt => "E",
            Self::ReverseCharge => "AE",
            Self::IntraCommunitySupply => "K",
            Self::Export => "G",
            Self::NotSubjectToVat => "O",
            Self::CanaryIslands => "L",
            Self::CeutaMelilla => "M",
        }
    }

    /// Parse from UNTDID 5305 code string.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "S" => Some(Self::StandardRate),
            "Z" => Some(Self::ZeroRated),
            "E" => Some(Self::Exempt),
            "AE" => Some(Self::ReverseCharge),
            "K" => Some(Self::IntraCommunitySupply),
            "G" => Some(Self::Export),
            "O" => Some(Self::NotSubjectToVat),
            "L" => Some(Self::CanaryIslands),
            "M" => Some(Self::CeutaMelilla),
            _ => None,
        }
    }
}

/// UNTDID 1001 invoice type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceTypeCode {
    /// 380: Commercial invoice.
    Invoice,
    /// 381: Credit note.
    CreditNote,
    /// 384: Corrected invoice.
    Corrected,
    /// 386: Prepayment invoice.
    Prepayment,
    /// 389: Self-billed invoice.
    SelfBilled,
}

impl InvoiceTypeCode {
    /// UNTDID 1001 numeric code.
    pub fn code(&self) -> u16 {
        match self {
            Self::Invoice => 380,
            Self::CreditNote => 381,
            Self::Corrected => 384,
            Self::Prepayment => 386,
            Self::SelfBilled => 389,
        }
    }

    /// Parse from UNTDID 1001 numeric code.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            380 => Some(Self::Invoice),
            381 => Some(Self::CreditNote),
            384 => Some(Self::Corrected),
            386 => Some(Self::Prepayment),
            389 => Some(Self::SelfBilled),
            _ => None,
        }
    }
}

/// BG-16: Payment instructions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInstructions {
    /// BT-81: Payment means type code (UNTDID 4461).
    pub means_code: PaymentMeansCode,
    /// BT-82: Payment means text.
    pub means_text: Option<String>,
    /// BT-83: Remittance information.
    pub remittance_info: Option<String>,
    /// BG-17: Credit transfer account.
    pub credit_transfer: Option<CreditTransfer>,
}

impl PaymentInstructions {
    pub fn new(means_code: PaymentMeansCode) -> Self {
        Self {
            means_code,
            means_text: None,
            remittance_info: None,
            credit_transfer: None,
        }
    }

    pub fn means_text(mut self, text: impl Into<String>) -> Self {
        self.means_text = Some(text.into());
        self
    }

    pub fn remittance_info(mut self, info: impl Into<String>) -> Self {
        self.remittance_info = Some(info.into());
        self
    }

    pub fn credit_transfer(mut self, transfer: CreditTransfer) -> Self {
        self.credit_transfer = Some(transfer);
        self
    }
}

/// BG-17: Credit transfer account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditTransfer {
    /// BT-84: Account identifier, usually an IBAN.
    pub iban: String,
    /// BT-85: Account name.
    pub account_name: Option<String>,
    /// BT-86: Service provider identifier (BIC).
    pub bic: Option<String>,
}

/// UNTDID 4461 payment means codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMeansCode {
    /// 1: Instrument not defined.
    NotDefined,
    /// 10: Cash.
    Cash,
    /// 30: Credit transfer.
    CreditTransfer,
    /// 42: Payment to bank account.
    PaymentToBankAccount,
    /// 48: Bank card.
    BankCard,
    /// 49: Direct debit.
    DirectDebit,
    /// 58: SEPA credit transfer.
    SepaCreditTransfer,
    /// 59: SEPA direct debit.
    SepaDirectDebit,
    /// Any other code.
    Other(u16),
}

impl PaymentMeansCode {
    pub fn code(&self) -> u16 {
        match self {
            Self::NotDefined => 1,
            Self::Cash => 10,
            Self::CreditTransfer => 30,
            Self::PaymentToBankAccount => 42,
            Self::BankCard => 48,
            Self::DirectDebit => 49,
            Self::SepaCreditTransfer => 58,
            Self::SepaDirectDebit => 59,
            Self::Other(c) => *c,
        }
    }

    pub fn from_code(code: u16) -> Self {
        match code {
            1 => Self::NotDefined,
            10 => Self::Cash,
            30 => Self::CreditTransfer,
            42 => Self::PaymentToBankAccount,
            48 => Self::BankCard,
            49 => Self::DirectDebit,
            58 => Self::SepaCreditTransfer,
            59 => Self::SepaDirectDebit,
            c => Self::Other(c),
        }
    }
}

/// Invoicing period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    /// BT-134 / BT-73: Start date.
    pub start: NaiveDate,
    /// BT-135 / BT-74: End date.
    pub end: NaiveDate,
}
