//! UN/CEFACT Cross Industry Invoice (CII) generation and parsing.
//!
//! The writer serializes an [`Invoice`](crate::core::Invoice) together with
//! the output of the [`tax`](crate::tax) engine: one `ApplicableTradeTax`
//! per VAT bucket and one `SpecifiedTradeAllowanceCharge` per prorated
//! share, so every amount on the document comes from a single computation.
//!
//! The reader returns the imported invoice along with the figures the
//! document states. Under [`TotalsPolicy::Verify`] those figures are
//! re-derived and any mismatch is an error.
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use rust_decimal_macros::dec;
//! use vatsplit::core::*;
//! use vatsplit::cii::{self, TotalsPolicy};
//!
//! let party = |name: &str, siren: &str| {
//!     PartyBuilder::new(name, AddressBuilder::new("Paris", "75001", "FR").build())
//!         .legal_id("0002", siren)
//!         .build()
//! };
//! let invoice = InvoiceBuilder::new("FA-2024-001", NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
//!     .seller(party("ACME SAS", "123456789"))
//!     .buyer(party("Client SARL", "987654321"))
//!     .add_line(InvoiceLineBuilder::new("1", "Conseil", dec!(1), "HUR", dec!(70))
//!         .vat(TaxCategory::StandardRate, dec!(20))
//!         .build())
//!     .add_line(InvoiceLineBuilder::new("2", "Livres", dec!(1), "C62", dec!(30))
//!         .vat(TaxCategory::StandardRate, dec!(5.5))
//!         .build())
//!     .add_allowance(AllowanceCharge::fixed(dec!(10)).reason("Remise"))
//!     .build()
//!     .unwrap();
//!
//! let xml = cii::to_cii_xml(&invoice).unwrap();
//! assert!(xml.contains("<ram:ActualAmount>7.00</ram:ActualAmount>"));
//!
//! let doc = cii::from_cii_xml_with(&xml, TotalsPolicy::Verify).unwrap();
//! assert_eq!(doc.invoice.number, invoice.number);
//! assert_eq!(doc.stated.grand_total, Some(dec!(104.09)));
//! ```

mod reader;
mod writer;
pub(crate) mod xml_utils;

use serde::{Deserialize, Serialize};

use crate::core::{Invoice, StatedTotals};

pub use reader::{from_cii_xml, from_cii_xml_with};
pub use writer::to_cii_xml;

/// EN 16931 specification identifier (BT-24), written when the invoice
/// carries none.
pub const EN16931_SPECIFICATION_ID: &str = "urn:cen.eu:en16931:2017";

/// CII namespace URIs.
pub mod cii_ns {
    pub const RSM: &str = "urn:un:unece:uncefact:data:standard:CrossIndustryInvoice:100";
    pub const RAM: &str =
        "urn:un:unece:uncefact:data:standard:ReusableAggregateBusinessInformationEntity:100";
    pub const QDT: &str = "urn:un:unece:uncefact:data:standard:QualifiedDataType:100";
    pub const UDT: &str = "urn:un:unece:uncefact:data:standard:UnqualifiedDataType:100";
}

/// What the reader does with the totals a document states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TotalsPolicy {
    /// Return the stated figures as given.
    #[default]
    Trust,
    /// Recompute through the tax engine and reject any mismatch.
    Verify,
}

/// An imported CII document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CiiDocument {
    pub invoice: Invoice,
    /// Figures as written in the document, never recomputed.
    pub stated: StatedTotals,
}
