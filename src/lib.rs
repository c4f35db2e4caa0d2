//! # vatsplit
//!
//! VAT breakdown and monetary totals for EN 16931 e-invoices.
//!
//! Given invoice lines and document-level allowances/charges, the [`tax`]
//! engine produces VAT buckets and document totals that satisfy the
//! EN 16931 arithmetic rules (BR-CO-10 … BR-CO-16) and survive rounding to
//! the cent: a fixed-amount allowance prorated across several VAT rates is
//! always reconstituted exactly.
//!
//! All monetary values use [`rust_decimal::Decimal`], never floating point.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::NaiveDate;
//! use vatsplit::core::*;
//! use rust_decimal_macros::dec;
//!
//! let invoice = InvoiceBuilder::new("INV-2024-001", NaiveDate::from_ymd_opt(2024, 6, 15).unwrap())
//!     .add_line(InvoiceLineBuilder::new("1", "Consulting", dec!(1), "HUR", dec!(70))
//!         .vat(TaxCategory::StandardRate, dec!(20)).build())
//!     .add_line(InvoiceLineBuilder::new("2", "Books", dec!(1), "C62", dec!(30))
//!         .vat(TaxCategory::StandardRate, dec!(5.5)).build())
//!     .add_allowance(AllowanceCharge::fixed(dec!(10)).reason("Loyalty"))
//!     .build()
//!     .unwrap();
//!
//! let computation = invoice.compute_tax();
//! let shares: Vec<_> = computation.allowances.iter().map(|s| s.amount).collect();
//! assert_eq!(shares, vec![dec!(7.00), dec!(3.00)]);
//! assert_eq!(computation.totals.tax_basis_total, dec!(90.00));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Invoice types, builders, validation, tax engine |
//! | `cii` | UN/CEFACT Cross Industry Invoice generation & parsing |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "core")]
pub mod tax;

#[cfg(feature = "cii")]
pub mod cii;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
