//! Core invoice types, builders and validation.
//!
//! This module provides the EN 16931 semantic model the [`tax`](crate::tax)
//! engine computes over, and the structural and arithmetic checks applied
//! to invoices and imported documents.

mod builder;
mod error;
mod types;
mod validation;

pub use builder::*;
pub use error::*;
pub use types::*;
pub use validation::*;
