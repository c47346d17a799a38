//! Tax calculations.
//!
//! The building blocks (`brackets`, `credits`, `sbd`, `ledger`) are pure
//! functions and small calculators over [`crate::TaxYearConfig`]. The
//! `entities` module composes them into the eight entity calculators.

pub mod brackets;
pub mod common;
pub mod credits;
pub mod entities;
pub mod ledger;
pub mod sbd;

pub use brackets::{BracketError, compute_bracket_tax, compute_marginal_rate, validate_brackets};
pub use credits::{CreditAggregator, CreditInput, CreditSummary};
pub use entities::{BreakdownLine, EntityInput, EntityResult, Holder, TaxEngine};
pub use ledger::{IntegrationLedger, LedgerActivity, LedgerResult};
pub use sbd::{SbdInput, SbdResult, SmallBusinessDeduction};
