//! Canadian personal and corporate tax computation.
//!
//! All amounts are [`rust_decimal::Decimal`] and every calculation is a pure
//! function of its input, the [`RateTables`] and the [`TaxYearConfig`].

pub mod calculations;
pub mod error;
pub mod lenient;
pub mod models;

pub use calculations::{BreakdownLine, EntityInput, EntityResult, Holder, TaxEngine};
pub use error::CalcError;
pub use models::*;
