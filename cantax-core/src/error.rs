//! Errors returned by the entity calculators.

use thiserror::Error;

use crate::Province;
use crate::calculations::brackets::BracketError;

/// Conditions under which a calculator returns no result.
///
/// Out-of-range values are never errors: they are clamped and the clamped
/// value is reported on the result instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalcError {
    /// The input was not a record of the expected shape.
    #[error("Invalid input data")]
    InvalidInput,

    #[error("no federal tax brackets in the rate table")]
    MissingFederalRateTable,

    #[error("no tax brackets for province {0}")]
    MissingRateTable(Province),

    #[error("no statutory parameters for province {0}")]
    MissingProvincialParameters(Province),

    #[error("invalid rate table: {0}")]
    InvalidRateTable(#[from] BracketError),
}
