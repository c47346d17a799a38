//! Progressive bracket tax evaluation.
//!
//! A bracket table is a list of [`TaxBracket`]s in ascending order where each
//! bracket starts where the previous one ends. Income that lands exactly on a
//! boundary belongs to the lower bracket, and the last bracket is always
//! treated as unbounded.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use cantax_core::TaxBracket;
//! use cantax_core::calculations::brackets::{compute_bracket_tax, compute_marginal_rate};
//!
//! let brackets = vec![
//!     TaxBracket::new(dec!(0), Some(dec!(55867)), dec!(0.15)),
//!     TaxBracket::new(dec!(55867), Some(dec!(111733)), dec!(0.205)),
//!     TaxBracket::new(dec!(111733), None, dec!(0.26)),
//! ];
//!
//! // 55867 × 15% + (60000 − 55867) × 20.5%
//! assert_eq!(compute_bracket_tax(dec!(60000), &brackets), dec!(9227.32));
//! assert_eq!(compute_marginal_rate(dec!(55867), &brackets), dec!(0.15));
//! assert_eq!(compute_marginal_rate(dec!(55868), &brackets), dec!(0.205));
//! ```

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::warn;

use crate::TaxBracket;
use crate::calculations::common::round_half_up;

/// Structural problems in a bracket table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BracketError {
    #[error("no tax brackets provided")]
    NoTaxBrackets,

    #[error("bracket {index} has rate {rate}, expected a fraction between 0 and 1")]
    InvalidRate { index: usize, rate: Decimal },

    #[error("bracket {index} ends at {max} which is not above its start {min}")]
    EmptyBracket {
        index: usize,
        min: Decimal,
        max: Decimal,
    },

    #[error("bracket {index} starts at {found} but the previous bracket ends at {expected}")]
    Discontinuous {
        index: usize,
        expected: Decimal,
        found: Decimal,
    },

    #[error("bracket {index} is unbounded but is not the last bracket")]
    UnboundedBeforeEnd { index: usize },

    #[error("first bracket starts at negative income {0}")]
    NegativeStart(Decimal),
}

/// Checks that a bracket table is non-empty, ascending, contiguous, has rates
/// in `[0, 1]` and only leaves the last bracket unbounded.
pub fn validate_brackets(brackets: &[TaxBracket]) -> Result<(), BracketError> {
    let first = brackets.first().ok_or(BracketError::NoTaxBrackets)?;
    if first.min_income < Decimal::ZERO {
        return Err(BracketError::NegativeStart(first.min_income));
    }

    let last_index = brackets.len() - 1;
    let mut expected_start = first.min_income;

    for (index, bracket) in brackets.iter().enumerate() {
        if bracket.tax_rate < Decimal::ZERO || bracket.tax_rate > Decimal::ONE {
            return Err(BracketError::InvalidRate {
                index,
                rate: bracket.tax_rate,
            });
        }
        if bracket.min_income != expected_start {
            return Err(BracketError::Discontinuous {
                index,
                expected: expected_start,
                found: bracket.min_income,
            });
        }
        match bracket.max_income {
            Some(max) if max <= bracket.min_income => {
                return Err(BracketError::EmptyBracket {
                    index,
                    min: bracket.min_income,
                    max,
                });
            }
            Some(max) => expected_start = max,
            None if index != last_index => {
                return Err(BracketError::UnboundedBeforeEnd { index });
            }
            None => {}
        }
    }

    Ok(())
}

/// Progressive tax on `income` across `brackets`, rounded to cents.
///
/// Negative income is taxed as zero. An empty table yields zero tax.
pub fn compute_bracket_tax(
    income: Decimal,
    brackets: &[TaxBracket],
) -> Decimal {
    if income < Decimal::ZERO {
        warn!(income = %income, "Negative taxable income clamped to zero");
        return Decimal::ZERO;
    }

    let last_index = brackets.len().saturating_sub(1);
    let mut tax = Decimal::ZERO;

    for (index, bracket) in brackets.iter().enumerate() {
        if income <= bracket.min_income {
            break;
        }
        let upper = match bracket.max_income {
            Some(max) if index != last_index => income.min(max),
            _ => income,
        };
        tax += (upper - bracket.min_income) * bracket.tax_rate;
    }

    round_half_up(tax)
}

/// Rate of the bracket containing `income` (`min < income <= max`).
///
/// Income at or below the first bracket's start takes the first rate; income
/// beyond the last bracket takes the top rate. An empty table yields zero.
pub fn compute_marginal_rate(
    income: Decimal,
    brackets: &[TaxBracket],
) -> Decimal {
    let Some(first) = brackets.first() else {
        return Decimal::ZERO;
    };
    if income <= first.min_income {
        return first.tax_rate;
    }

    brackets
        .iter()
        .find(|b| income > b.min_income && b.max_income.is_none_or(|max| income <= max))
        .or_else(|| brackets.last())
        .map_or(Decimal::ZERO, |b| b.tax_rate)
}

/// Threshold of the top bracket, i.e. where the highest rate starts.
pub fn top_bracket_threshold(brackets: &[TaxBracket]) -> Option<Decimal> {
    brackets.last().map(|b| b.min_income)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    fn federal_2024() -> Vec<TaxBracket> {
        vec![
            TaxBracket::new(dec!(0), Some(dec!(55867)), dec!(0.15)),
            TaxBracket::new(dec!(55867), Some(dec!(111733)), dec!(0.205)),
            TaxBracket::new(dec!(111733), Some(dec!(173205)), dec!(0.26)),
            TaxBracket::new(dec!(173205), Some(dec!(246752)), dec!(0.29)),
            TaxBracket::new(dec!(246752), None, dec!(0.33)),
        ]
    }

    // =========================================================================
    // compute_bracket_tax tests
    // =========================================================================

    #[test]
    fn bracket_tax_zero_income() {
        assert_eq!(compute_bracket_tax(dec!(0), &federal_2024()), dec!(0));
    }

    #[test]
    fn bracket_tax_negative_income_is_zero() {
        assert_eq!(compute_bracket_tax(dec!(-5000), &federal_2024()), dec!(0));
    }

    #[test]
    fn bracket_tax_first_bracket() {
        assert_eq!(compute_bracket_tax(dec!(50000), &federal_2024()), dec!(7500.00));
    }

    #[test]
    fn bracket_tax_at_boundary_uses_lower_bracket_only() {
        // 55867 × 0.15
        assert_eq!(compute_bracket_tax(dec!(55867), &federal_2024()), dec!(8380.05));
    }

    #[test]
    fn bracket_tax_spans_multiple_brackets() {
        // 8380.05 + 55866 × 0.205 + (150000 − 111733) × 0.26
        // = 8380.05 + 11452.53 + 9949.42
        assert_eq!(compute_bracket_tax(dec!(150000), &federal_2024()), dec!(29782.00));
    }

    #[test]
    fn bracket_tax_top_bracket() {
        // 8380.05 + 11452.53 + 61472 × 0.26 + 73547 × 0.29 + 53248 × 0.33
        // = 8380.05 + 11452.53 + 15982.72 + 21328.63 + 17571.84
        assert_eq!(compute_bracket_tax(dec!(300000), &federal_2024()), dec!(74715.77));
    }

    #[test]
    fn bracket_tax_treats_last_bracket_as_unbounded() {
        let brackets = vec![
            TaxBracket::new(dec!(0), Some(dec!(1000)), dec!(0.10)),
            TaxBracket::new(dec!(1000), Some(dec!(2000)), dec!(0.20)),
        ];

        // 100 + (3000 − 1000) × 0.20
        assert_eq!(compute_bracket_tax(dec!(3000), &brackets), dec!(500.00));
    }

    #[test]
    fn bracket_tax_empty_table_is_zero() {
        assert_eq!(compute_bracket_tax(dec!(100000), &[]), dec!(0));
    }

    // =========================================================================
    // compute_marginal_rate tests
    // =========================================================================

    #[test]
    fn marginal_rate_boundary_belongs_to_lower_bracket() {
        let brackets = federal_2024();

        assert_eq!(compute_marginal_rate(dec!(55867), &brackets), dec!(0.15));
        assert_eq!(compute_marginal_rate(dec!(55867.01), &brackets), dec!(0.205));
    }

    #[test]
    fn marginal_rate_zero_income_uses_first_rate() {
        assert_eq!(compute_marginal_rate(dec!(0), &federal_2024()), dec!(0.15));
        assert_eq!(compute_marginal_rate(dec!(-10), &federal_2024()), dec!(0.15));
    }

    #[test]
    fn marginal_rate_above_bounded_top_returns_top_rate() {
        let brackets = vec![
            TaxBracket::new(dec!(0), Some(dec!(1000)), dec!(0.10)),
            TaxBracket::new(dec!(1000), Some(dec!(2000)), dec!(0.20)),
        ];

        assert_eq!(compute_marginal_rate(dec!(9999), &brackets), dec!(0.20));
    }

    #[test]
    fn marginal_rate_empty_table_is_zero() {
        assert_eq!(compute_marginal_rate(dec!(100), &[]), dec!(0));
    }

    // =========================================================================
    // validate_brackets tests
    // =========================================================================

    #[test]
    fn validate_accepts_well_formed_table() {
        assert_eq!(validate_brackets(&federal_2024()), Ok(()));
    }

    #[test]
    fn validate_rejects_empty_table() {
        assert_eq!(validate_brackets(&[]), Err(BracketError::NoTaxBrackets));
    }

    #[test]
    fn validate_rejects_gap() {
        let brackets = vec![
            TaxBracket::new(dec!(0), Some(dec!(1000)), dec!(0.10)),
            TaxBracket::new(dec!(1500), None, dec!(0.20)),
        ];

        assert_eq!(
            validate_brackets(&brackets),
            Err(BracketError::Discontinuous {
                index: 1,
                expected: dec!(1000),
                found: dec!(1500),
            })
        );
    }

    #[test]
    fn validate_rejects_rate_above_one() {
        let brackets = vec![TaxBracket::new(dec!(0), None, dec!(15))];

        assert_eq!(
            validate_brackets(&brackets),
            Err(BracketError::InvalidRate {
                index: 0,
                rate: dec!(15),
            })
        );
    }

    #[test]
    fn validate_rejects_unbounded_middle_bracket() {
        let brackets = vec![
            TaxBracket::new(dec!(0), None, dec!(0.10)),
            TaxBracket::new(dec!(1000), None, dec!(0.20)),
        ];

        assert_eq!(
            validate_brackets(&brackets),
            Err(BracketError::UnboundedBeforeEnd { index: 0 })
        );
    }

    #[test]
    fn validate_rejects_inverted_bracket() {
        let brackets = vec![TaxBracket::new(dec!(1000), Some(dec!(500)), dec!(0.10))];

        assert_eq!(
            validate_brackets(&brackets),
            Err(BracketError::EmptyBracket {
                index: 0,
                min: dec!(1000),
                max: dec!(500),
            })
        );
    }
}
