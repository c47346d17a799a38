//! Common utility functions for tax calculations.
//!
//! This module provides shared rounding and clamping helpers used by every
//! calculator, so that each "greater of zero and X" rule in the statute is
//! applied the same way at every formula site.

use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds a decimal value to exactly two decimal places using half-up rounding.
///
/// This follows standard financial rounding conventions where values at exactly
/// 0.005 are rounded up to 0.01 (away from zero).
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use cantax_core::calculations::common::round_half_up;
///
/// assert_eq!(round_half_up(dec!(123.454)), dec!(123.45));
/// assert_eq!(round_half_up(dec!(123.455)), dec!(123.46));
/// assert_eq!(round_half_up(dec!(-123.455)), dec!(-123.46)); // Away from zero
/// ```
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Rounds a rate (a fraction, not a percentage) to four decimal places.
///
/// ```
/// use rust_decimal_macros::dec;
/// use cantax_core::calculations::common::round_rate;
///
/// assert_eq!(round_rate(dec!(0.123456)), dec!(0.1235));
/// ```
pub fn round_rate(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
}

/// Returns the maximum of two decimal values.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use cantax_core::calculations::common::max;
///
/// assert_eq!(max(dec!(100.00), dec!(200.00)), dec!(200.00));
/// assert_eq!(max(dec!(-100.00), dec!(-200.00)), dec!(-100.00));
/// ```
pub fn max(
    a: Decimal,
    b: Decimal,
) -> Decimal {
    if a > b { a } else { b }
}

/// Returns the greater of zero and `value`.
pub fn non_negative(value: Decimal) -> Decimal {
    max(value, Decimal::ZERO)
}

/// Divides `numerator` by `denominator`, returning zero when the denominator
/// is zero or negative.
///
/// ```
/// use rust_decimal_macros::dec;
/// use cantax_core::calculations::common::ratio;
///
/// assert_eq!(ratio(dec!(25), dec!(100)), dec!(0.25));
/// assert_eq!(ratio(dec!(25), dec!(0)), dec!(0));
/// ```
pub fn ratio(
    numerator: Decimal,
    denominator: Decimal,
) -> Decimal {
    if denominator > Decimal::ZERO {
        numerator / denominator
    } else {
        Decimal::ZERO
    }
}

/// Clamps `value` into `[low, high]`. `low` wins if the bounds are inverted.
pub fn clamp(
    value: Decimal,
    low: Decimal,
    high: Decimal,
) -> Decimal {
    max(value.min(high), low)
}

/// Returns the middle value of three. Used by the V-day median rule.
pub fn median(
    a: Decimal,
    b: Decimal,
    c: Decimal,
) -> Decimal {
    max(a.min(b), max(a, b).min(c))
}
