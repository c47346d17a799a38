//! Small business deduction (SBD) for Canadian-controlled private corporations.
//!
//! The business limit is ground down in two stages:
//!
//! 1. **Taxable capital.** Above the capital threshold the limit shrinks by
//!    `(capital − threshold) × factor`, once for the corporation's own capital
//!    and again, stacked, for the associated group's aggregate capital.
//! 2. **Passive income.** The limit left after stage 1 shrinks by
//!    `(passive income − threshold) × factor`.
//!
//! Each grind is capped at the full business limit and the ground limit never
//! goes below zero.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use cantax_core::CorporateParameters;
//! use cantax_core::calculations::sbd::{SbdInput, SmallBusinessDeduction};
//!
//! let corporate = CorporateParameters::default();
//! let sbd = SmallBusinessDeduction::new(&corporate);
//!
//! let input = SbdInput {
//!     active_business_income: dec!(600000),
//!     passive_income: dec!(100000),
//!     ..Default::default()
//! };
//! let result = sbd.calculate(&input, dec!(0.032));
//!
//! // (100000 − 50000) × 5 = 250000 ground off the 500000 limit
//! assert_eq!(result.sbd_eligible_income, dec!(250000));
//! assert_eq!(result.sbd_amount, dec!(47500.00));
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::CorporateParameters;
use crate::calculations::common::{clamp, non_negative, round_half_up, round_rate};

/// Inputs to the SBD calculation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SbdInput {
    pub active_business_income: Decimal,
    /// Prior-year taxable capital employed in Canada.
    pub taxable_capital: Decimal,
    /// Aggregate taxable capital of the associated group.
    pub associated_taxable_capital: Decimal,
    /// Adjusted aggregate investment income of the prior year.
    pub passive_income: Decimal,
    /// Share of the business limit assigned to this corporation. `None`
    /// leaves the limit unrestricted.
    pub assigned_business_limit: Option<Decimal>,
    /// Portion of the limited income that qualifies. `None` means 100%.
    pub eligibility_percentage: Option<Decimal>,
}

/// Result of the SBD calculation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SbdResult {
    pub business_limit: Decimal,
    pub taxable_capital_grind: Decimal,
    pub associated_capital_grind: Decimal,
    pub passive_income_grind: Decimal,
    /// Business limit after all grinds.
    pub reduced_business_limit: Decimal,
    pub sbd_eligible_income: Decimal,
    /// Deduction from federal tax: eligible income × SBD rate.
    pub sbd_amount: Decimal,
    /// Combined federal and provincial rate on eligible income.
    pub effective_rate: Decimal,
}

/// Calculator for the small business deduction.
#[derive(Debug, Clone)]
pub struct SmallBusinessDeduction<'a> {
    corporate: &'a CorporateParameters,
}

impl<'a> SmallBusinessDeduction<'a> {
    pub fn new(corporate: &'a CorporateParameters) -> Self {
        Self { corporate }
    }

    /// Calculates the SBD. `provincial_small_business_rate` is the province's
    /// reduced rate on SBD-eligible income.
    pub fn calculate(
        &self,
        input: &SbdInput,
        provincial_small_business_rate: Decimal,
    ) -> SbdResult {
        let limit = self.corporate.business_limit;

        let taxable_capital_grind = self.capital_grind(input.taxable_capital);
        let associated_capital_grind = self.capital_grind(input.associated_taxable_capital);
        let capital_limited =
            non_negative(limit - taxable_capital_grind - associated_capital_grind);

        let passive_income_grind = self.passive_income_grind(input.passive_income);
        let reduced_business_limit = non_negative(capital_limited - passive_income_grind);

        let sbd_eligible_income = self.eligible_income(input, reduced_business_limit);
        let sbd_amount =
            round_half_up(sbd_eligible_income * self.corporate.small_business_deduction_rate);
        let effective_rate = round_rate(
            self.corporate.federal_small_business_rate() + provincial_small_business_rate,
        );

        debug!(
            reduced_business_limit = %reduced_business_limit,
            sbd_eligible_income = %sbd_eligible_income,
            "Computed small business deduction"
        );

        SbdResult {
            business_limit: limit,
            taxable_capital_grind,
            associated_capital_grind,
            passive_income_grind,
            reduced_business_limit,
            sbd_eligible_income,
            sbd_amount,
            effective_rate,
        }
    }

    fn capital_grind(
        &self,
        taxable_capital: Decimal,
    ) -> Decimal {
        grind(
            taxable_capital,
            self.corporate.taxable_capital_threshold,
            self.corporate.taxable_capital_grind_factor,
            self.corporate.business_limit,
        )
    }

    fn passive_income_grind(
        &self,
        passive_income: Decimal,
    ) -> Decimal {
        grind(
            passive_income,
            self.corporate.passive_income_threshold,
            self.corporate.passive_income_grind_factor,
            self.corporate.business_limit,
        )
    }

    /// `min(active business income, ground limit, assigned limit) × eligibility`.
    fn eligible_income(
        &self,
        input: &SbdInput,
        reduced_business_limit: Decimal,
    ) -> Decimal {
        let assigned = input
            .assigned_business_limit
            .map_or(reduced_business_limit, non_negative);
        let percentage = match input.eligibility_percentage {
            Some(pct) if pct < Decimal::ZERO || pct > Decimal::ONE => {
                warn!(
                    eligibility_percentage = %pct,
                    "Eligibility percentage outside 0..=1; clamped"
                );
                clamp(pct, Decimal::ZERO, Decimal::ONE)
            }
            Some(pct) => pct,
            None => Decimal::ONE,
        };

        let limited = non_negative(input.active_business_income)
            .min(reduced_business_limit)
            .min(assigned);

        round_half_up(limited * percentage)
    }
}

/// `min(limit, (amount − threshold) × factor)` once `amount` passes the
/// threshold, zero otherwise.
fn grind(
    amount: Decimal,
    threshold: Decimal,
    factor: Decimal,
    limit: Decimal,
) -> Decimal {
    if amount <= threshold {
        return Decimal::ZERO;
    }

    round_half_up(((amount - threshold) * factor).min(limit))
}
