//! Federal alternative minimum tax.
//!
//! ```text
//! adjusted taxable income = regular taxable income
//!                         + capital gains × (AMT inclusion − regular inclusion)
//!                         + stock option deduction add-back
//!                         + CCA / resource add-backs
//! exemption               = max(0, exemption − max(0, ATI − phase-out start) × phase-out rate)
//! tentative minimum tax   = max(0, ATI − exemption) × AMT rate
//! AMT payable             = max(0, max(0, tentative − credits) − regular tax)
//! ```
//!
//! Regular tax is the federal bracket tax on regular taxable income unless
//! the caller supplies it. AMT paid becomes a carryforward; in a later year
//! where regular tax exceeds the minimum, the carryforward is recovered up to
//! that excess.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::BreakdownLine;
use crate::calculations::brackets::compute_bracket_tax;
use crate::calculations::common::{non_negative, round_half_up};
use crate::error::CalcError;
use crate::lenient;
use crate::{RateTables, TaxYearConfig};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmtInput {
    #[serde(deserialize_with = "lenient::amount")]
    pub regular_taxable_income: Decimal,
    /// Capital gains realized, before any inclusion.
    #[serde(deserialize_with = "lenient::amount")]
    pub capital_gains: Decimal,
    #[serde(deserialize_with = "lenient::amount")]
    pub stock_option_deduction: Decimal,
    /// CCA, resource and other tax-shelter add-backs.
    #[serde(deserialize_with = "lenient::amount")]
    pub cca_addbacks: Decimal,
    /// Credits allowed against minimum tax.
    #[serde(deserialize_with = "lenient::amount")]
    pub allowable_credits: Decimal,
    /// Regular federal tax. `None` computes it from the federal brackets.
    #[serde(deserialize_with = "lenient::optional_amount")]
    pub regular_tax: Option<Decimal>,
    /// AMT carried forward from earlier years.
    #[serde(deserialize_with = "lenient::amount")]
    pub carryforward_opening: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmtResult {
    pub capital_gains_addback: Decimal,
    pub stock_option_addback: Decimal,
    pub cca_addbacks: Decimal,
    pub adjusted_taxable_income: Decimal,
    pub exemption: Decimal,
    pub amt_base: Decimal,
    pub tentative_minimum_tax: Decimal,
    /// Tentative minimum tax less allowable credits.
    pub minimum_tax: Decimal,
    pub regular_tax: Decimal,
    pub amt_payable: Decimal,
    pub carryforward_opening: Decimal,
    /// Carryforward recovered against this year's regular tax.
    pub carryforward_applied: Decimal,
    pub carryforward_closing: Decimal,
}

impl AmtResult {
    pub fn breakdown(&self) -> Vec<BreakdownLine> {
        vec![
            BreakdownLine::money("Capital gains add-back", self.capital_gains_addback),
            BreakdownLine::money("Stock option add-back", self.stock_option_addback),
            BreakdownLine::money("CCA and resource add-backs", self.cca_addbacks),
            BreakdownLine::money("Adjusted taxable income", self.adjusted_taxable_income),
            BreakdownLine::money("Exemption", self.exemption),
            BreakdownLine::money("Tentative minimum tax", self.tentative_minimum_tax),
            BreakdownLine::money("Minimum tax after credits", self.minimum_tax),
            BreakdownLine::money("Regular tax", self.regular_tax),
            BreakdownLine::money("AMT payable", self.amt_payable),
            BreakdownLine::money("Carryforward applied", self.carryforward_applied),
            BreakdownLine::money("Carryforward closing", self.carryforward_closing),
        ]
    }
}

/// Calculator for [`AmtInput`].
#[derive(Debug, Clone)]
pub struct AmtCalculator<'a> {
    tables: &'a RateTables,
    config: &'a TaxYearConfig,
}

impl<'a> AmtCalculator<'a> {
    pub fn new(
        tables: &'a RateTables,
        config: &'a TaxYearConfig,
    ) -> Self {
        Self { tables, config }
    }

    pub fn calculate(
        &self,
        input: &AmtInput,
    ) -> Result<AmtResult, CalcError> {
        let amt = &self.config.amt;

        let regular_taxable_income = non_negative(input.regular_taxable_income);
        let regular_tax = match input.regular_tax {
            Some(tax) => non_negative(tax),
            None => {
                if self.tables.federal.is_empty() {
                    return Err(CalcError::MissingFederalRateTable);
                }
                compute_bracket_tax(regular_taxable_income, &self.tables.federal)
            }
        };

        let extra_inclusion = non_negative(
            amt.capital_gains_inclusion_rate - self.config.capital_gains_inclusion_rate,
        );
        let capital_gains_addback =
            round_half_up(non_negative(input.capital_gains) * extra_inclusion);
        let stock_option_addback = round_half_up(
            non_negative(input.stock_option_deduction) * amt.stock_option_addback_rate,
        );
        let cca_addbacks = non_negative(input.cca_addbacks);

        let adjusted_taxable_income =
            regular_taxable_income + capital_gains_addback + stock_option_addback + cca_addbacks;
        let exemption = self.exemption(adjusted_taxable_income);
        let amt_base = non_negative(adjusted_taxable_income - exemption);

        let tentative_minimum_tax = round_half_up(amt_base * amt.rate);
        let minimum_tax =
            non_negative(tentative_minimum_tax - non_negative(input.allowable_credits));
        let amt_payable = non_negative(minimum_tax - regular_tax);

        let carryforward_opening = non_negative(input.carryforward_opening);
        let carryforward_applied =
            carryforward_opening.min(non_negative(regular_tax - minimum_tax));
        let carryforward_closing = carryforward_opening - carryforward_applied + amt_payable;

        debug!(
            adjusted_taxable_income = %adjusted_taxable_income,
            tentative_minimum_tax = %tentative_minimum_tax,
            regular_tax = %regular_tax,
            amt_payable = %amt_payable,
            "Computed alternative minimum tax"
        );

        Ok(AmtResult {
            capital_gains_addback,
            stock_option_addback,
            cca_addbacks,
            adjusted_taxable_income,
            exemption,
            amt_base,
            tentative_minimum_tax,
            minimum_tax,
            regular_tax,
            amt_payable,
            carryforward_opening,
            carryforward_applied,
            carryforward_closing,
        })
    }

    /// Exemption after the income-based phase-out.
    fn exemption(
        &self,
        adjusted_taxable_income: Decimal,
    ) -> Decimal {
        let amt = &self.config.amt;
        let excess = non_negative(adjusted_taxable_income - amt.exemption_phase_out_start);

        round_half_up(non_negative(amt.exemption - excess * amt.exemption_phase_out_rate))
    }
}
