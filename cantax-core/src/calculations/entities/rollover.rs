//! Section 85 rollover of property to a corporation for shares.
//!
//! The elected amount must fall in `[min(boot, FMV), FMV]`. An election inside
//! the range is kept as given; one outside it is clamped to the nearest
//! bound, and a missing election defaults to the ACB clamped into the range.
//! Either substitution is flagged on the result.
//!
//! The elected amount is the transferor's proceeds and the corporation's
//! cost. Consideration shares take the elected amount less boot as their
//! ACB, and paid-up capital is ground down to that same figure.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{BreakdownLine, Holder};
use crate::calculations::common::{clamp, non_negative, round_half_up};
use crate::calculations::ledger::{IntegrationLedger, LedgerActivity, LedgerResult};
use crate::error::CalcError;
use crate::lenient;
use crate::{IntegrationAccountBalances, RateTables, TaxYearConfig};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RolloverInput {
    #[serde(deserialize_with = "lenient::holder")]
    pub transferor: Holder,
    #[serde(deserialize_with = "lenient::amount")]
    pub fmv: Decimal,
    #[serde(deserialize_with = "lenient::amount")]
    pub acb: Decimal,
    /// Non-share consideration received.
    #[serde(deserialize_with = "lenient::amount")]
    pub boot: Decimal,
    /// `None` elects at the ACB, clamped into the valid range.
    #[serde(deserialize_with = "lenient::optional_amount")]
    pub elected_amount: Option<Decimal>,
    /// Legal stated capital added for the new shares. `None` means it
    /// equals the elected amount less boot.
    #[serde(deserialize_with = "lenient::optional_amount")]
    pub stated_capital: Option<Decimal>,
    /// Corporate transferor's prior year closing balances.
    #[serde(deserialize_with = "lenient::balances")]
    pub opening_balances: IntegrationAccountBalances,
}

/// Bounds an elected amount must fall within.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectedRange {
    pub min: Decimal,
    pub max: Decimal,
}

impl ElectedRange {
    pub fn contains(
        &self,
        amount: Decimal,
    ) -> bool {
        amount >= self.min && amount <= self.max
    }

    pub fn clamp(
        &self,
        amount: Decimal,
    ) -> Decimal {
        clamp(amount, self.min, self.max)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloverResult {
    pub transferor: Holder,
    pub valid_range: ElectedRange,
    pub requested_elected_amount: Option<Decimal>,
    pub elected_amount: Decimal,
    /// The requested amount was missing or out of range and was replaced.
    pub elected_amount_adjusted: bool,

    pub capital_gain: Decimal,
    pub capital_loss: Decimal,
    pub taxable_capital_gain: Decimal,
    pub allowable_capital_loss: Decimal,
    pub non_taxable_portion: Decimal,

    pub boot_cost: Decimal,
    pub share_acb: Decimal,
    pub cost_to_corporation: Decimal,
    pub stated_capital: Decimal,
    /// Paid-up capital reduction under s.85(2.1).
    pub puc_grind: Decimal,
    pub paid_up_capital: Decimal,

    pub refundable_tax: Decimal,
    pub cda_addition: Decimal,
    /// Present for corporate transferors only.
    pub ledger: Option<LedgerResult>,
    pub closing_balances: Option<IntegrationAccountBalances>,
}

impl RolloverResult {
    pub fn breakdown(&self) -> Vec<BreakdownLine> {
        let mut lines = vec![
            BreakdownLine::money("Minimum elected amount", self.valid_range.min),
            BreakdownLine::money("Maximum elected amount", self.valid_range.max),
            BreakdownLine::money("Elected amount", self.elected_amount),
            BreakdownLine::flag("Elected amount adjusted", self.elected_amount_adjusted),
            BreakdownLine::money("Capital gain", self.capital_gain),
            BreakdownLine::money("Capital loss", self.capital_loss),
            BreakdownLine::money("Taxable capital gain", self.taxable_capital_gain),
            BreakdownLine::money("ACB of consideration shares", self.share_acb),
            BreakdownLine::money("PUC grind", self.puc_grind),
            BreakdownLine::money("Paid-up capital", self.paid_up_capital),
        ];
        if self.transferor == Holder::Corporation {
            lines.push(BreakdownLine::money("Refundable tax", self.refundable_tax));
            lines.push(BreakdownLine::money("CDA addition", self.cda_addition));
        }
        lines
    }
}

/// Calculator for [`RolloverInput`].
#[derive(Debug, Clone)]
pub struct RolloverCalculator<'a> {
    config: &'a TaxYearConfig,
}

impl<'a> RolloverCalculator<'a> {
    pub fn new(
        _tables: &'a RateTables,
        config: &'a TaxYearConfig,
    ) -> Self {
        Self { config }
    }

    pub fn calculate(
        &self,
        input: &RolloverInput,
    ) -> Result<RolloverResult, CalcError> {
        let fmv = non_negative(input.fmv);
        let acb = non_negative(input.acb);
        let boot = non_negative(input.boot);

        let valid_range = ElectedRange {
            min: boot.min(fmv),
            max: fmv,
        };
        let (elected_amount, elected_amount_adjusted) = self.elect(input, acb, valid_range);

        let capital_gain = non_negative(elected_amount - acb);
        let capital_loss = non_negative(acb - elected_amount);
        let inclusion_rate = self.config.capital_gains_inclusion_rate;
        let taxable_capital_gain = round_half_up(capital_gain * inclusion_rate);
        let allowable_capital_loss = round_half_up(capital_loss * inclusion_rate);
        let non_taxable_portion = capital_gain - taxable_capital_gain;

        let boot_cost = boot.min(fmv);
        let share_acb = non_negative(elected_amount - boot_cost);
        let stated_capital = input.stated_capital.map_or(share_acb, non_negative);
        let puc_grind = non_negative(stated_capital - share_acb);
        let paid_up_capital = stated_capital - puc_grind;

        let mut result = RolloverResult {
            transferor: input.transferor,
            valid_range,
            requested_elected_amount: input.elected_amount,
            elected_amount,
            elected_amount_adjusted,
            capital_gain,
            capital_loss,
            taxable_capital_gain,
            allowable_capital_loss,
            non_taxable_portion,
            boot_cost,
            share_acb,
            cost_to_corporation: elected_amount,
            stated_capital,
            puc_grind,
            paid_up_capital,
            ..Default::default()
        };

        if input.transferor == Holder::Corporation {
            let ledger = IntegrationLedger::new(&self.config.corporate).apply(
                &input.opening_balances,
                &LedgerActivity {
                    aggregate_investment_income: taxable_capital_gain,
                    non_taxable_capital_gains: non_taxable_portion,
                    ..Default::default()
                },
            );
            result.refundable_tax = ledger.refundable_part_i_tax;
            result.cda_addition = ledger.cda.addition;
            result.closing_balances = Some(ledger.closing_balances());
            result.ledger = Some(ledger);
        }

        debug!(
            elected_amount = %elected_amount,
            capital_gain = %capital_gain,
            paid_up_capital = %paid_up_capital,
            "Computed section 85 rollover"
        );

        Ok(result)
    }

    /// Returns the elected amount to use and whether it differs from the
    /// request.
    fn elect(
        &self,
        input: &RolloverInput,
        acb: Decimal,
        range: ElectedRange,
    ) -> (Decimal, bool) {
        match input.elected_amount {
            Some(requested) if range.contains(requested) => (requested, false),
            Some(requested) => {
                let clamped = range.clamp(requested);
                warn!(
                    requested = %requested,
                    min = %range.min,
                    max = %range.max,
                    clamped = %clamped,
                    "Elected amount outside the permitted range"
                );
                (clamped, true)
            }
            None => (range.clamp(acb), true),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    fn calculate(input: RolloverInput) -> RolloverResult {
        let tables = RateTables::new(2024);
        let config = TaxYearConfig::default();
        RolloverCalculator::new(&tables, &config)
            .calculate(&input)
            .unwrap()
    }

    fn base_input() -> RolloverInput {
        RolloverInput {
            fmv: dec!(500000),
            acb: dec!(100000),
            boot: dec!(50000),
            ..Default::default()
        }
    }

    #[test]
    fn in_range_election_is_kept() {
        let result = calculate(RolloverInput {
            elected_amount: Some(dec!(150000)),
            ..base_input()
        });

        assert_eq!(result.valid_range, ElectedRange { min: dec!(50000), max: dec!(500000) });
        assert_eq!(result.elected_amount, dec!(150000));
        assert!(!result.elected_amount_adjusted);
        assert_eq!(result.capital_gain, dec!(50000));
        assert_eq!(result.taxable_capital_gain, dec!(25000.00));
        assert_eq!(result.share_acb, dec!(100000));
    }

    #[test]
    fn election_above_fmv_is_clamped() {
        let result = calculate(RolloverInput {
            elected_amount: Some(dec!(600000)),
            ..base_input()
        });

        assert_eq!(result.requested_elected_amount, Some(dec!(600000)));
        assert_eq!(result.elected_amount, dec!(500000));
        assert!(result.elected_amount_adjusted);
    }

    #[test]
    fn election_below_boot_is_clamped() {
        let result = calculate(RolloverInput {
            elected_amount: Some(dec!(10000)),
            ..base_input()
        });

        assert_eq!(result.elected_amount, dec!(50000));
        assert!(result.elected_amount_adjusted);
        assert_eq!(result.capital_loss, dec!(50000));
        assert_eq!(result.allowable_capital_loss, dec!(25000.00));
    }

    #[test]
    fn missing_election_defaults_to_acb() {
        let result = calculate(base_input());

        assert_eq!(result.elected_amount, dec!(100000));
        assert!(result.elected_amount_adjusted);
        assert_eq!(result.capital_gain, dec!(0));
    }

    #[test]
    fn boot_above_fmv_caps_minimum_at_fmv() {
        let result = calculate(RolloverInput {
            fmv: dec!(80000),
            acb: dec!(20000),
            boot: dec!(90000),
            ..Default::default()
        });

        assert_eq!(result.valid_range, ElectedRange { min: dec!(80000), max: dec!(80000) });
        assert_eq!(result.elected_amount, dec!(80000));
        assert_eq!(result.share_acb, dec!(0));
    }

    #[test]
    fn stated_capital_above_share_cost_is_ground() {
        let result = calculate(RolloverInput {
            elected_amount: Some(dec!(100000)),
            stated_capital: Some(dec!(450000)),
            ..base_input()
        });

        // PUC limited to 100000 − 50000
        assert_eq!(result.puc_grind, dec!(400000));
        assert_eq!(result.paid_up_capital, dec!(50000));
    }

    #[test]
    fn corporate_transferor_updates_cda_and_rdtoh() {
        let result = calculate(RolloverInput {
            transferor: Holder::Corporation,
            elected_amount: Some(dec!(300000)),
            ..base_input()
        });

        assert_eq!(result.capital_gain, dec!(200000));
        assert_eq!(result.cda_addition, dec!(100000.00));
        // 100000 × 30⅔%
        assert_eq!(result.refundable_tax, dec!(30666.67));
        assert_eq!(result.closing_balances.unwrap().cda, dec!(100000.00));
    }
}
