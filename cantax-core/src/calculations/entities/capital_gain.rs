//! Capital gain on a single disposition, held personally or by a corporation.
//!
//! `gain = max(0, proceeds − outlays − ACB − safe income bump − reserve)`.
//! For property owned on 31 December 1971 the ACB is first replaced by the
//! median of actual cost, valuation-day value and proceeds.
//!
//! An individual pays tax on the taxable half at the combined marginal rate.
//! A corporation pays the investment rate on it, of which the refundable
//! portion feeds non-eligible RDTOH, and the untaxed half is added to CDA.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::jurisdiction::Jurisdiction;
use super::{BreakdownLine, Holder};
use crate::calculations::common::{median, non_negative, round_half_up, round_rate};
use crate::calculations::ledger::{IntegrationLedger, LedgerActivity, LedgerResult};
use crate::error::CalcError;
use crate::lenient;
use crate::{IntegrationAccountBalances, Province, RateTables, TaxYearConfig};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapitalGainInput {
    #[serde(deserialize_with = "lenient::holder")]
    pub holder: Holder,
    #[serde(deserialize_with = "lenient::province")]
    pub province: Province,
    #[serde(deserialize_with = "lenient::amount")]
    pub proceeds: Decimal,
    /// Selling costs.
    #[serde(deserialize_with = "lenient::amount")]
    pub outlays: Decimal,
    #[serde(deserialize_with = "lenient::amount")]
    pub acb: Decimal,
    /// Valuation-day (1971) value. `None` for property acquired later.
    #[serde(deserialize_with = "lenient::optional_amount")]
    pub v_day_value: Option<Decimal>,
    #[serde(deserialize_with = "lenient::amount")]
    pub safe_income_bump: Decimal,
    /// Reserve for proceeds not yet receivable.
    #[serde(deserialize_with = "lenient::amount")]
    pub reserve: Decimal,
    /// Individual's income before the gain, used to find the marginal rate.
    #[serde(deserialize_with = "lenient::amount")]
    pub other_income: Decimal,
    /// Corporation's prior year closing balances.
    #[serde(deserialize_with = "lenient::balances")]
    pub opening_balances: IntegrationAccountBalances,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapitalGainResult {
    pub holder: Holder,
    /// ACB after the valuation-day rule.
    pub adjusted_acb: Decimal,
    pub v_day_applied: bool,
    pub capital_gain: Decimal,
    pub capital_loss: Decimal,
    pub taxable_capital_gain: Decimal,
    pub allowable_capital_loss: Decimal,
    pub non_taxable_portion: Decimal,
    /// Marginal rate (individual) or investment rate (corporation).
    pub tax_rate: Decimal,
    pub tax: Decimal,
    pub refundable_tax: Decimal,
    pub cda_addition: Decimal,
    /// Present for corporate holders only.
    pub ledger: Option<LedgerResult>,
    pub closing_balances: Option<IntegrationAccountBalances>,
}

impl CapitalGainResult {
    pub fn breakdown(&self) -> Vec<BreakdownLine> {
        let mut lines = vec![
            BreakdownLine::money("Adjusted cost base", self.adjusted_acb),
            BreakdownLine::money("Capital gain", self.capital_gain),
            BreakdownLine::money("Capital loss", self.capital_loss),
            BreakdownLine::money("Taxable capital gain", self.taxable_capital_gain),
            BreakdownLine::money("Allowable capital loss", self.allowable_capital_loss),
            BreakdownLine::rate("Tax rate", self.tax_rate),
            BreakdownLine::money("Tax", self.tax),
        ];
        if self.holder == Holder::Corporation {
            lines.push(BreakdownLine::money("Refundable tax", self.refundable_tax));
            lines.push(BreakdownLine::money("CDA addition", self.cda_addition));
        }
        lines
    }
}

/// Calculator for [`CapitalGainInput`].
#[derive(Debug, Clone)]
pub struct CapitalGainCalculator<'a> {
    tables: &'a RateTables,
    config: &'a TaxYearConfig,
}

impl<'a> CapitalGainCalculator<'a> {
    pub fn new(
        tables: &'a RateTables,
        config: &'a TaxYearConfig,
    ) -> Self {
        Self { tables, config }
    }

    pub fn calculate(
        &self,
        input: &CapitalGainInput,
    ) -> Result<CapitalGainResult, CalcError> {
        let proceeds = non_negative(input.proceeds);
        let acb = non_negative(input.acb);
        let adjusted_acb = input
            .v_day_value
            .map_or(acb, |v_day| median(acb, non_negative(v_day), proceeds));

        let before_deductions = proceeds - non_negative(input.outlays) - adjusted_acb;
        let capital_gain = non_negative(
            before_deductions - non_negative(input.safe_income_bump) - non_negative(input.reserve),
        );
        let capital_loss = non_negative(-before_deductions);

        let inclusion_rate = self.config.capital_gains_inclusion_rate;
        let taxable_capital_gain = round_half_up(capital_gain * inclusion_rate);
        let allowable_capital_loss = round_half_up(capital_loss * inclusion_rate);
        let non_taxable_portion = capital_gain - taxable_capital_gain;

        let mut result = CapitalGainResult {
            holder: input.holder,
            adjusted_acb,
            v_day_applied: input.v_day_value.is_some(),
            capital_gain,
            capital_loss,
            taxable_capital_gain,
            allowable_capital_loss,
            non_taxable_portion,
            ..Default::default()
        };

        match input.holder {
            Holder::Individual => self.individual_tax(input, &mut result)?,
            Holder::Corporation => self.corporate_tax(input, &mut result)?,
        }

        debug!(
            holder = %input.holder,
            capital_gain = %result.capital_gain,
            tax = %result.tax,
            "Computed capital gain"
        );

        Ok(result)
    }

    fn individual_tax(
        &self,
        input: &CapitalGainInput,
        result: &mut CapitalGainResult,
    ) -> Result<(), CalcError> {
        let jurisdiction = Jurisdiction::resolve(self.tables, self.config, input.province)?;
        let income = non_negative(input.other_income) + result.taxable_capital_gain;

        result.tax_rate = jurisdiction.marginal_rate(income);
        result.tax = round_half_up(result.taxable_capital_gain * result.tax_rate);
        Ok(())
    }

    fn corporate_tax(
        &self,
        input: &CapitalGainInput,
        result: &mut CapitalGainResult,
    ) -> Result<(), CalcError> {
        let provincial = self
            .config
            .provincial(input.province)
            .ok_or(CalcError::MissingProvincialParameters(input.province))?;
        let corporate = &self.config.corporate;

        let rate = corporate.federal_investment_rate() + provincial.general_corporate_rate;
        let ledger = IntegrationLedger::new(corporate).apply(
            &input.opening_balances,
            &LedgerActivity {
                aggregate_investment_income: result.taxable_capital_gain,
                non_taxable_capital_gains: result.non_taxable_portion,
                ..Default::default()
            },
        );

        result.tax_rate = round_rate(rate);
        result.tax = round_half_up(result.taxable_capital_gain * rate);
        result.refundable_tax = ledger.refundable_part_i_tax;
        result.cda_addition = ledger.cda.addition;
        result.closing_balances = Some(ledger.closing_balances());
        result.ledger = Some(ledger);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::calculations::entities::fixtures::rate_tables_2024;

    fn calculate(input: CapitalGainInput) -> CapitalGainResult {
        let tables = rate_tables_2024();
        let config = TaxYearConfig::default();
        CapitalGainCalculator::new(&tables, &config)
            .calculate(&input)
            .unwrap()
    }

    #[test]
    fn individual_gain_taxed_at_marginal_rate() {
        let result = calculate(CapitalGainInput {
            proceeds: dec!(150000),
            outlays: dec!(5000),
            acb: dec!(45000),
            other_income: dec!(60000),
            ..Default::default()
        });

        assert_eq!(result.capital_gain, dec!(100000));
        assert_eq!(result.taxable_capital_gain, dec!(50000.00));
        // Marginal rate at 110000: 20.5% federal + 11.16% Ontario
        assert_eq!(result.tax_rate, dec!(0.3166));
        assert_eq!(result.tax, dec!(15830.00));
        assert_eq!(result.ledger, None);
    }

    #[test]
    fn v_day_median_can_eliminate_gain() {
        let result = calculate(CapitalGainInput {
            proceeds: dec!(40000),
            acb: dec!(20000),
            v_day_value: Some(dec!(50000)),
            ..Default::default()
        });

        // median(20000, 50000, 40000)
        assert_eq!(result.adjusted_acb, dec!(40000));
        assert!(result.v_day_applied);
        assert_eq!(result.capital_gain, dec!(0));
        assert_eq!(result.capital_loss, dec!(0));
    }

    #[test]
    fn v_day_value_between_cost_and_proceeds_becomes_acb() {
        let result = calculate(CapitalGainInput {
            proceeds: dec!(100000),
            acb: dec!(20000),
            v_day_value: Some(dec!(30000)),
            ..Default::default()
        });

        assert_eq!(result.adjusted_acb, dec!(30000));
        assert_eq!(result.capital_gain, dec!(70000));
    }

    #[test]
    fn bump_and_reserve_reduce_gain() {
        let result = calculate(CapitalGainInput {
            proceeds: dec!(100000),
            acb: dec!(40000),
            safe_income_bump: dec!(10000),
            reserve: dec!(20000),
            ..Default::default()
        });

        assert_eq!(result.capital_gain, dec!(30000));
    }

    #[test]
    fn loss_is_surfaced_without_tax() {
        let result = calculate(CapitalGainInput {
            proceeds: dec!(30000),
            outlays: dec!(1000),
            acb: dec!(50000),
            ..Default::default()
        });

        assert_eq!(result.capital_gain, dec!(0));
        assert_eq!(result.capital_loss, dec!(21000));
        assert_eq!(result.allowable_capital_loss, dec!(10500.00));
        assert_eq!(result.tax, dec!(0));
    }

    #[test]
    fn corporate_gain_feeds_rdtoh_and_cda() {
        let result = calculate(CapitalGainInput {
            holder: Holder::Corporation,
            proceeds: dec!(200000),
            acb: dec!(100000),
            opening_balances: IntegrationAccountBalances {
                cda: dec!(1000),
                ..Default::default()
            },
            ..Default::default()
        });

        // 50000 × (38⅔% + 11.5%)
        assert_eq!(result.tax, dec!(25083.33));
        assert_eq!(result.tax_rate, dec!(0.5017));
        // 50000 × 30⅔%
        assert_eq!(result.refundable_tax, dec!(15333.33));
        assert_eq!(result.cda_addition, dec!(50000.00));

        let closing = result.closing_balances.unwrap();
        assert_eq!(closing.cda, dec!(51000.00));
        assert_eq!(closing.non_eligible_rdtoh, dec!(15333.33));
    }
}
