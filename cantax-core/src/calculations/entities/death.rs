//! Terminal return: deemed disposition on death.
//!
//! Capital property is deemed sold at fair market value immediately before
//! death, except property left to a spouse or spousal trust, which rolls over
//! at its ACB. A registered plan's balance is income of the deceased unless
//! a spouse is the beneficiary.
//!
//! Net capital losses carried forward offset taxable capital gains first.
//! On the terminal return whatever remains, together with this year's
//! allowable capital losses, may be deducted from any other income.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::BreakdownLine;
use super::departure::{NetGain, PropertyDisposition};
use super::jurisdiction::Jurisdiction;
use crate::calculations::common::{non_negative, ratio, round_half_up, round_rate};
use crate::calculations::credits::{CreditAggregator, CreditInput};
use crate::error::CalcError;
use crate::lenient;
use crate::{Province, RateTables, TaxYearConfig};

/// Capital property owned at death.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeceasedProperty {
    #[serde(deserialize_with = "lenient::text")]
    pub description: String,
    #[serde(deserialize_with = "lenient::amount")]
    pub fmv: Decimal,
    #[serde(deserialize_with = "lenient::amount")]
    pub acb: Decimal,
    /// Left to a spouse or spousal trust.
    #[serde(deserialize_with = "lenient::flag")]
    pub to_spouse: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeathInput {
    #[serde(deserialize_with = "lenient::province")]
    pub province: Province,
    #[serde(deserialize_with = "lenient::count")]
    pub age: u32,
    /// Employment, pension and other income up to the date of death.
    #[serde(deserialize_with = "lenient::amount")]
    pub other_income: Decimal,
    #[serde(deserialize_with = "lenient::list")]
    pub properties: Vec<DeceasedProperty>,
    /// RRSP/RRIF fair market value at death.
    #[serde(deserialize_with = "lenient::amount")]
    pub registered_plan_balance: Decimal,
    #[serde(deserialize_with = "lenient::flag")]
    pub registered_plan_to_spouse: bool,
    /// Net capital losses carried forward, already at the inclusion rate.
    #[serde(deserialize_with = "lenient::amount")]
    pub net_capital_losses: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathResult {
    pub province: Province,
    pub dispositions: Vec<PropertyDisposition>,
    pub total_deemed_proceeds: Decimal,
    /// Gain left untaxed by spousal rollovers.
    pub spousal_deferred_gain: Decimal,
    pub net_capital_gain: Decimal,
    pub net_capital_loss: Decimal,
    pub taxable_capital_gain: Decimal,
    pub non_taxable_portion: Decimal,
    pub allowable_capital_loss: Decimal,
    pub registered_plan_inclusion: Decimal,

    pub net_capital_losses_applied_to_gains: Decimal,
    pub losses_applied_to_other_income: Decimal,
    pub unused_losses: Decimal,

    pub total_income: Decimal,
    pub taxable_income: Decimal,
    pub federal_tax: Decimal,
    pub quebec_abatement: Decimal,
    pub provincial_tax: Decimal,
    pub federal_credits: Decimal,
    pub provincial_credits: Decimal,
    pub terminal_tax: Decimal,
    pub effective_rate: Decimal,
}

impl DeathResult {
    pub fn breakdown(&self) -> Vec<BreakdownLine> {
        vec![
            BreakdownLine::money("Deemed proceeds", self.total_deemed_proceeds),
            BreakdownLine::money("Gain deferred to spouse", self.spousal_deferred_gain),
            BreakdownLine::money("Taxable capital gain", self.taxable_capital_gain),
            BreakdownLine::money("Registered plan income", self.registered_plan_inclusion),
            BreakdownLine::money(
                "Net capital losses against gains",
                self.net_capital_losses_applied_to_gains,
            ),
            BreakdownLine::money(
                "Losses against other income",
                self.losses_applied_to_other_income,
            ),
            BreakdownLine::money("Taxable income", self.taxable_income),
            BreakdownLine::money("Federal tax", self.federal_tax),
            BreakdownLine::money("Provincial tax", self.provincial_tax),
            BreakdownLine::money("Terminal tax", self.terminal_tax),
            BreakdownLine::rate("Effective rate", self.effective_rate),
        ]
    }
}

/// How carried-forward and current losses are absorbed.
#[derive(Debug, Clone, Copy)]
struct LossApplication {
    against_gains: Decimal,
    against_other_income: Decimal,
    unused: Decimal,
}

/// Calculator for [`DeathInput`].
#[derive(Debug, Clone)]
pub struct DeathCalculator<'a> {
    tables: &'a RateTables,
    config: &'a TaxYearConfig,
}

impl<'a> DeathCalculator<'a> {
    pub fn new(
        tables: &'a RateTables,
        config: &'a TaxYearConfig,
    ) -> Self {
        Self { tables, config }
    }

    pub fn calculate(
        &self,
        input: &DeathInput,
    ) -> Result<DeathResult, CalcError> {
        let jurisdiction = Jurisdiction::resolve(self.tables, self.config, input.province)?;
        let inclusion_rate = self.config.capital_gains_inclusion_rate;

        let dispositions: Vec<PropertyDisposition> = input
            .properties
            .iter()
            .map(|p| {
                let proceeds = if p.to_spouse { p.acb } else { p.fmv };
                PropertyDisposition::new(&p.description, proceeds, p.acb, false)
            })
            .collect();
        let total_deemed_proceeds: Decimal = dispositions.iter().map(|d| d.proceeds).sum();
        let spousal_deferred_gain: Decimal = input
            .properties
            .iter()
            .filter(|p| p.to_spouse)
            .map(|p| non_negative(p.fmv - non_negative(p.acb)))
            .sum();

        let net = NetGain::of(&dispositions);
        let taxable_capital_gain = round_half_up(net.net_gain * inclusion_rate);
        let allowable_capital_loss = round_half_up(net.net_loss * inclusion_rate);

        let registered_plan_inclusion = if input.registered_plan_to_spouse {
            Decimal::ZERO
        } else {
            non_negative(input.registered_plan_balance)
        };
        let other_income = non_negative(input.other_income) + registered_plan_inclusion;
        let total_income = other_income + taxable_capital_gain;

        let losses = self.apply_losses(
            non_negative(input.net_capital_losses),
            allowable_capital_loss,
            taxable_capital_gain,
            other_income,
        );
        let taxable_income =
            non_negative(total_income - losses.against_gains - losses.against_other_income);

        let tax = jurisdiction.income_tax(taxable_income);
        let credits = CreditAggregator::new(self.config, jurisdiction.federal).compute(
            &CreditInput {
                net_income: total_income,
                taxable_income: Some(taxable_income),
                age: input.age,
                ..Default::default()
            },
            input.province,
        )?;
        let net_federal_tax =
            non_negative(tax.federal - tax.abatement - credits.total_federal_credits);
        let net_provincial_tax = non_negative(tax.provincial - credits.total_provincial_credits);
        let terminal_tax = net_federal_tax + net_provincial_tax;

        debug!(
            province = %input.province,
            taxable_income = %taxable_income,
            terminal_tax = %terminal_tax,
            "Computed terminal return"
        );

        Ok(DeathResult {
            province: input.province,
            dispositions,
            total_deemed_proceeds,
            spousal_deferred_gain,
            net_capital_gain: net.net_gain,
            net_capital_loss: net.net_loss,
            taxable_capital_gain,
            non_taxable_portion: net.net_gain - taxable_capital_gain,
            allowable_capital_loss,
            registered_plan_inclusion,
            net_capital_losses_applied_to_gains: losses.against_gains,
            losses_applied_to_other_income: losses.against_other_income,
            unused_losses: losses.unused,
            total_income,
            taxable_income,
            federal_tax: tax.federal,
            quebec_abatement: tax.abatement,
            provincial_tax: tax.provincial,
            federal_credits: credits.total_federal_credits,
            provincial_credits: credits.total_provincial_credits,
            terminal_tax,
            effective_rate: round_rate(ratio(terminal_tax, total_income)),
        })
    }

    /// Carried-forward losses go against taxable gains first; the remainder
    /// and this year's allowable loss go against other income.
    fn apply_losses(
        &self,
        carried_forward: Decimal,
        current_allowable_loss: Decimal,
        taxable_capital_gain: Decimal,
        other_income: Decimal,
    ) -> LossApplication {
        let against_gains = carried_forward.min(taxable_capital_gain);
        let remaining = carried_forward - against_gains + current_allowable_loss;
        let against_other_income = remaining.min(other_income);

        LossApplication {
            against_gains,
            against_other_income,
            unused: remaining - against_other_income,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::calculations::entities::fixtures::rate_tables_2024;

    fn property(
        fmv: Decimal,
        acb: Decimal,
        to_spouse: bool,
    ) -> DeceasedProperty {
        DeceasedProperty {
            description: "property".to_string(),
            fmv,
            acb,
            to_spouse,
        }
    }

    fn calculate(input: DeathInput) -> DeathResult {
        let tables = rate_tables_2024();
        let config = TaxYearConfig::default();
        DeathCalculator::new(&tables, &config)
            .calculate(&input)
            .unwrap()
    }

    #[test]
    fn spousal_rollover_defers_gain() {
        let result = calculate(DeathInput {
            age: 70,
            other_income: dec!(40000),
            properties: vec![
                property(dec!(500000), dec!(200000), false),
                property(dec!(300000), dec!(100000), true),
            ],
            registered_plan_balance: dec!(100000),
            net_capital_losses: dec!(30000),
            ..Default::default()
        });

        assert_eq!(result.total_deemed_proceeds, dec!(600000));
        assert_eq!(result.spousal_deferred_gain, dec!(200000));
        assert_eq!(result.taxable_capital_gain, dec!(150000.00));
        assert_eq!(result.registered_plan_inclusion, dec!(100000));
        assert_eq!(result.net_capital_losses_applied_to_gains, dec!(30000));
        // 40000 + 100000 + 150000 − 30000
        assert_eq!(result.taxable_income, dec!(260000.00));
    }

    #[test]
    fn registered_plan_to_spouse_is_not_income() {
        let result = calculate(DeathInput {
            registered_plan_balance: dec!(250000),
            registered_plan_to_spouse: true,
            ..Default::default()
        });

        assert_eq!(result.registered_plan_inclusion, dec!(0));
        assert_eq!(result.terminal_tax, dec!(0));
    }

    #[test]
    fn excess_losses_offset_other_income() {
        let result = calculate(DeathInput {
            other_income: dec!(60000),
            properties: vec![property(dec!(90000), dec!(50000), false)],
            net_capital_losses: dec!(50000),
            ..Default::default()
        });

        assert_eq!(result.net_capital_losses_applied_to_gains, dec!(20000.00));
        assert_eq!(result.losses_applied_to_other_income, dec!(30000.00));
        assert_eq!(result.unused_losses, dec!(0));
        assert_eq!(result.taxable_income, dec!(30000.00));
    }

    #[test]
    fn current_year_loss_offsets_other_income() {
        let result = calculate(DeathInput {
            other_income: dec!(60000),
            properties: vec![property(dec!(10000), dec!(50000), false)],
            ..Default::default()
        });

        assert_eq!(result.allowable_capital_loss, dec!(20000.00));
        assert_eq!(result.losses_applied_to_other_income, dec!(20000.00));
        assert_eq!(result.taxable_income, dec!(40000.00));
    }

    #[test]
    fn terminal_tax_matches_ordinary_return_without_dispositions() {
        let result = calculate(DeathInput {
            age: 40,
            other_income: dec!(60000),
            ..Default::default()
        });

        // Same as an Ontario salary of 60000
        assert_eq!(result.terminal_tax, dec!(9626.13));
    }
}
