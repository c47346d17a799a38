//! Personal income tax for one resident individual.
//!
//! | Step | Amount |
//! |------|--------|
//! | Total income | salary + other + business + taxable capital gains + grossed-up dividends |
//! | Net income | total income − RRSP − other deductions |
//! | Bracket tax | federal and provincial schedules on net income |
//! | Abatement | federal tax × 16.5%, Quebec residents only |
//! | Net tax | each jurisdiction's tax less its credits, floored at zero |

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::BreakdownLine;
use super::jurisdiction::Jurisdiction;
use crate::calculations::common::{non_negative, ratio, round_half_up, round_rate};
use crate::calculations::credits::{CreditAggregator, CreditInput, CreditSummary, gross_up};
use crate::error::CalcError;
use crate::lenient;
use crate::{Province, RateTables, TaxYearConfig};

/// Income, deductions and credit claims of one individual.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndividualInput {
    #[serde(deserialize_with = "lenient::province")]
    pub province: Province,
    #[serde(deserialize_with = "lenient::count")]
    pub age: u32,
    #[serde(deserialize_with = "lenient::amount")]
    pub salary: Decimal,
    #[serde(deserialize_with = "lenient::amount")]
    pub other_income: Decimal,
    /// Net business income; a loss reduces total income.
    #[serde(deserialize_with = "lenient::amount")]
    pub business_income: Decimal,
    /// Realized capital gains before inclusion.
    #[serde(deserialize_with = "lenient::amount")]
    pub capital_gains: Decimal,
    #[serde(deserialize_with = "lenient::amount")]
    pub eligible_dividends: Decimal,
    #[serde(deserialize_with = "lenient::amount")]
    pub non_eligible_dividends: Decimal,
    #[serde(deserialize_with = "lenient::amount")]
    pub rrsp_deduction: Decimal,
    #[serde(deserialize_with = "lenient::amount")]
    pub other_deductions: Decimal,
    #[serde(deserialize_with = "lenient::amount")]
    pub medical_expenses: Decimal,
    #[serde(deserialize_with = "lenient::amount")]
    pub donations: Decimal,
    #[serde(deserialize_with = "lenient::amount")]
    pub tuition: Decimal,
    /// Income tax already deducted at source.
    #[serde(deserialize_with = "lenient::amount")]
    pub tax_withheld: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndividualResult {
    pub province: Province,
    pub taxable_capital_gains: Decimal,
    pub grossed_up_eligible_dividends: Decimal,
    pub grossed_up_non_eligible_dividends: Decimal,
    pub total_income: Decimal,
    pub total_deductions: Decimal,
    pub net_income: Decimal,
    pub taxable_income: Decimal,

    pub federal_tax: Decimal,
    pub quebec_abatement: Decimal,
    pub provincial_tax: Decimal,
    pub credits: CreditSummary,
    pub net_federal_tax: Decimal,
    pub net_provincial_tax: Decimal,
    pub net_tax: Decimal,

    pub marginal_rate: Decimal,
    pub effective_rate: Decimal,
    pub tax_withheld: Decimal,
    /// Net tax less tax withheld; negative is a refund.
    pub balance_owing: Decimal,
}

impl IndividualResult {
    pub fn breakdown(&self) -> Vec<BreakdownLine> {
        vec![
            BreakdownLine::money("Total income", self.total_income),
            BreakdownLine::money("Deductions", self.total_deductions),
            BreakdownLine::money("Taxable income", self.taxable_income),
            BreakdownLine::money("Federal tax", self.federal_tax),
            BreakdownLine::money("Quebec abatement", self.quebec_abatement),
            BreakdownLine::money("Federal credits", self.credits.total_federal_credits),
            BreakdownLine::money("Net federal tax", self.net_federal_tax),
            BreakdownLine::money("Provincial tax", self.provincial_tax),
            BreakdownLine::money("Provincial credits", self.credits.total_provincial_credits),
            BreakdownLine::money("Net provincial tax", self.net_provincial_tax),
            BreakdownLine::money("Net tax", self.net_tax),
            BreakdownLine::rate("Marginal rate", self.marginal_rate),
            BreakdownLine::rate("Effective rate", self.effective_rate),
            BreakdownLine::money("Balance owing", self.balance_owing),
        ]
    }
}

/// Calculator for [`IndividualInput`].
#[derive(Debug, Clone)]
pub struct IndividualCalculator<'a> {
    tables: &'a RateTables,
    config: &'a TaxYearConfig,
}

impl<'a> IndividualCalculator<'a> {
    pub fn new(
        tables: &'a RateTables,
        config: &'a TaxYearConfig,
    ) -> Self {
        Self { tables, config }
    }

    pub fn calculate(
        &self,
        input: &IndividualInput,
    ) -> Result<IndividualResult, CalcError> {
        let jurisdiction = Jurisdiction::resolve(self.tables, self.config, input.province)?;
        let federal = &self.config.federal;

        let taxable_capital_gains = round_half_up(
            non_negative(input.capital_gains) * self.config.capital_gains_inclusion_rate,
        );
        let grossed_up_eligible_dividends =
            gross_up(input.eligible_dividends, federal.eligible_dividend_gross_up);
        let grossed_up_non_eligible_dividends =
            gross_up(input.non_eligible_dividends, federal.non_eligible_dividend_gross_up);

        let inclusions = taxable_capital_gains
            + grossed_up_eligible_dividends
            + grossed_up_non_eligible_dividends;
        let total_income = self.total_income(input, inclusions);
        let total_deductions =
            non_negative(input.rrsp_deduction) + non_negative(input.other_deductions);
        let net_income = non_negative(total_income - total_deductions);
        let taxable_income = net_income;

        let tax = jurisdiction.income_tax(taxable_income);

        let credits = CreditAggregator::new(self.config, jurisdiction.federal).compute(
            &CreditInput {
                net_income,
                taxable_income: Some(taxable_income),
                age: input.age,
                eligible_dividends: input.eligible_dividends,
                non_eligible_dividends: input.non_eligible_dividends,
                medical_expenses: input.medical_expenses,
                donations: input.donations,
                tuition: input.tuition,
            },
            input.province,
        )?;

        let net_federal_tax =
            non_negative(tax.federal - tax.abatement - credits.total_federal_credits);
        let net_provincial_tax = non_negative(tax.provincial - credits.total_provincial_credits);
        let net_tax = net_federal_tax + net_provincial_tax;

        let marginal_rate = jurisdiction.marginal_rate(taxable_income);
        let effective_rate = round_rate(ratio(net_tax, total_income));
        let tax_withheld = non_negative(input.tax_withheld);

        debug!(
            province = %input.province,
            taxable_income = %taxable_income,
            net_tax = %net_tax,
            "Computed individual tax"
        );

        Ok(IndividualResult {
            province: input.province,
            taxable_capital_gains,
            grossed_up_eligible_dividends,
            grossed_up_non_eligible_dividends,
            total_income,
            total_deductions,
            net_income,
            taxable_income,
            federal_tax: tax.federal,
            quebec_abatement: tax.abatement,
            provincial_tax: tax.provincial,
            credits,
            net_federal_tax,
            net_provincial_tax,
            net_tax,
            marginal_rate,
            effective_rate,
            tax_withheld,
            balance_owing: net_tax - tax_withheld,
        })
    }

    /// Income from every source; a business loss offsets other income but
    /// the total never drops below zero.
    fn total_income(
        &self,
        input: &IndividualInput,
        inclusions: Decimal,
    ) -> Decimal {
        non_negative(
            non_negative(input.salary)
                + non_negative(input.other_income)
                + input.business_income
                + inclusions,
        )
    }
}
