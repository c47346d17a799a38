use rust_decimal::Decimal;

use crate::calculations::brackets::{compute_bracket_tax, compute_marginal_rate};
use crate::calculations::common::{round_half_up, round_rate};
use crate::error::CalcError;
use crate::{Province, ProvincialParameters, RateTables, TaxBracket, TaxYearConfig};

/// Rate schedules and parameters resolved for one province of residence.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Jurisdiction<'a> {
    pub province: Province,
    pub federal: &'a [TaxBracket],
    pub provincial: &'a [TaxBracket],
    pub params: &'a ProvincialParameters,
    pub abatement_rate: Decimal,
}

/// Bracket tax on one amount of taxable income, before credits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct IncomeTax {
    pub federal: Decimal,
    pub abatement: Decimal,
    pub provincial: Decimal,
}

impl IncomeTax {
    pub fn total(&self) -> Decimal {
        self.federal - self.abatement + self.provincial
    }
}

impl<'a> Jurisdiction<'a> {
    pub fn resolve(
        tables: &'a RateTables,
        config: &'a TaxYearConfig,
        province: Province,
    ) -> Result<Self, CalcError> {
        if tables.federal.is_empty() {
            return Err(CalcError::MissingFederalRateTable);
        }
        let provincial = tables
            .provincial(province)
            .ok_or(CalcError::MissingRateTable(province))?;
        let params = config
            .provincial(province)
            .ok_or(CalcError::MissingProvincialParameters(province))?;

        Ok(Self {
            province,
            federal: &tables.federal,
            provincial,
            params,
            abatement_rate: config.abatement_rate(province),
        })
    }

    pub fn income_tax(
        &self,
        taxable_income: Decimal,
    ) -> IncomeTax {
        let federal = compute_bracket_tax(taxable_income, self.federal);
        IncomeTax {
            federal,
            abatement: round_half_up(federal * self.abatement_rate),
            provincial: compute_bracket_tax(taxable_income, self.provincial),
        }
    }

    /// Tax on `base + increment` less tax on `base`, both before credits.
    pub fn incremental_tax(
        &self,
        base: Decimal,
        increment: Decimal,
    ) -> Decimal {
        self.income_tax(base + increment).total() - self.income_tax(base).total()
    }

    /// Federal (after abatement) plus provincial marginal rate.
    pub fn marginal_rate(
        &self,
        income: Decimal,
    ) -> Decimal {
        let federal = compute_marginal_rate(income, self.federal);
        let provincial = compute_marginal_rate(income, self.provincial);

        round_rate(federal * (Decimal::ONE - self.abatement_rate) + provincial)
    }
}
