//! Deemed disposition on ceasing to be resident in Canada.
//!
//! Every property not excluded (Canadian real property, pensions and the
//! like) is deemed sold at fair market value the day before departure. The
//! departure tax is the extra tax those gains add on top of the year's other
//! income. Tax on the first $100,000 of gains may be deferred without posting
//! security; the rest needs security. Property worth more than $25,000 in
//! total must be reported on form T1161.
//!
//! Individuals have no integration accounts, so the untaxed half of the gain
//! is reported instead of a ledger.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::BreakdownLine;
use super::jurisdiction::Jurisdiction;
use crate::calculations::common::{non_negative, round_half_up};
use crate::error::CalcError;
use crate::lenient;
use crate::{Province, RateTables, TaxYearConfig};

/// Property held on the day before departure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeemedProperty {
    #[serde(deserialize_with = "lenient::text")]
    pub description: String,
    #[serde(deserialize_with = "lenient::amount")]
    pub fmv: Decimal,
    #[serde(deserialize_with = "lenient::amount")]
    pub acb: Decimal,
    /// Property exempt from the deemed disposition.
    #[serde(deserialize_with = "lenient::flag")]
    pub excluded: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepartureInput {
    #[serde(deserialize_with = "lenient::province")]
    pub province: Province,
    /// Income for the part of the year before departure.
    #[serde(deserialize_with = "lenient::amount")]
    pub other_income: Decimal,
    #[serde(deserialize_with = "lenient::list")]
    pub properties: Vec<DeemedProperty>,
}

/// Outcome for one property.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDisposition {
    pub description: String,
    pub proceeds: Decimal,
    pub acb: Decimal,
    pub gain: Decimal,
    pub loss: Decimal,
    /// Excluded from, or rolled over out of, the deemed disposition.
    pub deferred: bool,
}

impl PropertyDisposition {
    pub(crate) fn new(
        description: &str,
        proceeds: Decimal,
        acb: Decimal,
        deferred: bool,
    ) -> Self {
        let proceeds = non_negative(proceeds);
        let acb = non_negative(acb);
        let (gain, loss) = if deferred {
            (Decimal::ZERO, Decimal::ZERO)
        } else {
            (non_negative(proceeds - acb), non_negative(acb - proceeds))
        };

        Self {
            description: description.to_string(),
            proceeds,
            acb,
            gain,
            loss,
            deferred,
        }
    }
}

/// Gains and losses summed across dispositions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct NetGain {
    pub gains: Decimal,
    pub losses: Decimal,
    pub net_gain: Decimal,
    pub net_loss: Decimal,
}

impl NetGain {
    pub fn of(dispositions: &[PropertyDisposition]) -> Self {
        let gains: Decimal = dispositions.iter().map(|d| d.gain).sum();
        let losses: Decimal = dispositions.iter().map(|d| d.loss).sum();

        Self {
            gains,
            losses,
            net_gain: non_negative(gains - losses),
            net_loss: non_negative(losses - gains),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartureResult {
    pub province: Province,
    pub dispositions: Vec<PropertyDisposition>,
    pub total_fair_market_value: Decimal,
    pub total_gains: Decimal,
    pub total_losses: Decimal,
    pub net_capital_gain: Decimal,
    pub net_capital_loss: Decimal,
    pub taxable_capital_gain: Decimal,
    pub non_taxable_portion: Decimal,
    pub departure_tax: Decimal,
    pub tax_deferrable_without_security: Decimal,
    pub security_required: Decimal,
    /// Form T1161 must be filed.
    pub reporting_required: bool,
}

impl DepartureResult {
    pub fn breakdown(&self) -> Vec<BreakdownLine> {
        let mut lines: Vec<BreakdownLine> = self
            .dispositions
            .iter()
            .filter(|d| !d.deferred)
            .map(|d| BreakdownLine::money(format!("Gain on {}", d.description), d.gain - d.loss))
            .collect();

        lines.extend([
            BreakdownLine::money("Fair market value of property", self.total_fair_market_value),
            BreakdownLine::money("Net capital gain", self.net_capital_gain),
            BreakdownLine::money("Taxable capital gain", self.taxable_capital_gain),
            BreakdownLine::money("Departure tax", self.departure_tax),
            BreakdownLine::money(
                "Deferrable without security",
                self.tax_deferrable_without_security,
            ),
            BreakdownLine::money("Security required", self.security_required),
            BreakdownLine::flag("T1161 required", self.reporting_required),
        ]);
        lines
    }
}

/// Calculator for [`DepartureInput`].
#[derive(Debug, Clone)]
pub struct DepartureCalculator<'a> {
    tables: &'a RateTables,
    config: &'a TaxYearConfig,
}

impl<'a> DepartureCalculator<'a> {
    pub fn new(
        tables: &'a RateTables,
        config: &'a TaxYearConfig,
    ) -> Self {
        Self { tables, config }
    }

    pub fn calculate(
        &self,
        input: &DepartureInput,
    ) -> Result<DepartureResult, CalcError> {
        let jurisdiction = Jurisdiction::resolve(self.tables, self.config, input.province)?;
        let departure = &self.config.departure;
        let inclusion_rate = self.config.capital_gains_inclusion_rate;

        let dispositions: Vec<PropertyDisposition> = input
            .properties
            .iter()
            .map(|p| PropertyDisposition::new(&p.description, p.fmv, p.acb, p.excluded))
            .collect();
        let total_fair_market_value: Decimal = dispositions
            .iter()
            .filter(|d| !d.deferred)
            .map(|d| d.proceeds)
            .sum();

        let net = NetGain::of(&dispositions);
        let taxable_capital_gain = round_half_up(net.net_gain * inclusion_rate);
        let base_income = non_negative(input.other_income);
        let departure_tax = jurisdiction.incremental_tax(base_income, taxable_capital_gain);

        let deferrable_gain = net.net_gain.min(departure.security_exempt_gain);
        let tax_deferrable_without_security = jurisdiction
            .incremental_tax(base_income, round_half_up(deferrable_gain * inclusion_rate));
        let security_required = non_negative(departure_tax - tax_deferrable_without_security);

        debug!(
            province = %input.province,
            net_capital_gain = %net.net_gain,
            departure_tax = %departure_tax,
            "Computed departure tax"
        );

        Ok(DepartureResult {
            province: input.province,
            dispositions,
            total_fair_market_value,
            total_gains: net.gains,
            total_losses: net.losses,
            net_capital_gain: net.net_gain,
            net_capital_loss: net.net_loss,
            taxable_capital_gain,
            non_taxable_portion: net.net_gain - taxable_capital_gain,
            departure_tax,
            tax_deferrable_without_security,
            security_required,
            reporting_required: total_fair_market_value > departure.reporting_threshold,
        })
    }
}
