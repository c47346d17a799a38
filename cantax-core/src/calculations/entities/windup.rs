//! Section 88(1) wind-up of a wholly owned subsidiary into its parent.
//!
//! The parent's proceeds on the cancelled subsidiary shares are the greater
//! of their ACB and the lesser of their paid-up capital and the net tax cost
//! of the subsidiary's property. Any gain is taxed like other investment
//! income.
//!
//! Where the share ACB exceeds the net cost of the property received, the
//! excess (less pre-acquisition dividends) may bump the cost of eligible
//! capital property, but never past its fair market value.
//!
//! The subsidiary's GRIP, LRIP, CDA and RDTOH pass to the parent.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::BreakdownLine;
use crate::calculations::common::{max, non_negative, round_half_up};
use crate::calculations::ledger::{IntegrationLedger, LedgerActivity, LedgerResult};
use crate::error::CalcError;
use crate::lenient;
use crate::{IntegrationAccountBalances, RateTables, TaxYearConfig};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindUpInput {
    /// Parent's ACB of the subsidiary shares.
    #[serde(deserialize_with = "lenient::amount")]
    pub share_acb: Decimal,
    /// Paid-up capital of the subsidiary shares.
    #[serde(deserialize_with = "lenient::amount")]
    pub paid_up_capital: Decimal,
    /// Tax cost of the subsidiary's property less its liabilities.
    #[serde(deserialize_with = "lenient::amount")]
    pub net_cost_amount: Decimal,
    /// Dividends the subsidiary paid the parent before the wind-up.
    #[serde(deserialize_with = "lenient::amount")]
    pub pre_acquisition_dividends: Decimal,
    /// FMV of bump-eligible capital property when control was acquired.
    #[serde(deserialize_with = "lenient::amount")]
    pub eligible_property_fmv: Decimal,
    /// Cost of that property to the subsidiary.
    #[serde(deserialize_with = "lenient::amount")]
    pub eligible_property_cost: Decimal,
    /// Subsidiary's closing balances.
    #[serde(deserialize_with = "lenient::balances")]
    pub subsidiary_balances: IntegrationAccountBalances,
    /// Parent's prior year closing balances.
    #[serde(deserialize_with = "lenient::balances")]
    pub opening_balances: IntegrationAccountBalances,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindUpResult {
    pub deemed_proceeds: Decimal,
    pub capital_gain: Decimal,
    pub taxable_capital_gain: Decimal,
    pub non_taxable_portion: Decimal,

    /// Share ACB over net cost, less pre-acquisition dividends.
    pub bump_room: Decimal,
    /// FMV over cost of the eligible property.
    pub bump_limit: Decimal,
    pub bump: Decimal,

    pub refundable_tax: Decimal,
    pub inherited_balances: IntegrationAccountBalances,
    pub ledger: LedgerResult,
    pub closing_balances: IntegrationAccountBalances,
}

impl WindUpResult {
    pub fn breakdown(&self) -> Vec<BreakdownLine> {
        vec![
            BreakdownLine::money("Deemed proceeds", self.deemed_proceeds),
            BreakdownLine::money("Capital gain", self.capital_gain),
            BreakdownLine::money("Taxable capital gain", self.taxable_capital_gain),
            BreakdownLine::money("Bump room", self.bump_room),
            BreakdownLine::money("Bump limit", self.bump_limit),
            BreakdownLine::money("Bump", self.bump),
            BreakdownLine::money("Refundable tax", self.refundable_tax),
            BreakdownLine::money("Inherited GRIP", self.inherited_balances.grip),
            BreakdownLine::money("Inherited CDA", self.inherited_balances.cda),
            BreakdownLine::money("Inherited RDTOH", self.inherited_balances.total_rdtoh()),
            BreakdownLine::money("Closing GRIP", self.closing_balances.grip),
            BreakdownLine::money("Closing CDA", self.closing_balances.cda),
        ]
    }
}

/// Calculator for [`WindUpInput`].
#[derive(Debug, Clone)]
pub struct WindUpCalculator<'a> {
    config: &'a TaxYearConfig,
}

impl<'a> WindUpCalculator<'a> {
    pub fn new(
        _tables: &'a RateTables,
        config: &'a TaxYearConfig,
    ) -> Self {
        Self { config }
    }

    pub fn calculate(
        &self,
        input: &WindUpInput,
    ) -> Result<WindUpResult, CalcError> {
        let share_acb = non_negative(input.share_acb);
        let net_cost_amount = non_negative(input.net_cost_amount);

        let deemed_proceeds = max(
            share_acb,
            non_negative(input.paid_up_capital).min(net_cost_amount),
        );
        let capital_gain = non_negative(deemed_proceeds - share_acb);
        let taxable_capital_gain =
            round_half_up(capital_gain * self.config.capital_gains_inclusion_rate);
        let non_taxable_portion = capital_gain - taxable_capital_gain;

        let bump_room = non_negative(
            share_acb - net_cost_amount - non_negative(input.pre_acquisition_dividends),
        );
        let bump_limit =
            non_negative(input.eligible_property_fmv - non_negative(input.eligible_property_cost));
        let bump = bump_room.min(bump_limit);

        let inherited_balances = input.subsidiary_balances.floored();
        let ledger = IntegrationLedger::new(&self.config.corporate).apply(
            &input.opening_balances,
            &LedgerActivity {
                aggregate_investment_income: taxable_capital_gain,
                non_taxable_capital_gains: non_taxable_portion,
                inherited: inherited_balances,
                ..Default::default()
            },
        );
        let closing_balances = ledger.closing_balances();

        debug!(
            deemed_proceeds = %deemed_proceeds,
            bump = %bump,
            closing_cda = %closing_balances.cda,
            "Computed section 88 wind-up"
        );

        Ok(WindUpResult {
            deemed_proceeds,
            capital_gain,
            taxable_capital_gain,
            non_taxable_portion,
            bump_room,
            bump_limit,
            bump,
            refundable_tax: ledger.refundable_part_i_tax,
            inherited_balances,
            ledger,
            closing_balances,
        })
    }
}
