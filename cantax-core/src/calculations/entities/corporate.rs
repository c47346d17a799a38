//! Corporate income tax with integration account updates.
//!
//! Taxable income is split into three mutually exclusive buckets, filled in
//! priority order and each capped at what is left:
//!
//! 1. SBD-eligible active business income (CCPCs only)
//! 2. Aggregate investment income (CCPCs only; taxed at the investment rate)
//! 3. Everything else, at the general rate
//!
//! Portfolio dividends received are deducted from taxable income and instead
//! attract Part IV tax. The integration ledger then turns the year's activity
//! into RDTOH, GRIP, LRIP and CDA movements and a dividend refund.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::BreakdownLine;
use crate::calculations::common::{non_negative, ratio, round_half_up, round_rate};
use crate::calculations::ledger::{IntegrationLedger, LedgerActivity, LedgerResult};
use crate::calculations::sbd::{SbdInput, SbdResult, SmallBusinessDeduction};
use crate::error::CalcError;
use crate::lenient;
use crate::{IntegrationAccountBalances, Province, RateTables, TaxYearConfig};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorporateInput {
    #[serde(deserialize_with = "lenient::province")]
    pub province: Province,
    /// Canadian-controlled private corporation. Defaults to `true`.
    #[serde(deserialize_with = "lenient::flag")]
    pub is_ccpc: bool,
    #[serde(deserialize_with = "lenient::amount")]
    pub active_business_income: Decimal,
    /// Aggregate investment income: interest, rents, taxable capital gains.
    #[serde(deserialize_with = "lenient::amount")]
    pub investment_income: Decimal,
    /// Income that is neither active business nor investment income.
    #[serde(deserialize_with = "lenient::amount")]
    pub other_income: Decimal,
    /// Loss carryforwards, donations and other Division C deductions.
    #[serde(deserialize_with = "lenient::amount")]
    pub deductions: Decimal,
    #[serde(deserialize_with = "lenient::amount")]
    pub eligible_dividends_received: Decimal,
    #[serde(deserialize_with = "lenient::amount")]
    pub non_eligible_dividends_received: Decimal,

    #[serde(deserialize_with = "lenient::amount")]
    pub taxable_capital: Decimal,
    #[serde(deserialize_with = "lenient::amount")]
    pub associated_taxable_capital: Decimal,
    /// Prior-year adjusted aggregate investment income. `None` uses this
    /// year's `investment_income`.
    #[serde(deserialize_with = "lenient::optional_amount")]
    pub passive_income: Option<Decimal>,
    /// `None` leaves the business limit unrestricted.
    #[serde(deserialize_with = "lenient::optional_amount")]
    pub assigned_business_limit: Option<Decimal>,
    /// `None` means 100%.
    #[serde(deserialize_with = "lenient::optional_amount")]
    pub eligibility_percentage: Option<Decimal>,

    /// Non-taxable portion of capital gains realized this year.
    #[serde(deserialize_with = "lenient::amount")]
    pub non_taxable_capital_gains: Decimal,
    /// Capital dividends and life insurance proceeds received.
    #[serde(deserialize_with = "lenient::amount")]
    pub other_cda_receipts: Decimal,
    #[serde(deserialize_with = "lenient::amount")]
    pub eligible_dividends_paid: Decimal,
    #[serde(deserialize_with = "lenient::amount")]
    pub non_eligible_dividends_paid: Decimal,
    #[serde(deserialize_with = "lenient::amount")]
    pub capital_dividends_paid: Decimal,

    /// Prior year closing balances.
    #[serde(deserialize_with = "lenient::balances")]
    pub opening_balances: IntegrationAccountBalances,
}

impl Default for CorporateInput {
    fn default() -> Self {
        Self {
            province: Province::default(),
            is_ccpc: true,
            active_business_income: Decimal::ZERO,
            investment_income: Decimal::ZERO,
            other_income: Decimal::ZERO,
            deductions: Decimal::ZERO,
            eligible_dividends_received: Decimal::ZERO,
            non_eligible_dividends_received: Decimal::ZERO,
            taxable_capital: Decimal::ZERO,
            associated_taxable_capital: Decimal::ZERO,
            passive_income: None,
            assigned_business_limit: None,
            eligibility_percentage: None,
            non_taxable_capital_gains: Decimal::ZERO,
            other_cda_receipts: Decimal::ZERO,
            eligible_dividends_paid: Decimal::ZERO,
            non_eligible_dividends_paid: Decimal::ZERO,
            capital_dividends_paid: Decimal::ZERO,
            opening_balances: IntegrationAccountBalances::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorporateResult {
    pub province: Province,
    pub is_ccpc: bool,
    pub taxable_income: Decimal,
    /// `None` for corporations that are not CCPCs.
    pub sbd: Option<SbdResult>,

    pub small_business_income: Decimal,
    pub investment_income: Decimal,
    pub general_rate_income: Decimal,

    pub federal_small_business_tax: Decimal,
    pub federal_investment_tax: Decimal,
    pub federal_general_tax: Decimal,
    pub federal_tax: Decimal,
    pub provincial_small_business_tax: Decimal,
    pub provincial_general_tax: Decimal,
    pub provincial_tax: Decimal,

    pub part_i_tax: Decimal,
    pub part_iv_tax: Decimal,
    pub total_tax: Decimal,
    pub dividend_refund: Decimal,
    /// Total tax less the dividend refund; negative when the refund exceeds
    /// this year's tax.
    pub net_tax_after_refund: Decimal,
    /// Part I tax over taxable income.
    pub effective_rate: Decimal,

    pub ledger: LedgerResult,
    pub closing_balances: IntegrationAccountBalances,
}

impl CorporateResult {
    pub fn breakdown(&self) -> Vec<BreakdownLine> {
        let mut lines = vec![
            BreakdownLine::money("Taxable income", self.taxable_income),
            BreakdownLine::money("Small business income", self.small_business_income),
            BreakdownLine::money("Investment income", self.investment_income),
            BreakdownLine::money("General rate income", self.general_rate_income),
        ];
        if let Some(sbd) = &self.sbd {
            lines.push(BreakdownLine::money(
                "Business limit after grinds",
                sbd.reduced_business_limit,
            ));
            lines.push(BreakdownLine::money("Small business deduction", sbd.sbd_amount));
        }
        lines.extend([
            BreakdownLine::money("Federal tax", self.federal_tax),
            BreakdownLine::money("Provincial tax", self.provincial_tax),
            BreakdownLine::money("Part IV tax", self.part_iv_tax),
            BreakdownLine::money("Total tax", self.total_tax),
            BreakdownLine::money("Dividend refund", self.dividend_refund),
            BreakdownLine::money("Net tax after refund", self.net_tax_after_refund),
            BreakdownLine::rate("Effective rate", self.effective_rate),
            BreakdownLine::money("Closing eligible RDTOH", self.closing_balances.eligible_rdtoh),
            BreakdownLine::money(
                "Closing non-eligible RDTOH",
                self.closing_balances.non_eligible_rdtoh,
            ),
            BreakdownLine::money("Closing GRIP", self.closing_balances.grip),
            BreakdownLine::money("Closing LRIP", self.closing_balances.lrip),
            BreakdownLine::money("Closing CDA", self.closing_balances.cda),
        ]);
        lines
    }
}

/// Calculator for [`CorporateInput`].
#[derive(Debug, Clone)]
pub struct CorporateCalculator<'a> {
    config: &'a TaxYearConfig,
}

/// Taxable income split across the three rate buckets.
#[derive(Debug, Clone, Copy)]
struct Allocation {
    small_business: Decimal,
    investment: Decimal,
    general: Decimal,
}

impl<'a> CorporateCalculator<'a> {
    /// Corporate rates are flat, so the bracket tables go unused.
    pub fn new(
        _tables: &'a RateTables,
        config: &'a TaxYearConfig,
    ) -> Self {
        Self { config }
    }

    pub fn calculate(
        &self,
        input: &CorporateInput,
    ) -> Result<CorporateResult, CalcError> {
        let provincial = self
            .config
            .provincial(input.province)
            .ok_or(CalcError::MissingProvincialParameters(input.province))?;
        let corporate = &self.config.corporate;

        let taxable_income = non_negative(
            input.active_business_income + input.investment_income + input.other_income
                - non_negative(input.deductions),
        );

        let sbd = input.is_ccpc.then(|| {
            SmallBusinessDeduction::new(corporate).calculate(
                &SbdInput {
                    active_business_income: input.active_business_income,
                    taxable_capital: input.taxable_capital,
                    associated_taxable_capital: input.associated_taxable_capital,
                    passive_income: input.passive_income.unwrap_or(input.investment_income),
                    assigned_business_limit: input.assigned_business_limit,
                    eligibility_percentage: input.eligibility_percentage,
                },
                provincial.small_business_rate,
            )
        });

        let allocation = self.allocate(input, taxable_income, sbd.as_ref());

        let federal_small_business_tax =
            round_half_up(allocation.small_business * corporate.federal_small_business_rate());
        let federal_investment_tax =
            round_half_up(allocation.investment * corporate.federal_investment_rate());
        let federal_general_tax =
            round_half_up(allocation.general * corporate.federal_general_rate());
        let federal_tax = federal_small_business_tax + federal_investment_tax + federal_general_tax;

        let provincial_small_business_tax =
            round_half_up(allocation.small_business * provincial.small_business_rate);
        let provincial_general_tax = round_half_up(
            (allocation.investment + allocation.general) * provincial.general_corporate_rate,
        );
        let provincial_tax = provincial_small_business_tax + provincial_general_tax;
        let part_i_tax = federal_tax + provincial_tax;

        let activity = self.ledger_activity(
            input,
            allocation,
            federal_small_business_tax + provincial_small_business_tax,
        );
        let ledger = IntegrationLedger::new(corporate).apply(&input.opening_balances, &activity);

        let part_iv_tax = ledger.part_iv_tax();
        let total_tax = part_i_tax + part_iv_tax;
        let dividend_refund = ledger.dividend_refund;
        let closing_balances = ledger.closing_balances();

        debug!(
            province = %input.province,
            taxable_income = %taxable_income,
            part_i_tax = %part_i_tax,
            dividend_refund = %dividend_refund,
            "Computed corporate tax"
        );

        Ok(CorporateResult {
            province: input.province,
            is_ccpc: input.is_ccpc,
            taxable_income,
            sbd,
            small_business_income: allocation.small_business,
            investment_income: allocation.investment,
            general_rate_income: allocation.general,
            federal_small_business_tax,
            federal_investment_tax,
            federal_general_tax,
            federal_tax,
            provincial_small_business_tax,
            provincial_general_tax,
            provincial_tax,
            part_i_tax,
            part_iv_tax,
            total_tax,
            dividend_refund,
            net_tax_after_refund: total_tax - dividend_refund,
            effective_rate: round_rate(ratio(part_i_tax, taxable_income)),
            ledger,
            closing_balances,
        })
    }

    /// SBD → investment → general, each capped at the income still
    /// unallocated.
    fn allocate(
        &self,
        input: &CorporateInput,
        taxable_income: Decimal,
        sbd: Option<&SbdResult>,
    ) -> Allocation {
        let mut remaining = taxable_income;

        let small_business = sbd.map_or(Decimal::ZERO, |s| s.sbd_eligible_income.min(remaining));
        remaining -= small_business;

        let investment = if input.is_ccpc {
            non_negative(input.investment_income).min(remaining)
        } else {
            Decimal::ZERO
        };
        remaining -= investment;

        Allocation {
            small_business,
            investment,
            general: remaining,
        }
    }

    fn ledger_activity(
        &self,
        input: &CorporateInput,
        allocation: Allocation,
        small_business_tax: Decimal,
    ) -> LedgerActivity {
        // Refundable taxes and GRIP exist for private corporations only.
        let (eligible_received, non_eligible_received, general_rate_income) = if input.is_ccpc {
            (
                input.eligible_dividends_received,
                input.non_eligible_dividends_received,
                allocation.general,
            )
        } else {
            (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO)
        };

        LedgerActivity {
            eligible_dividends_received: eligible_received,
            non_eligible_dividends_received: non_eligible_received,
            aggregate_investment_income: allocation.investment,
            general_rate_income,
            low_rate_income_after_tax: non_negative(allocation.small_business - small_business_tax),
            non_taxable_capital_gains: input.non_taxable_capital_gains,
            other_cda_receipts: input.other_cda_receipts,
            inherited: IntegrationAccountBalances::default(),
            eligible_dividends_paid: input.eligible_dividends_paid,
            non_eligible_dividends_paid: input.non_eligible_dividends_paid,
            capital_dividends_paid: input.capital_dividends_paid,
        }
    }
}
