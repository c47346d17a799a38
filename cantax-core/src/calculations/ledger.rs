//! Corporate integration accounts: RDTOH, GRIP, LRIP and CDA.
//!
//! Each account moves through one cycle per calculation:
//!
//! | Account | Addition | Reduction |
//! |---------|----------|-----------|
//! | Eligible RDTOH | Part IV tax on eligible dividends received | dividend refund |
//! | Non-eligible RDTOH | refundable Part I tax + Part IV tax on non-eligible dividends received | dividend refund |
//! | GRIP | general rate income × 72% + eligible dividends received | eligible dividends paid |
//! | LRIP | after-tax small business income + non-eligible dividends received | non-eligible dividends paid |
//! | CDA | non-taxable capital gains + other CDA receipts | capital dividends paid |
//!
//! Balances inherited on a wind-up are added to the matching account before
//! any reduction. A reduction never exceeds opening plus addition; whatever
//! the dividends paid could not absorb is reported on the result rather than
//! driving a balance negative.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use cantax_core::{CorporateParameters, IntegrationAccountBalances};
//! use cantax_core::calculations::ledger::{IntegrationLedger, LedgerActivity};
//!
//! let corporate = CorporateParameters::default();
//! let ledger = IntegrationLedger::new(&corporate);
//!
//! let opening = IntegrationAccountBalances {
//!     non_eligible_rdtoh: dec!(1000),
//!     ..Default::default()
//! };
//! let activity = LedgerActivity {
//!     non_eligible_dividends_paid: dec!(30000),
//!     ..Default::default()
//! };
//! let result = ledger.apply(&opening, &activity);
//!
//! // 30000 × 38⅓% = 11500 requested, only 1000 on hand
//! assert_eq!(result.dividend_refund, dec!(1000));
//! assert_eq!(result.non_eligible_rdtoh.closing, dec!(0));
//! assert_eq!(result.refund_shortfall, dec!(10500));
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::calculations::common::{non_negative, round_half_up};
use crate::{AccountMovement, CorporateParameters, IntegrationAccountBalances};

/// One year of activity affecting the integration accounts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerActivity {
    /// Eligible portfolio dividends received (subject to Part IV tax).
    pub eligible_dividends_received: Decimal,
    /// Non-eligible portfolio dividends received (subject to Part IV tax).
    pub non_eligible_dividends_received: Decimal,
    /// Aggregate investment income taxed under Part I.
    pub aggregate_investment_income: Decimal,
    /// Income taxed at the general corporate rate.
    pub general_rate_income: Decimal,
    /// Small business income remaining after tax.
    pub low_rate_income_after_tax: Decimal,
    /// Non-taxable portion of capital gains realized.
    pub non_taxable_capital_gains: Decimal,
    /// Capital dividends and life insurance proceeds received.
    pub other_cda_receipts: Decimal,
    /// Balances flowing in from a wound-up subsidiary.
    pub inherited: IntegrationAccountBalances,
    pub eligible_dividends_paid: Decimal,
    pub non_eligible_dividends_paid: Decimal,
    pub capital_dividends_paid: Decimal,
}

/// Movements of all five accounts plus the taxes and refund that drove them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerResult {
    pub eligible_rdtoh: AccountMovement,
    pub non_eligible_rdtoh: AccountMovement,
    pub grip: AccountMovement,
    pub lrip: AccountMovement,
    pub cda: AccountMovement,

    pub part_iv_tax_eligible: Decimal,
    pub part_iv_tax_non_eligible: Decimal,
    pub refundable_part_i_tax: Decimal,

    /// Refund generated by eligible dividends (eligible RDTOH only).
    pub eligible_dividend_refund: Decimal,
    /// Refund generated by non-eligible dividends (non-eligible RDTOH first,
    /// then whatever eligible RDTOH the eligible dividends left behind).
    pub non_eligible_dividend_refund: Decimal,
    pub dividend_refund: Decimal,
    /// Refund the dividends paid would have earned but no RDTOH covered.
    pub refund_shortfall: Decimal,
    /// Taxable dividends paid whose refund no RDTOH covered.
    pub unrefunded_dividends: Decimal,
    /// Eligible dividends designated beyond GRIP.
    pub excess_eligible_designation: Decimal,
    /// Capital dividends paid beyond CDA, which remain taxable dividends.
    pub taxable_capital_dividend_excess: Decimal,
}

impl LedgerResult {
    /// Closing balances to carry into the next year.
    pub fn closing_balances(&self) -> IntegrationAccountBalances {
        IntegrationAccountBalances {
            eligible_rdtoh: self.eligible_rdtoh.closing,
            non_eligible_rdtoh: self.non_eligible_rdtoh.closing,
            grip: self.grip.closing,
            lrip: self.lrip.closing,
            cda: self.cda.closing,
        }
    }

    pub fn part_iv_tax(&self) -> Decimal {
        self.part_iv_tax_eligible + self.part_iv_tax_non_eligible
    }
}

/// Applies one year of activity to a set of opening balances.
#[derive(Debug, Clone)]
pub struct IntegrationLedger<'a> {
    corporate: &'a CorporateParameters,
}

impl<'a> IntegrationLedger<'a> {
    pub fn new(corporate: &'a CorporateParameters) -> Self {
        Self { corporate }
    }

    /// Runs opening → addition → reduction → closing for every account.
    ///
    /// `opening` is read only; the closing balances are returned in a new
    /// record.
    pub fn apply(
        &self,
        opening: &IntegrationAccountBalances,
        activity: &LedgerActivity,
    ) -> LedgerResult {
        if opening.has_negative() {
            warn!(?opening, "Negative opening balance clamped to zero");
        }
        let opening = opening.floored();
        let inherited = activity.inherited.floored();

        let part_iv_tax_eligible = self.part_iv_tax(activity.eligible_dividends_received);
        let part_iv_tax_non_eligible = self.part_iv_tax(activity.non_eligible_dividends_received);
        let refundable_part_i_tax = round_half_up(
            non_negative(activity.aggregate_investment_income)
                * self.corporate.refundable_part_i_rate,
        );

        // Non-eligible dividends draw on their own pool first; any shortfall
        // falls through to the eligible pool after the eligible dividends.
        let eligible_refund_requested = self.refund_requested(activity.eligible_dividends_paid);
        let non_eligible_refund_requested =
            self.refund_requested(activity.non_eligible_dividends_paid);

        let (non_eligible_rdtoh, non_eligible_shortfall) = AccountMovement::settle(
            opening.non_eligible_rdtoh,
            refundable_part_i_tax + part_iv_tax_non_eligible + inherited.non_eligible_rdtoh,
            non_eligible_refund_requested,
        );
        let (eligible_rdtoh, refund_shortfall) = AccountMovement::settle(
            opening.eligible_rdtoh,
            part_iv_tax_eligible + inherited.eligible_rdtoh,
            eligible_refund_requested + non_eligible_shortfall,
        );
        let eligible_dividend_refund = eligible_refund_requested.min(eligible_rdtoh.reduction);
        let non_eligible_dividend_refund =
            non_eligible_rdtoh.reduction + (eligible_rdtoh.reduction - eligible_dividend_refund);

        let grip_addition = round_half_up(
            non_negative(activity.general_rate_income) * self.corporate.grip_integration_factor,
        ) + non_negative(activity.eligible_dividends_received)
            + inherited.grip;
        let (grip, excess_eligible_designation) =
            AccountMovement::settle(opening.grip, grip_addition, activity.eligible_dividends_paid);
        if excess_eligible_designation > Decimal::ZERO {
            warn!(
                excess = %excess_eligible_designation,
                "Eligible dividends paid exceed GRIP"
            );
        }

        let lrip_addition = non_negative(activity.low_rate_income_after_tax)
            + non_negative(activity.non_eligible_dividends_received)
            + inherited.lrip;
        let (lrip, _) = AccountMovement::settle(
            opening.lrip,
            lrip_addition,
            activity.non_eligible_dividends_paid,
        );

        let cda_addition = non_negative(activity.non_taxable_capital_gains)
            + non_negative(activity.other_cda_receipts)
            + inherited.cda;
        let (cda, taxable_capital_dividend_excess) =
            AccountMovement::settle(opening.cda, cda_addition, activity.capital_dividends_paid);
        if taxable_capital_dividend_excess > Decimal::ZERO {
            warn!(
                excess = %taxable_capital_dividend_excess,
                "Capital dividends paid exceed CDA; excess treated as taxable dividend"
            );
        }

        let dividend_refund = eligible_dividend_refund + non_eligible_dividend_refund;
        let unrefunded_dividends = if self.corporate.dividend_refund_rate > Decimal::ZERO {
            round_half_up(refund_shortfall / self.corporate.dividend_refund_rate)
        } else {
            Decimal::ZERO
        };

        debug!(
            dividend_refund = %dividend_refund,
            closing_grip = %grip.closing,
            closing_cda = %cda.closing,
            "Applied integration ledger"
        );

        LedgerResult {
            eligible_rdtoh,
            non_eligible_rdtoh,
            grip,
            lrip,
            cda,
            part_iv_tax_eligible,
            part_iv_tax_non_eligible,
            refundable_part_i_tax,
            eligible_dividend_refund,
            non_eligible_dividend_refund,
            dividend_refund,
            refund_shortfall,
            unrefunded_dividends,
            excess_eligible_designation,
            taxable_capital_dividend_excess,
        }
    }

    fn part_iv_tax(
        &self,
        dividends_received: Decimal,
    ) -> Decimal {
        round_half_up(non_negative(dividends_received) * self.corporate.part_iv_rate)
    }

    fn refund_requested(
        &self,
        dividends_paid: Decimal,
    ) -> Decimal {
        round_half_up(non_negative(dividends_paid) * self.corporate.dividend_refund_rate)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    fn ledger_apply(
        opening: IntegrationAccountBalances,
        activity: LedgerActivity,
    ) -> LedgerResult {
        let corporate = CorporateParameters::default();
        IntegrationLedger::new(&corporate).apply(&opening, &activity)
    }

    // =========================================================================
    // RDTOH tests
    // =========================================================================

    #[test]
    fn part_iv_tax_feeds_matching_rdtoh_pools() {
        let result = ledger_apply(
            IntegrationAccountBalances::default(),
            LedgerActivity {
                eligible_dividends_received: dec!(60000),
                non_eligible_dividends_received: dec!(30000),
                ..Default::default()
            },
        );

        assert_eq!(result.part_iv_tax_eligible, dec!(23000.00));
        assert_eq!(result.part_iv_tax_non_eligible, dec!(11500.00));
        assert_eq!(result.eligible_rdtoh.addition, dec!(23000.00));
        assert_eq!(result.non_eligible_rdtoh.addition, dec!(11500.00));
    }

    #[test]
    fn refundable_part_i_tax_feeds_non_eligible_rdtoh() {
        let result = ledger_apply(
            IntegrationAccountBalances::default(),
            LedgerActivity {
                aggregate_investment_income: dec!(75000),
                ..Default::default()
            },
        );

        // 75000 × 30⅔%
        assert_eq!(result.refundable_part_i_tax, dec!(23000.00));
        assert_eq!(result.non_eligible_rdtoh.closing, dec!(23000.00));
        assert_eq!(result.eligible_rdtoh.closing, dec!(0));
    }

    #[test]
    fn dividend_refund_within_balance() {
        let result = ledger_apply(
            IntegrationAccountBalances {
                non_eligible_rdtoh: dec!(20000),
                ..Default::default()
            },
            LedgerActivity {
                non_eligible_dividends_paid: dec!(30000),
                ..Default::default()
            },
        );

        assert_eq!(result.dividend_refund, dec!(11500.00));
        assert_eq!(result.non_eligible_rdtoh.closing, dec!(8500.00));
        assert_eq!(result.refund_shortfall, dec!(0));
    }

    #[test]
    fn dividend_refund_capped_at_balance() {
        let result = ledger_apply(
            IntegrationAccountBalances {
                eligible_rdtoh: dec!(4000),
                ..Default::default()
            },
            LedgerActivity {
                eligible_dividends_paid: dec!(60000),
                ..Default::default()
            },
        );

        assert_eq!(result.eligible_dividend_refund, dec!(4000));
        assert_eq!(result.eligible_rdtoh.closing, dec!(0));
        assert_eq!(result.refund_shortfall, dec!(19000.00));
        // 19000 ÷ 38⅓%
        assert_eq!(result.unrefunded_dividends, dec!(49565.22));
    }

    #[test]
    fn non_eligible_dividends_fall_through_to_eligible_pool() {
        let result = ledger_apply(
            IntegrationAccountBalances {
                eligible_rdtoh: dec!(10000),
                non_eligible_rdtoh: dec!(5000),
                ..Default::default()
            },
            LedgerActivity {
                non_eligible_dividends_paid: dec!(30000),
                ..Default::default()
            },
        );

        // 11500 requested: 5000 from non-eligible, 6500 from eligible
        assert_eq!(result.non_eligible_dividend_refund, dec!(11500.00));
        assert_eq!(result.non_eligible_rdtoh.closing, dec!(0));
        assert_eq!(result.eligible_rdtoh.closing, dec!(3500.00));
    }

    #[test]
    fn eligible_dividends_never_draw_on_non_eligible_pool() {
        let result = ledger_apply(
            IntegrationAccountBalances {
                non_eligible_rdtoh: dec!(50000),
                ..Default::default()
            },
            LedgerActivity {
                eligible_dividends_paid: dec!(30000),
                ..Default::default()
            },
        );

        assert_eq!(result.dividend_refund, dec!(0));
        assert_eq!(result.non_eligible_rdtoh.closing, dec!(50000));
    }

    #[test]
    fn eligible_dividends_have_priority_on_eligible_pool() {
        let result = ledger_apply(
            IntegrationAccountBalances {
                eligible_rdtoh: dec!(12000),
                ..Default::default()
            },
            LedgerActivity {
                eligible_dividends_paid: dec!(30000),
                non_eligible_dividends_paid: dec!(30000),
                ..Default::default()
            },
        );

        assert_eq!(result.eligible_dividend_refund, dec!(11500.00));
        assert_eq!(result.non_eligible_dividend_refund, dec!(500.00));
        assert_eq!(result.eligible_rdtoh.closing, dec!(0));
    }

    // =========================================================================
    // GRIP / LRIP tests
    // =========================================================================

    #[test]
    fn grip_adds_72_percent_of_general_rate_income() {
        let result = ledger_apply(
            IntegrationAccountBalances::default(),
            LedgerActivity {
                general_rate_income: dec!(100000),
                ..Default::default()
            },
        );

        assert_eq!(result.grip.addition, dec!(72000.00));
        assert_eq!(result.grip.closing, dec!(72000.00));
    }

    #[test]
    fn grip_reduced_dollar_for_dollar_by_eligible_dividends() {
        let result = ledger_apply(
            IntegrationAccountBalances {
                grip: dec!(50000),
                ..Default::default()
            },
            LedgerActivity {
                eligible_dividends_paid: dec!(20000),
                ..Default::default()
            },
        );

        assert_eq!(result.grip.reduction, dec!(20000));
        assert_eq!(result.grip.closing, dec!(30000));
    }

    #[test]
    fn excess_eligible_designation_is_reported() {
        let result = ledger_apply(
            IntegrationAccountBalances {
                grip: dec!(10000),
                ..Default::default()
            },
            LedgerActivity {
                eligible_dividends_paid: dec!(25000),
                ..Default::default()
            },
        );

        assert_eq!(result.grip.closing, dec!(0));
        assert_eq!(result.excess_eligible_designation, dec!(15000));
    }

    #[test]
    fn lrip_tracks_low_rate_income() {
        let result = ledger_apply(
            IntegrationAccountBalances {
                lrip: dec!(1000),
                ..Default::default()
            },
            LedgerActivity {
                low_rate_income_after_tax: dec!(87800),
                non_eligible_dividends_paid: dec!(40000),
                ..Default::default()
            },
        );

        assert_eq!(result.lrip.closing, dec!(48800));
    }

    // =========================================================================
    // CDA tests
    // =========================================================================

    #[test]
    fn cda_accrues_non_taxable_gains_and_receipts() {
        let result = ledger_apply(
            IntegrationAccountBalances::default(),
            LedgerActivity {
                non_taxable_capital_gains: dec!(50000),
                other_cda_receipts: dec!(10000),
                capital_dividends_paid: dec!(45000),
                ..Default::default()
            },
        );

        assert_eq!(result.cda.addition, dec!(60000));
        assert_eq!(result.cda.closing, dec!(15000));
        assert_eq!(result.taxable_capital_dividend_excess, dec!(0));
    }

    #[test]
    fn capital_dividend_beyond_cda_is_taxable_excess() {
        let result = ledger_apply(
            IntegrationAccountBalances {
                cda: dec!(5000),
                ..Default::default()
            },
            LedgerActivity {
                capital_dividends_paid: dec!(8000),
                ..Default::default()
            },
        );

        assert_eq!(result.cda.closing, dec!(0));
        assert_eq!(result.taxable_capital_dividend_excess, dec!(3000));
    }

    // =========================================================================
    // cross-cutting tests
    // =========================================================================

    #[test]
    fn inherited_balances_join_additions() {
        let result = ledger_apply(
            IntegrationAccountBalances {
                grip: dec!(100),
                ..Default::default()
            },
            LedgerActivity {
                inherited: IntegrationAccountBalances {
                    eligible_rdtoh: dec!(1),
                    non_eligible_rdtoh: dec!(2),
                    grip: dec!(3),
                    lrip: dec!(4),
                    cda: dec!(5),
                },
                ..Default::default()
            },
        );

        assert_eq!(
            result.closing_balances(),
            IntegrationAccountBalances {
                eligible_rdtoh: dec!(1),
                non_eligible_rdtoh: dec!(2),
                grip: dec!(103),
                lrip: dec!(4),
                cda: dec!(5),
            }
        );
    }

    #[test]
    fn negative_opening_balances_are_floored() {
        let result = ledger_apply(
            IntegrationAccountBalances {
                cda: dec!(-2500),
                grip: dec!(-1),
                ..Default::default()
            },
            LedgerActivity::default(),
        );

        assert_eq!(result.cda.opening, dec!(0));
        assert_eq!(result.grip.closing, dec!(0));
    }

    #[test]
    fn opening_balances_are_not_mutated() {
        let corporate = CorporateParameters::default();
        let ledger = IntegrationLedger::new(&corporate);
        let opening = IntegrationAccountBalances {
            grip: dec!(5000),
            ..Default::default()
        };
        let activity = LedgerActivity {
            eligible_dividends_paid: dec!(5000),
            ..Default::default()
        };

        let first = ledger.apply(&opening, &activity);
        let second = ledger.apply(&opening, &activity);

        assert_eq!(opening.grip, dec!(5000));
        assert_eq!(first, second);
    }

    #[test]
    fn closing_feeds_next_year() {
        let corporate = CorporateParameters::default();
        let ledger = IntegrationLedger::new(&corporate);

        let year_one = ledger.apply(
            &IntegrationAccountBalances::default(),
            &LedgerActivity {
                aggregate_investment_income: dec!(75000),
                ..Default::default()
            },
        );
        let year_two = ledger.apply(
            &year_one.closing_balances(),
            &LedgerActivity {
                non_eligible_dividends_paid: dec!(30000),
                ..Default::default()
            },
        );

        assert_eq!(year_two.non_eligible_rdtoh.opening, dec!(23000.00));
        assert_eq!(year_two.dividend_refund, dec!(11500.00));
        assert_eq!(year_two.non_eligible_rdtoh.closing, dec!(11500.00));
    }
}
