use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calculations::common::{non_negative, round_half_up};
use crate::lenient;

/// Corporate tax-account balances carried from one year to the next.
///
/// The caller owns these balances: the engine reads an opening record and
/// returns a fresh closing record, it never mutates the one it was given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationAccountBalances {
    /// Eligible refundable dividend tax on hand.
    #[serde(deserialize_with = "lenient::amount")]
    pub eligible_rdtoh: Decimal,
    /// Non-eligible refundable dividend tax on hand.
    #[serde(deserialize_with = "lenient::amount")]
    pub non_eligible_rdtoh: Decimal,
    /// General rate income pool.
    #[serde(deserialize_with = "lenient::amount")]
    pub grip: Decimal,
    /// Low rate income pool.
    #[serde(deserialize_with = "lenient::amount")]
    pub lrip: Decimal,
    /// Capital dividend account.
    #[serde(deserialize_with = "lenient::amount")]
    pub cda: Decimal,
}

impl IntegrationAccountBalances {
    /// Returns a copy with every negative balance replaced by zero.
    pub fn floored(&self) -> Self {
        Self {
            eligible_rdtoh: non_negative(self.eligible_rdtoh),
            non_eligible_rdtoh: non_negative(self.non_eligible_rdtoh),
            grip: non_negative(self.grip),
            lrip: non_negative(self.lrip),
            cda: non_negative(self.cda),
        }
    }

    pub fn has_negative(&self) -> bool {
        [
            self.eligible_rdtoh,
            self.non_eligible_rdtoh,
            self.grip,
            self.lrip,
            self.cda,
        ]
        .iter()
        .any(|balance| *balance < Decimal::ZERO)
    }

    pub fn total_rdtoh(&self) -> Decimal {
        self.eligible_rdtoh + self.non_eligible_rdtoh
    }
}

/// One account's movement through a calculation cycle.
///
/// `closing == opening + addition - reduction`, and `closing >= 0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMovement {
    pub opening: Decimal,
    pub addition: Decimal,
    pub reduction: Decimal,
    pub closing: Decimal,
}

impl AccountMovement {
    /// Applies an addition and a requested reduction to an opening balance.
    ///
    /// Negative openings and additions are floored at zero, and the reduction
    /// is capped at the pre-reduction balance. Returns the movement together
    /// with the part of the request that could not be absorbed.
    ///
    /// ```
    /// use rust_decimal_macros::dec;
    /// use cantax_core::AccountMovement;
    ///
    /// let (movement, excess) = AccountMovement::settle(dec!(1000), dec!(500), dec!(2000));
    ///
    /// assert_eq!(movement.reduction, dec!(1500));
    /// assert_eq!(movement.closing, dec!(0));
    /// assert_eq!(excess, dec!(500));
    /// ```
    pub fn settle(
        opening: Decimal,
        addition: Decimal,
        requested_reduction: Decimal,
    ) -> (Self, Decimal) {
        let opening = round_half_up(non_negative(opening));
        let addition = round_half_up(non_negative(addition));
        let requested = round_half_up(non_negative(requested_reduction));

        let available = opening + addition;
        let reduction = requested.min(available);
        let closing = non_negative(available - reduction);

        (
            Self {
                opening,
                addition,
                reduction,
                closing,
            },
            requested - reduction,
        )
    }

    /// Movement with no reduction.
    pub fn accrue(
        opening: Decimal,
        addition: Decimal,
    ) -> Self {
        Self::settle(opening, addition, Decimal::ZERO).0
    }

    /// Balance available for reduction: opening plus addition.
    pub fn available(&self) -> Decimal {
        self.opening + self.addition
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn settle_applies_reduction_within_balance() {
        let (movement, excess) = AccountMovement::settle(dec!(1000), dec!(250), dec!(400));

        assert_eq!(movement.closing, dec!(850));
        assert_eq!(movement.reduction, dec!(400));
        assert_eq!(excess, dec!(0));
    }

    #[test]
    fn settle_caps_reduction_and_reports_excess() {
        let (movement, excess) = AccountMovement::settle(dec!(100), dec!(0), dec!(160));

        assert_eq!(movement.reduction, dec!(100));
        assert_eq!(movement.closing, dec!(0));
        assert_eq!(excess, dec!(60));
    }

    #[test]
    fn settle_floors_negative_opening_and_addition() {
        let (movement, excess) = AccountMovement::settle(dec!(-500), dec!(-20), dec!(10));

        assert_eq!(movement.opening, dec!(0));
        assert_eq!(movement.addition, dec!(0));
        assert_eq!(movement.closing, dec!(0));
        assert_eq!(excess, dec!(10));
    }

    #[test]
    fn floored_clears_negative_balances() {
        let balances = IntegrationAccountBalances {
            eligible_rdtoh: dec!(-1),
            grip: dec!(50),
            cda: dec!(-0.01),
            ..Default::default()
        };

        assert!(balances.has_negative());
        let floored = balances.floored();
        assert!(!floored.has_negative());
        assert_eq!(floored.grip, dec!(50));
        assert_eq!(floored.eligible_rdtoh, dec!(0));
    }
}
