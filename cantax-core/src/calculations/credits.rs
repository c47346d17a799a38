//! Non-refundable personal tax credits.
//!
//! Each credit is computed on its own from the shared net income, age and
//! province, then summed per jurisdiction:
//!
//! | Credit | Amount |
//! |--------|--------|
//! | Basic personal | BPA × lowest rate (federal BPA shrinks across its phase-out band) |
//! | Age | `max(0, base − max(0, net − threshold) × reduction) × rate`, age 65+ only |
//! | Eligible dividend | grossed-up dividend × credit fraction |
//! | Non-eligible dividend | grossed-up dividend × credit fraction |
//! | Medical | `max(0, expenses − min(cap, net × 3%)) × rate` |
//! | Donation | first $200 at the low rate, remainder at the high rate |
//! | Tuition | tuition × rate |
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use cantax_core::{Province, TaxYearConfig};
//! use cantax_core::calculations::credits::{CreditAggregator, CreditInput};
//!
//! let config = TaxYearConfig::default();
//! let aggregator = CreditAggregator::new(&config, &[]);
//!
//! let input = CreditInput {
//!     net_income: dec!(50000),
//!     age: 40,
//!     ..Default::default()
//! };
//! let summary = aggregator.compute(&input, Province::Ontario).unwrap();
//!
//! assert_eq!(summary.total_federal_credits, dec!(2355.75)); // 15705 × 15%
//! assert_eq!(summary.total_provincial_credits, dec!(626.15)); // 12399 × 5.05%
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calculations::brackets::top_bracket_threshold;
use crate::calculations::common::{non_negative, ratio, round_half_up};
use crate::error::CalcError;
use crate::{FederalParameters, Province, ProvincialParameters, TaxBracket, TaxYearConfig};

/// Values the credits depend on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditInput {
    pub net_income: Decimal,
    /// Income the top donation tier is matched against. `None` means
    /// `net_income`.
    pub taxable_income: Option<Decimal>,
    pub age: u32,
    /// Eligible dividends actually received, before gross-up.
    pub eligible_dividends: Decimal,
    /// Non-eligible dividends actually received, before gross-up.
    pub non_eligible_dividends: Decimal,
    pub medical_expenses: Decimal,
    pub donations: Decimal,
    pub tuition: Decimal,
}

/// A credit split by jurisdiction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditLine {
    pub federal: Decimal,
    pub provincial: Decimal,
}

impl CreditLine {
    fn new(
        federal: Decimal,
        provincial: Decimal,
    ) -> Self {
        Self {
            federal: round_half_up(federal),
            provincial: round_half_up(provincial),
        }
    }
}

/// Per-credit breakdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditDetail {
    pub basic_personal: CreditLine,
    pub age_amount: CreditLine,
    pub eligible_dividend: CreditLine,
    pub non_eligible_dividend: CreditLine,
    pub medical: CreditLine,
    pub donation: CreditLine,
    pub tuition: CreditLine,
    /// Federal basic personal amount after the high-income phase-out.
    pub federal_basic_personal_amount: Decimal,
    pub grossed_up_eligible_dividends: Decimal,
    pub grossed_up_non_eligible_dividends: Decimal,
}

impl CreditDetail {
    fn lines(&self) -> [CreditLine; 7] {
        [
            self.basic_personal,
            self.age_amount,
            self.eligible_dividend,
            self.non_eligible_dividend,
            self.medical,
            self.donation,
            self.tuition,
        ]
    }
}

/// Credits summed per jurisdiction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditSummary {
    pub total_federal_credits: Decimal,
    pub total_provincial_credits: Decimal,
    pub detail: CreditDetail,
}

/// Grosses up a dividend: `dividend × (1 + gross_up_rate)`, floored at zero.
pub fn gross_up(
    dividend: Decimal,
    gross_up_rate: Decimal,
) -> Decimal {
    round_half_up(non_negative(dividend) * (Decimal::ONE + gross_up_rate))
}

/// Computes the personal credits for one taxpayer.
///
/// The federal bracket table is only used to locate the top bracket for the
/// donation credit; pass an empty slice to credit all donations above the
/// low tier at the ordinary high rate.
#[derive(Debug, Clone)]
pub struct CreditAggregator<'a> {
    config: &'a TaxYearConfig,
    federal_brackets: &'a [TaxBracket],
}

impl<'a> CreditAggregator<'a> {
    pub fn new(
        config: &'a TaxYearConfig,
        federal_brackets: &'a [TaxBracket],
    ) -> Self {
        Self {
            config,
            federal_brackets,
        }
    }

    /// Computes every credit for a resident of `province`.
    ///
    /// # Errors
    ///
    /// Returns [`CalcError::MissingProvincialParameters`] if the configuration
    /// has no entry for `province`.
    pub fn compute(
        &self,
        input: &CreditInput,
        province: Province,
    ) -> Result<CreditSummary, CalcError> {
        let provincial = self
            .config
            .provincial(province)
            .ok_or(CalcError::MissingProvincialParameters(province))?;
        let federal = &self.config.federal;
        let net_income = non_negative(input.net_income);

        let federal_bpa = self.federal_basic_personal_amount(net_income);
        let basic_personal = CreditLine::new(
            federal_bpa * federal.credit_rate,
            provincial.basic_personal_amount * provincial.credit_rate,
        );

        let age_amount = self.age_credit(input.age, net_income, provincial);

        let grossed_up_eligible =
            gross_up(input.eligible_dividends, federal.eligible_dividend_gross_up);
        let grossed_up_non_eligible = gross_up(
            input.non_eligible_dividends,
            federal.non_eligible_dividend_gross_up,
        );
        let eligible_dividend = CreditLine::new(
            grossed_up_eligible * federal.eligible_dividend_credit_rate,
            grossed_up_eligible * provincial.eligible_dividend_credit_rate,
        );
        let non_eligible_dividend = CreditLine::new(
            grossed_up_non_eligible * federal.non_eligible_dividend_credit_rate,
            grossed_up_non_eligible * provincial.non_eligible_dividend_credit_rate,
        );

        let medical_base = self.eligible_medical_expenses(input.medical_expenses, net_income);
        let medical = CreditLine::new(
            medical_base * federal.credit_rate,
            medical_base * provincial.credit_rate,
        );

        let taxable_income = input.taxable_income.map_or(net_income, non_negative);
        let donation = self.donation_credit(input.donations, taxable_income, provincial);

        let tuition = non_negative(input.tuition);
        let tuition = CreditLine::new(
            tuition * federal.credit_rate,
            tuition * provincial.credit_rate,
        );

        let detail = CreditDetail {
            basic_personal,
            age_amount,
            eligible_dividend,
            non_eligible_dividend,
            medical,
            donation,
            tuition,
            federal_basic_personal_amount: federal_bpa,
            grossed_up_eligible_dividends: grossed_up_eligible,
            grossed_up_non_eligible_dividends: grossed_up_non_eligible,
        };

        let total_federal_credits: Decimal =
            detail.lines().iter().map(|line| line.federal).sum();
        let total_provincial_credits: Decimal =
            detail.lines().iter().map(|line| line.provincial).sum();

        debug!(
            province = %province,
            total_federal_credits = %total_federal_credits,
            total_provincial_credits = %total_provincial_credits,
            "Computed non-refundable credits"
        );

        Ok(CreditSummary {
            total_federal_credits,
            total_provincial_credits,
            detail,
        })
    }

    /// Federal basic personal amount, reduced linearly from its maximum to its
    /// minimum across the phase-out band.
    fn federal_basic_personal_amount(
        &self,
        net_income: Decimal,
    ) -> Decimal {
        let federal = &self.config.federal;
        if net_income <= federal.bpa_phase_out_start {
            return federal.basic_personal_amount;
        }
        if net_income >= federal.bpa_phase_out_end {
            return federal.basic_personal_amount_min;
        }

        let band = federal.bpa_phase_out_end - federal.bpa_phase_out_start;
        let progress = ratio(net_income - federal.bpa_phase_out_start, band);
        let reduction =
            (federal.basic_personal_amount - federal.basic_personal_amount_min) * progress;

        round_half_up(federal.basic_personal_amount - reduction)
    }

    fn age_credit(
        &self,
        age: u32,
        net_income: Decimal,
        provincial: &ProvincialParameters,
    ) -> CreditLine {
        let federal = &self.config.federal;
        if age < federal.age_amount_min_age {
            return CreditLine::default();
        }

        let federal_amount = age_amount(
            federal.age_amount,
            federal.age_amount_threshold,
            net_income,
            federal,
        );
        let provincial_amount = age_amount(
            provincial.age_amount,
            provincial.age_amount_threshold,
            net_income,
            federal,
        );

        CreditLine::new(
            federal_amount * federal.credit_rate,
            provincial_amount * provincial.credit_rate,
        )
    }

    fn eligible_medical_expenses(
        &self,
        expenses: Decimal,
        net_income: Decimal,
    ) -> Decimal {
        let federal = &self.config.federal;
        let threshold = federal
            .medical_expense_cap
            .min(net_income * federal.medical_income_fraction);

        round_half_up(non_negative(non_negative(expenses) - threshold))
    }

    /// Donation credit. Federally, the part of the high tier matched by taxable
    /// income in the top bracket earns the top rate.
    fn donation_credit(
        &self,
        donations: Decimal,
        taxable_income: Decimal,
        provincial: &ProvincialParameters,
    ) -> CreditLine {
        let federal = &self.config.federal;
        let donations = non_negative(donations);
        let low_tier = donations.min(federal.donation_low_tier);
        let high_tier = non_negative(donations - federal.donation_low_tier);

        let top_tier = top_bracket_threshold(self.federal_brackets)
            .map_or(Decimal::ZERO, |threshold| {
                high_tier.min(non_negative(taxable_income - threshold))
            });

        let federal_credit = low_tier * federal.donation_low_rate
            + top_tier * federal.donation_top_rate
            + (high_tier - top_tier) * federal.donation_high_rate;
        let provincial_credit =
            low_tier * provincial.credit_rate + high_tier * provincial.donation_high_rate;

        CreditLine::new(federal_credit, provincial_credit)
    }
}

/// Age amount after the income-based reduction.
fn age_amount(
    base: Decimal,
    threshold: Decimal,
    net_income: Decimal,
    federal: &FederalParameters,
) -> Decimal {
    let excess = non_negative(net_income - threshold);

    round_half_up(non_negative(base - excess * federal.age_amount_reduction_rate))
}
