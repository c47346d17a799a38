use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::Province;

/// Statutory parameters for one tax year.
///
/// These are the documented-in-law constants (credit amounts, gross-ups,
/// inclusion rate, corporate rates, grind thresholds) that change by
/// legislation. Bracket thresholds live in [`RateTables`](super::RateTables)
/// instead.
///
/// Every level is `#[serde(default)]`, so a configuration file only needs to
/// name the values it overrides. A `provinces` table replaces entries by
/// province code and each entry must be complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxYearConfig {
    pub tax_year: i32,
    /// Portion of a capital gain included in income (one half).
    pub capital_gains_inclusion_rate: Decimal,
    /// Federal tax abatement for Quebec residents (16.5%).
    pub quebec_abatement_rate: Decimal,
    pub federal: FederalParameters,
    pub corporate: CorporateParameters,
    pub amt: AmtParameters,
    pub departure: DepartureParameters,
    pub provinces: BTreeMap<Province, ProvincialParameters>,
}

impl Default for TaxYearConfig {
    fn default() -> Self {
        Self::canada_2024()
    }
}

impl TaxYearConfig {
    /// Parameters in force for the 2024 tax year.
    pub fn canada_2024() -> Self {
        Self {
            tax_year: 2024,
            capital_gains_inclusion_rate: dec!(0.50),
            quebec_abatement_rate: dec!(0.165),
            federal: FederalParameters::default(),
            corporate: CorporateParameters::default(),
            amt: AmtParameters::default(),
            departure: DepartureParameters::default(),
            provinces: ProvincialParameters::canada_2024(),
        }
    }

    pub fn provincial(
        &self,
        province: Province,
    ) -> Option<&ProvincialParameters> {
        self.provinces.get(&province)
    }

    /// Abatement applicable to a resident of `province`.
    pub fn abatement_rate(
        &self,
        province: Province,
    ) -> Decimal {
        if province == Province::Quebec {
            self.quebec_abatement_rate
        } else {
            Decimal::ZERO
        }
    }
}

/// Federal personal credit parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FederalParameters {
    /// Lowest federal rate, applied to non-refundable credit amounts.
    pub credit_rate: Decimal,
    /// Enhanced basic personal amount at or below the phase-out band.
    pub basic_personal_amount: Decimal,
    /// Basic personal amount at or above the phase-out band.
    pub basic_personal_amount_min: Decimal,
    pub bpa_phase_out_start: Decimal,
    pub bpa_phase_out_end: Decimal,
    pub age_amount: Decimal,
    pub age_amount_threshold: Decimal,
    /// Reduction per dollar of net income above the threshold.
    pub age_amount_reduction_rate: Decimal,
    pub age_amount_min_age: u32,
    pub eligible_dividend_gross_up: Decimal,
    /// Credit as a fraction of the grossed-up eligible dividend.
    pub eligible_dividend_credit_rate: Decimal,
    pub non_eligible_dividend_gross_up: Decimal,
    /// Credit as a fraction of the grossed-up non-eligible dividend.
    pub non_eligible_dividend_credit_rate: Decimal,
    pub medical_expense_cap: Decimal,
    pub medical_income_fraction: Decimal,
    pub donation_low_tier: Decimal,
    pub donation_low_rate: Decimal,
    pub donation_high_rate: Decimal,
    /// Rate on donations matched by income taxed in the top bracket.
    pub donation_top_rate: Decimal,
}

impl Default for FederalParameters {
    fn default() -> Self {
        Self {
            credit_rate: dec!(0.15),
            basic_personal_amount: dec!(15705),
            basic_personal_amount_min: dec!(14156),
            bpa_phase_out_start: dec!(173205),
            bpa_phase_out_end: dec!(246752),
            age_amount: dec!(8790),
            age_amount_threshold: dec!(44325),
            age_amount_reduction_rate: Decimal::ONE,
            age_amount_min_age: 65,
            eligible_dividend_gross_up: dec!(0.38),
            eligible_dividend_credit_rate: dec!(0.150198),
            non_eligible_dividend_gross_up: dec!(0.15),
            non_eligible_dividend_credit_rate: dec!(0.090301),
            medical_expense_cap: dec!(2759),
            medical_income_fraction: dec!(0.03),
            donation_low_tier: dec!(200),
            donation_low_rate: dec!(0.15),
            donation_high_rate: dec!(0.29),
            donation_top_rate: dec!(0.33),
        }
    }
}

/// Provincial credit and corporate rate parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvincialParameters {
    pub basic_personal_amount: Decimal,
    /// Lowest provincial rate, applied to non-refundable credit amounts.
    pub credit_rate: Decimal,
    pub age_amount: Decimal,
    pub age_amount_threshold: Decimal,
    pub eligible_dividend_credit_rate: Decimal,
    pub non_eligible_dividend_credit_rate: Decimal,
    pub donation_high_rate: Decimal,
    pub small_business_rate: Decimal,
    pub general_corporate_rate: Decimal,
}

impl ProvincialParameters {
    #[allow(clippy::too_many_arguments)]
    fn new(
        basic_personal_amount: Decimal,
        credit_rate: Decimal,
        age_amount: Decimal,
        age_amount_threshold: Decimal,
        eligible_dividend_credit_rate: Decimal,
        non_eligible_dividend_credit_rate: Decimal,
        donation_high_rate: Decimal,
        small_business_rate: Decimal,
        general_corporate_rate: Decimal,
    ) -> Self {
        Self {
            basic_personal_amount,
            credit_rate,
            age_amount,
            age_amount_threshold,
            eligible_dividend_credit_rate,
            non_eligible_dividend_credit_rate,
            donation_high_rate,
            small_business_rate,
            general_corporate_rate,
        }
    }

    /// 2024 parameters for all thirteen jurisdictions.
    pub fn canada_2024() -> BTreeMap<Province, Self> {
        use Province::*;

        #[rustfmt::skip]
        let rows = [
            (Alberta,                 Self::new(dec!(21885), dec!(0.10),   dec!(6221),  dec!(46308), dec!(0.0812),  dec!(0.0218),   dec!(0.21),   dec!(0.02),  dec!(0.08))),
            (BritishColumbia,         Self::new(dec!(12580), dec!(0.0506), dec!(5373),  dec!(40000), dec!(0.12),    dec!(0.0196),   dec!(0.168),  dec!(0.02),  dec!(0.12))),
            (Manitoba,                Self::new(dec!(15780), dec!(0.108),  dec!(3728),  dec!(27749), dec!(0.08),    dec!(0.007835), dec!(0.174),  dec!(0.00),  dec!(0.12))),
            (NewBrunswick,            Self::new(dec!(13044), dec!(0.094),  dec!(5245),  dec!(39044), dec!(0.14),    dec!(0.0275),   dec!(0.1795), dec!(0.025), dec!(0.14))),
            (NewfoundlandAndLabrador, Self::new(dec!(10818), dec!(0.087),  dec!(6930),  dec!(38120), dec!(0.063),   dec!(0.032),    dec!(0.218),  dec!(0.025), dec!(0.15))),
            (NovaScotia,              Self::new(dec!(8481),  dec!(0.0879), dec!(4141),  dec!(30828), dec!(0.0885),  dec!(0.015),    dec!(0.21),   dec!(0.025), dec!(0.14))),
            (NorthwestTerritories,    Self::new(dec!(17373), dec!(0.059),  dec!(8726),  dec!(44325), dec!(0.115),   dec!(0.06),     dec!(0.1405), dec!(0.02),  dec!(0.115))),
            (Nunavut,                 Self::new(dec!(18767), dec!(0.04),   dec!(11641), dec!(44325), dec!(0.0551),  dec!(0.0261),   dec!(0.115),  dec!(0.03),  dec!(0.12))),
            (Ontario,                 Self::new(dec!(12399), dec!(0.0505), dec!(6223),  dec!(46330), dec!(0.10),    dec!(0.029863), dec!(0.1116), dec!(0.032), dec!(0.115))),
            (PrinceEdwardIsland,      Self::new(dec!(13500), dec!(0.0965), dec!(6510),  dec!(36600), dec!(0.105),   dec!(0.013),    dec!(0.167),  dec!(0.01),  dec!(0.16))),
            (Quebec,                  Self::new(dec!(18056), dec!(0.14),   dec!(3798),  dec!(42215), dec!(0.117),   dec!(0.0342),   dec!(0.24),   dec!(0.032), dec!(0.115))),
            (Saskatchewan,            Self::new(dec!(18491), dec!(0.105),  dec!(5380),  dec!(40051), dec!(0.11),    dec!(0.02519),  dec!(0.145),  dec!(0.01),  dec!(0.12))),
            (Yukon,                   Self::new(dec!(15705), dec!(0.064),  dec!(8790),  dec!(44325), dec!(0.1202),  dec!(0.0067),   dec!(0.128),  dec!(0.00),  dec!(0.12))),
        ];

        rows.into_iter().collect()
    }
}

/// Corporate rates, small business deduction limits and integration factors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorporateParameters {
    pub federal_base_rate: Decimal,
    pub federal_abatement: Decimal,
    pub general_rate_reduction: Decimal,
    /// Small business deduction, as a rate on eligible income.
    pub small_business_deduction_rate: Decimal,
    /// Additional refundable tax on CCPC investment income (10⅔%).
    pub additional_refundable_tax_rate: Decimal,
    pub business_limit: Decimal,
    pub taxable_capital_threshold: Decimal,
    pub taxable_capital_grind_factor: Decimal,
    pub passive_income_threshold: Decimal,
    pub passive_income_grind_factor: Decimal,
    /// Part IV tax on portfolio dividends received (38⅓%).
    pub part_iv_rate: Decimal,
    /// Refundable portion of Part I tax on investment income (30⅔%).
    pub refundable_part_i_rate: Decimal,
    /// Dividend refund per dollar of taxable dividends paid (38⅓%).
    pub dividend_refund_rate: Decimal,
    pub grip_integration_factor: Decimal,
}

impl Default for CorporateParameters {
    fn default() -> Self {
        Self {
            federal_base_rate: dec!(0.38),
            federal_abatement: dec!(0.10),
            general_rate_reduction: dec!(0.13),
            small_business_deduction_rate: dec!(0.19),
            additional_refundable_tax_rate: Decimal::from(32) / Decimal::from(300),
            business_limit: dec!(500000),
            taxable_capital_threshold: dec!(10000000),
            taxable_capital_grind_factor: dec!(0.0125),
            passive_income_threshold: dec!(50000),
            passive_income_grind_factor: dec!(5),
            part_iv_rate: Decimal::from(23) / Decimal::from(60),
            refundable_part_i_rate: Decimal::from(23) / Decimal::from(75),
            dividend_refund_rate: Decimal::from(23) / Decimal::from(60),
            grip_integration_factor: dec!(0.72),
        }
    }
}

impl CorporateParameters {
    /// Net federal rate on income eligible for the small business deduction.
    pub fn federal_small_business_rate(&self) -> Decimal {
        self.federal_base_rate - self.federal_abatement - self.small_business_deduction_rate
    }

    /// Net federal rate on general rate income.
    pub fn federal_general_rate(&self) -> Decimal {
        self.federal_base_rate - self.federal_abatement - self.general_rate_reduction
    }

    /// Net federal rate on a CCPC's aggregate investment income.
    pub fn federal_investment_rate(&self) -> Decimal {
        self.federal_base_rate - self.federal_abatement + self.additional_refundable_tax_rate
    }
}

/// Federal alternative minimum tax parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmtParameters {
    pub rate: Decimal,
    pub exemption: Decimal,
    /// Adjusted taxable income above which the exemption starts to shrink.
    pub exemption_phase_out_start: Decimal,
    /// Exemption lost per dollar above the start. Zero disables the phase-out.
    pub exemption_phase_out_rate: Decimal,
    pub capital_gains_inclusion_rate: Decimal,
    /// Portion of the stock option deduction added back.
    pub stock_option_addback_rate: Decimal,
}

impl Default for AmtParameters {
    fn default() -> Self {
        Self {
            rate: dec!(0.205),
            exemption: dec!(173205),
            exemption_phase_out_start: dec!(246752),
            exemption_phase_out_rate: Decimal::ZERO,
            capital_gains_inclusion_rate: Decimal::ONE,
            stock_option_addback_rate: Decimal::ONE,
        }
    }
}

/// Emigration (deemed disposition on departure) parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepartureParameters {
    /// Capital gains whose departure tax can be deferred without security.
    pub security_exempt_gain: Decimal,
    /// Total fair market value above which property must be reported.
    pub reporting_threshold: Decimal,
}

impl Default for DepartureParameters {
    fn default() -> Self {
        Self {
            security_exempt_gain: dec!(100000),
            reporting_threshold: dec!(25000),
        }
    }
}
