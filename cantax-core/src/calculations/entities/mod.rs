//! Entity calculators and the engine that dispatches to them.
//!
//! Every calculator borrows the rate tables and the tax-year configuration
//! and exposes `calculate(&input) -> Result<_, CalcError>`. [`TaxEngine`]
//! wraps the eight of them behind the [`EntityInput`] / [`EntityResult`]
//! tagged unions.

mod jurisdiction;

pub mod amt;
pub mod capital_gain;
pub mod corporate;
pub mod death;
pub mod departure;
pub mod individual;
pub mod rollover;
pub mod windup;

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use amt::{AmtCalculator, AmtInput, AmtResult};
pub use capital_gain::{CapitalGainCalculator, CapitalGainInput, CapitalGainResult};
pub use corporate::{CorporateCalculator, CorporateInput, CorporateResult};
pub use death::{DeathCalculator, DeathInput, DeathResult, DeceasedProperty};
pub use departure::{
    DeemedProperty, DepartureCalculator, DepartureInput, DepartureResult, PropertyDisposition,
};
pub use individual::{IndividualCalculator, IndividualInput, IndividualResult};
pub use rollover::{ElectedRange, RolloverCalculator, RolloverInput, RolloverResult};
pub use windup::{WindUpCalculator, WindUpInput, WindUpResult};

use crate::calculations::brackets::validate_brackets;
use crate::error::CalcError;
use crate::{RateTables, TaxYearConfig};

/// Who holds a disposed property.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Holder {
    #[default]
    Individual,
    Corporation,
}

impl Holder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Holder::Individual => "individual",
            Holder::Corporation => "corporation",
        }
    }

    /// Parses `individual`/`person` or `corporation`/`corporate`/`corp`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "individual" | "person" | "personal" => Some(Holder::Individual),
            "corporation" | "corporate" | "corp" | "company" => Some(Holder::Corporation),
            _ => None,
        }
    }
}

impl fmt::Display for Holder {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Input to one calculation, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityInput {
    Individual(IndividualInput),
    Corporate(CorporateInput),
    CapitalGain(CapitalGainInput),
    Amt(AmtInput),
    #[serde(rename = "rollover_85")]
    Rollover85(RolloverInput),
    #[serde(rename = "wind_up_88")]
    WindUp88(WindUpInput),
    Departure(DepartureInput),
    Death(DeathInput),
}

impl EntityInput {
    pub fn kind(&self) -> &'static str {
        match self {
            EntityInput::Individual(_) => "individual",
            EntityInput::Corporate(_) => "corporate",
            EntityInput::CapitalGain(_) => "capital_gain",
            EntityInput::Amt(_) => "amt",
            EntityInput::Rollover85(_) => "rollover_85",
            EntityInput::WindUp88(_) => "wind_up_88",
            EntityInput::Departure(_) => "departure",
            EntityInput::Death(_) => "death",
        }
    }
}

/// Result of one calculation, tagged by `kind` like its input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityResult {
    Individual(IndividualResult),
    Corporate(CorporateResult),
    CapitalGain(CapitalGainResult),
    Amt(AmtResult),
    #[serde(rename = "rollover_85")]
    Rollover85(RolloverResult),
    #[serde(rename = "wind_up_88")]
    WindUp88(WindUpResult),
    Departure(DepartureResult),
    Death(DeathResult),
}

impl EntityResult {
    /// Labelled lines for narrative views, derived from the result alone.
    pub fn breakdown(&self) -> Vec<BreakdownLine> {
        match self {
            EntityResult::Individual(r) => r.breakdown(),
            EntityResult::Corporate(r) => r.breakdown(),
            EntityResult::CapitalGain(r) => r.breakdown(),
            EntityResult::Amt(r) => r.breakdown(),
            EntityResult::Rollover85(r) => r.breakdown(),
            EntityResult::WindUp88(r) => r.breakdown(),
            EntityResult::Departure(r) => r.breakdown(),
            EntityResult::Death(r) => r.breakdown(),
        }
    }
}

/// Unit of a breakdown value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineUnit {
    Money,
    Rate,
    Flag,
}

/// One labelled line of a result breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownLine {
    pub label: String,
    pub value: Decimal,
    pub unit: LineUnit,
}

impl BreakdownLine {
    pub fn money(
        label: impl Into<String>,
        value: Decimal,
    ) -> Self {
        Self {
            label: label.into(),
            value,
            unit: LineUnit::Money,
        }
    }

    pub fn rate(
        label: impl Into<String>,
        value: Decimal,
    ) -> Self {
        Self {
            label: label.into(),
            value,
            unit: LineUnit::Rate,
        }
    }

    pub fn flag(
        label: impl Into<String>,
        value: bool,
    ) -> Self {
        Self {
            label: label.into(),
            value: if value { Decimal::ONE } else { Decimal::ZERO },
            unit: LineUnit::Flag,
        }
    }
}

/// Dispatches an [`EntityInput`] to its calculator.
///
/// # Example
///
/// ```
/// use rust_decimal_macros::dec;
/// use cantax_core::{EntityInput, EntityResult, RateTables, TaxEngine, TaxYearConfig};
/// use cantax_core::calculations::entities::AmtInput;
/// use cantax_core::TaxBracket;
///
/// let tables = RateTables::new(2024).with_federal(vec![
///     TaxBracket::new(dec!(0), Some(dec!(55867)), dec!(0.15)),
///     TaxBracket::new(dec!(55867), None, dec!(0.205)),
/// ]);
/// let config = TaxYearConfig::default();
/// let engine = TaxEngine::new(&tables, &config);
///
/// let input = EntityInput::Amt(AmtInput {
///     regular_taxable_income: dec!(50000),
///     ..Default::default()
/// });
/// let EntityResult::Amt(result) = engine.calculate(&input).unwrap() else {
///     panic!("expected an AMT result");
/// };
///
/// // Below the exemption: no minimum tax
/// assert_eq!(result.amt_payable, dec!(0));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TaxEngine<'a> {
    tables: &'a RateTables,
    config: &'a TaxYearConfig,
}

impl<'a> TaxEngine<'a> {
    pub fn new(
        tables: &'a RateTables,
        config: &'a TaxYearConfig,
    ) -> Self {
        Self { tables, config }
    }

    /// Like [`TaxEngine::new`], but first checks every bracket table.
    ///
    /// # Errors
    ///
    /// Returns [`CalcError::InvalidRateTable`] for the first malformed table.
    pub fn validated(
        tables: &'a RateTables,
        config: &'a TaxYearConfig,
    ) -> Result<Self, CalcError> {
        validate_brackets(&tables.federal)?;
        for brackets in tables.provincial.values() {
            validate_brackets(brackets)?;
        }
        Ok(Self::new(tables, config))
    }

    pub fn tables(&self) -> &'a RateTables {
        self.tables
    }

    pub fn config(&self) -> &'a TaxYearConfig {
        self.config
    }

    /// Runs the calculator matching `input`.
    pub fn calculate(
        &self,
        input: &EntityInput,
    ) -> Result<EntityResult, CalcError> {
        debug!(kind = input.kind(), "Dispatching calculation");

        let (tables, config) = (self.tables, self.config);
        match input {
            EntityInput::Individual(i) => IndividualCalculator::new(tables, config)
                .calculate(i)
                .map(EntityResult::Individual),
            EntityInput::Corporate(i) => CorporateCalculator::new(tables, config)
                .calculate(i)
                .map(EntityResult::Corporate),
            EntityInput::CapitalGain(i) => CapitalGainCalculator::new(tables, config)
                .calculate(i)
                .map(EntityResult::CapitalGain),
            EntityInput::Amt(i) => AmtCalculator::new(tables, config)
                .calculate(i)
                .map(EntityResult::Amt),
            EntityInput::Rollover85(i) => RolloverCalculator::new(tables, config)
                .calculate(i)
                .map(EntityResult::Rollover85),
            EntityInput::WindUp88(i) => WindUpCalculator::new(tables, config)
                .calculate(i)
                .map(EntityResult::WindUp88),
            EntityInput::Departure(i) => DepartureCalculator::new(tables, config)
                .calculate(i)
                .map(EntityResult::Departure),
            EntityInput::Death(i) => DeathCalculator::new(tables, config)
                .calculate(i)
                .map(EntityResult::Death),
        }
    }
}
