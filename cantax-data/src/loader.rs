use std::collections::BTreeMap;
use std::io::Read;

use cantax_core::calculations::brackets::{BracketError, validate_brackets};
use cantax_core::{Province, RateTables, TaxBracket};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

/// Rate tables for 2024, federal and all thirteen provinces and territories.
const BUILTIN_2024_CSV: &str = include_str!("../data/rate_tables_2024.csv");

/// Jurisdiction code used for the federal schedule.
const FEDERAL: &str = "FED";

/// Errors that can occur when loading rate tables.
#[derive(Debug, Error)]
pub enum RateTableLoaderError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("Unknown jurisdiction '{0}' (expected FED or a province code)")]
    UnknownJurisdiction(String),

    #[error("Tax year {0} not found in rate table")]
    TaxYearNotFound(i32),

    #[error("No federal brackets for tax year {0}")]
    MissingFederal(i32),

    #[error("Invalid brackets for {jurisdiction}: {source}")]
    InvalidBrackets {
        jurisdiction: String,
        #[source]
        source: BracketError,
    },
}

impl From<csv::Error> for RateTableLoaderError {
    fn from(err: csv::Error) -> Self {
        RateTableLoaderError::CsvParse(err.to_string())
    }
}

/// A single record from a rate table CSV file.
///
/// - `tax_year`: The tax year (e.g., 2024)
/// - `jurisdiction`: `FED` or a province code (`ON`, `QC`, ...)
/// - `min_income`: Where the bracket starts
/// - `max_income`: Where the bracket ends (empty for unbounded)
/// - `rate`: The marginal rate as a fraction (e.g., 0.15 for 15%)
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RateTableRecord {
    pub tax_year: i32,
    pub jurisdiction: String,
    pub min_income: Decimal,
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub max_income: Option<Decimal>,
    pub rate: Decimal,
}

fn deserialize_optional_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s
            .trim()
            .parse::<Decimal>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// Where a record's brackets belong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Jurisdiction {
    Federal,
    Provincial(Province),
}

impl Jurisdiction {
    fn parse(code: &str) -> Result<Self, RateTableLoaderError> {
        if code.trim().eq_ignore_ascii_case(FEDERAL) {
            return Ok(Jurisdiction::Federal);
        }
        Province::parse(code)
            .map(Jurisdiction::Provincial)
            .ok_or_else(|| RateTableLoaderError::UnknownJurisdiction(code.to_string()))
    }

    fn label(&self) -> &'static str {
        match self {
            Jurisdiction::Federal => FEDERAL,
            Jurisdiction::Provincial(p) => p.as_str(),
        }
    }
}

/// Loader for federal and provincial bracket schedules from CSV.
///
/// A file may hold several tax years; [`RateTableLoader::build`] picks one.
/// Rows may appear in any order and are sorted by `min_income` within each
/// jurisdiction before the schedule is validated.
pub struct RateTableLoader;

impl RateTableLoader {
    /// Parse rate table records from a CSV reader.
    pub fn parse<R: Read>(reader: R) -> Result<Vec<RateTableRecord>, RateTableLoaderError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut records = Vec::new();

        for result in csv_reader.deserialize() {
            let record: RateTableRecord = result?;
            records.push(record);
        }

        Ok(records)
    }

    /// Assemble the [`RateTables`] for `tax_year` from parsed records.
    ///
    /// Every schedule is checked with [`validate_brackets`], so the engine
    /// never sees a table with gaps, overlaps or out-of-range rates.
    pub fn build(
        records: &[RateTableRecord],
        tax_year: i32,
    ) -> Result<RateTables, RateTableLoaderError> {
        let mut schedules: BTreeMap<Jurisdiction, Vec<TaxBracket>> = BTreeMap::new();

        for record in records.iter().filter(|r| r.tax_year == tax_year) {
            let jurisdiction = Jurisdiction::parse(&record.jurisdiction)?;
            schedules.entry(jurisdiction).or_default().push(TaxBracket::new(
                record.min_income,
                record.max_income,
                record.rate,
            ));
        }

        if schedules.is_empty() {
            return Err(RateTableLoaderError::TaxYearNotFound(tax_year));
        }

        let mut tables = RateTables::new(tax_year);
        for (jurisdiction, mut brackets) in schedules {
            brackets.sort_by(|a, b| a.min_income.cmp(&b.min_income));
            validate_brackets(&brackets).map_err(|source| {
                RateTableLoaderError::InvalidBrackets {
                    jurisdiction: jurisdiction.label().to_string(),
                    source,
                }
            })?;
            debug!(
                jurisdiction = jurisdiction.label(),
                brackets = brackets.len(),
                "Loaded bracket schedule"
            );

            match jurisdiction {
                Jurisdiction::Federal => tables.federal = brackets,
                Jurisdiction::Provincial(province) => {
                    tables.provincial.insert(province, brackets);
                }
            }
        }

        if tables.federal.is_empty() {
            return Err(RateTableLoaderError::MissingFederal(tax_year));
        }

        info!(
            tax_year,
            provinces = tables.provincial.len(),
            "Rate tables loaded"
        );
        Ok(tables)
    }

    /// Parse and build in one step.
    pub fn load<R: Read>(
        reader: R,
        tax_year: i32,
    ) -> Result<RateTables, RateTableLoaderError> {
        let records = Self::parse(reader)?;
        Self::build(&records, tax_year)
    }

    /// The embedded 2024 tables.
    pub fn builtin_2024() -> Result<RateTables, RateTableLoaderError> {
        Self::load(BUILTIN_2024_CSV.as_bytes(), 2024)
    }
}
