use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Province;

/// One progressive bracket. `max_income` of `None` means unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBracket {
    pub min_income: Decimal,
    pub max_income: Option<Decimal>,
    pub tax_rate: Decimal,
}

impl TaxBracket {
    pub fn new(
        min_income: Decimal,
        max_income: Option<Decimal>,
        tax_rate: Decimal,
    ) -> Self {
        Self {
            min_income,
            max_income,
            tax_rate,
        }
    }
}

/// Federal and provincial bracket schedules for one tax year.
///
/// Rate tables are data supplied by the caller; the engine never hardcodes
/// bracket thresholds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateTables {
    pub tax_year: i32,
    pub federal: Vec<TaxBracket>,
    pub provincial: BTreeMap<Province, Vec<TaxBracket>>,
}

impl RateTables {
    pub fn new(tax_year: i32) -> Self {
        Self {
            tax_year,
            ..Default::default()
        }
    }

    pub fn with_federal(
        mut self,
        brackets: Vec<TaxBracket>,
    ) -> Self {
        self.federal = brackets;
        self
    }

    pub fn with_provincial(
        mut self,
        province: Province,
        brackets: Vec<TaxBracket>,
    ) -> Self {
        self.provincial.insert(province, brackets);
        self
    }

    /// Brackets for `province`, or `None` when the table has no schedule for it.
    pub fn provincial(
        &self,
        province: Province,
    ) -> Option<&[TaxBracket]> {
        self.provincial
            .get(&province)
            .map(Vec::as_slice)
            .filter(|brackets| !brackets.is_empty())
    }
}
