//! Loosely-typed JSON view of the engine.
//!
//! Hosts that hold scenario inputs as free-form JSON call [`calculate_value`].
//! It converts the value into an [`EntityInput`], runs the typed engine and
//! serializes the result, so there is exactly one implementation of every
//! calculator.
//!
//! The field deserializers in this module never reject a scalar: missing,
//! `null` or non-numeric amounts become zero, unknown provinces fall back to
//! Ontario, and anything other than an array becomes an empty list. Amounts
//! beyond [`MAX_AMOUNT`] in either direction are clamped to it. Each coercion
//! of a present value is logged at `warn` level.
//!
//! ```
//! use serde_json::json;
//! use cantax_core::lenient::calculate_value;
//! use cantax_core::{RateTables, TaxEngine, TaxYearConfig};
//!
//! let tables = RateTables::new(2024);
//! let config = TaxYearConfig::default();
//! let engine = TaxEngine::new(&tables, &config);
//!
//! let output = calculate_value(&engine, &json!("not a record"));
//! assert_eq!(output, json!({ "error": "Invalid input data" }));
//! ```

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::Province;
use crate::calculations::entities::{EntityInput, Holder, TaxEngine};
use crate::error::CalcError;
use crate::models::IntegrationAccountBalances;

/// Largest magnitude accepted for any amount, one quadrillion dollars.
///
/// Sums and rate products of amounts this size stay well inside
/// [`Decimal::MAX`].
pub const MAX_AMOUNT: Decimal = dec!(1_000_000_000_000_000);

/// Runs the engine on a JSON record and returns the JSON result.
///
/// Returns `{ "error": "Invalid input data" }` when `input` is not an object
/// or names no known `kind`, and `{ "error": <message> }` when the engine
/// itself fails (for example a missing rate table).
pub fn calculate_value(
    engine: &TaxEngine<'_>,
    input: &Value,
) -> Value {
    match parse_input(input).and_then(|entity| engine.calculate(&entity)) {
        Ok(result) => {
            serde_json::to_value(&result).unwrap_or_else(|e| error_value(&e.to_string()))
        }
        Err(e) => error_value(&e.to_string()),
    }
}

/// Converts a JSON record into a typed input.
pub fn parse_input(input: &Value) -> Result<EntityInput, CalcError> {
    if !input.is_object() {
        warn!("Input is not an object");
        return Err(CalcError::InvalidInput);
    }

    EntityInput::deserialize(input).map_err(|e| {
        warn!(error = %e, "Input does not describe a known calculation");
        CalcError::InvalidInput
    })
}

fn error_value(message: &str) -> Value {
    json!({ "error": message })
}

/// Converts a JSON scalar to an amount within [`MAX_AMOUNT`], or `None` if
/// it holds no number.
fn coerce_decimal(value: &Value) -> Option<Decimal> {
    let parsed = match value {
        // Going through the textual form keeps 0.1 as 0.1 instead of the
        // nearest binary float.
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
        }
        Value::String(s) => {
            let text = s.trim().replace([',', '$'], "");
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
        }
        _ => None,
    }?;

    if parsed.abs() > MAX_AMOUNT {
        warn!(value = %value, limit = %MAX_AMOUNT, "Amount out of range; clamped");
        return Some(if parsed.is_sign_negative() { -MAX_AMOUNT } else { MAX_AMOUNT });
    }
    Some(parsed)
}

/// Amount field: anything that is not a number becomes zero.
pub fn amount<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match (&value, coerce_decimal(&value)) {
        (_, Some(amount)) => amount,
        (Value::Null, None) => Decimal::ZERO,
        (other, None) => {
            warn!(value = %other, "Non-numeric amount coerced to zero");
            Decimal::ZERO
        }
    })
}

/// Optional amount field: anything that is not a number becomes `None`.
pub fn optional_amount<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let amount = coerce_decimal(&value);
    if amount.is_none() && !value.is_null() {
        warn!(value = %value, "Non-numeric optional amount ignored");
    }
    Ok(amount)
}

/// Whole-number field such as an age: truncated, negative values become zero.
pub fn count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let count = coerce_decimal(&value).and_then(|n| n.trunc().to_u32());
    if count.is_none() && !value.is_null() {
        warn!(value = %value, "Invalid count coerced to zero");
    }
    Ok(count.unwrap_or_default())
}

/// Boolean field: accepts booleans, non-zero numbers and `"true"`/`"yes"`/`"1"`.
pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match &value {
        Value::Bool(b) => *b,
        Value::Number(_) => coerce_decimal(&value).is_some_and(|n| !n.is_zero()),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "yes" | "y" | "1"
        ),
        _ => false,
    })
}

/// Province field: a code or name, otherwise the default province.
pub fn province<'de, D>(deserializer: D) -> Result<Province, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let parsed = value.as_str().and_then(Province::parse);
    if parsed.is_none() && !value.is_null() {
        warn!(
            value = %value,
            default = %Province::default(),
            "Unrecognised province; using default"
        );
    }
    Ok(parsed.unwrap_or_default())
}

/// Holder field: `individual` or `corporation` in any common spelling,
/// otherwise an individual.
pub fn holder<'de, D>(deserializer: D) -> Result<Holder, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let parsed = value.as_str().and_then(Holder::parse);
    if parsed.is_none() && !value.is_null() {
        warn!(value = %value, "Unrecognised holder; using individual");
    }
    Ok(parsed.unwrap_or_default())
}

/// Free-text field: strings pass through, numbers are written out, anything
/// else is empty.
pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

/// Integration account record: `null` or a non-record becomes zero balances.
/// Each balance inside a record is read as an [`amount`].
pub fn balances<'de, D>(deserializer: D) -> Result<IntegrationAccountBalances, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if !value.is_object() {
        if !value.is_null() {
            warn!(value = %value, "Expected account balances; using zero balances");
        }
        return Ok(IntegrationAccountBalances::default());
    }

    Ok(serde_json::from_value(value).unwrap_or_else(|e| {
        warn!(error = %e, "Invalid account balances; using zero balances");
        IntegrationAccountBalances::default()
    }))
}

/// List field: a non-array becomes empty and elements that are not records
/// are dropped.
pub fn list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let items = match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        Value::Null => return Ok(Vec::new()),
        other => {
            warn!(value = %other, "Expected a list; using an empty one");
            return Ok(Vec::new());
        }
    };

    Ok(items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| {
            if !item.is_object() {
                debug!(index, "Skipping list element that is not a record");
                return None;
            }
            serde_json::from_value(item)
                .inspect_err(|e| warn!(index, error = %e, "Skipping invalid list element"))
                .ok()
        })
        .collect())
}
