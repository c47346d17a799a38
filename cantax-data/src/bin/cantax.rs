use std::fs::{self, File};
use std::path::PathBuf;

use anyhow::{Context, Result};
use cantax_core::lenient::{calculate_value, parse_input};
use cantax_core::{TaxEngine, TaxYearConfig};
use cantax_data::logging::init_logging;
use cantax_data::{RateTableLoader, load_config};
use clap::Parser;
use serde_json::Value;
use tracing::info;

/// Evaluate Canadian tax scenarios from a JSON file.
///
/// The input is one scenario object, or an array of them, each with a
/// `kind` of individual, corporate, capital_gain, amt, rollover_85,
/// wind_up_88, departure or death. Results are printed as JSON.
#[derive(Parser, Debug)]
#[command(name = "cantax")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the JSON scenario file
    #[arg(short, long)]
    input: PathBuf,

    /// Rate table CSV (tax_year,jurisdiction,min_income,max_income,rate).
    /// Defaults to the built-in 2024 tables
    #[arg(short, long)]
    rates: Option<PathBuf>,

    /// TOML file overriding the built-in 2024 statutory parameters
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "warn,cantax_core=debug". Falls back to RUST_LOG
    #[arg(short, long)]
    log_level: Option<String>,

    /// Also append log output to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print labelled breakdown lines instead of the full result
    #[arg(short, long, default_value_t = false)]
    breakdown: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.log_level.as_deref(), args.log_file.as_deref())?;

    let config = match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => TaxYearConfig::default(),
    };

    let tables = match &args.rates {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("Failed to open: {}", path.display()))?;
            RateTableLoader::load(file, config.tax_year)
                .with_context(|| format!("Failed to load rate tables: {}", path.display()))?
        }
        None => RateTableLoader::builtin_2024().context("Failed to load built-in rate tables")?,
    };

    let engine = TaxEngine::validated(&tables, &config).context("Rate tables rejected")?;

    let text = fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read: {}", args.input.display()))?;
    let scenario: Value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse JSON: {}", args.input.display()))?;

    let output = match scenario {
        Value::Array(items) => {
            info!(scenarios = items.len(), "Evaluating scenarios");
            Value::Array(
                items
                    .iter()
                    .map(|item| evaluate(&engine, item, args.breakdown))
                    .collect::<Result<_>>()?,
            )
        }
        item => evaluate(&engine, &item, args.breakdown)?,
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&output).context("Failed to serialize result")?
    );

    Ok(())
}

/// One scenario. Calculation failures become `{ "error": ... }` in the
/// output rather than aborting a batch.
fn evaluate(
    engine: &TaxEngine<'_>,
    scenario: &Value,
    breakdown: bool,
) -> Result<Value> {
    if !breakdown {
        return Ok(calculate_value(engine, scenario));
    }

    match parse_input(scenario).and_then(|input| engine.calculate(&input)) {
        Ok(result) => {
            serde_json::to_value(result.breakdown()).context("Failed to serialize breakdown")
        }
        Err(e) => Ok(serde_json::json!({ "error": e.to_string() })),
    }
}
