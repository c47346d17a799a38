//! End-to-end tests: CSV rate tables and TOML parameters feeding the engine
//! through its JSON view.

use std::fs;
use std::path::PathBuf;

use cantax_core::lenient::{calculate_value, parse_input};
use cantax_core::{Province, RateTables, TaxEngine, TaxYearConfig};
use cantax_data::{RateTableLoader, RateTableLoaderError, load_config, parse_config};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{Value, json};

const BUILTIN_CSV_2024: &str = include_str!("../data/rate_tables_2024.csv");

fn builtin() -> (RateTables, TaxYearConfig) {
    let tables = RateTableLoader::builtin_2024().expect("Failed to load built-in tables");
    (tables, TaxYearConfig::default())
}

/// Reads a money field from a serialized result.
fn money(
    value: &Value,
    field: &str,
) -> Decimal {
    match &value[field] {
        Value::String(s) => s.parse().expect("decimal string"),
        Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("field {field} is not a number: {other:?}"),
    }
}

fn temp_file(
    name: &str,
    contents: &str,
) -> PathBuf {
    let path = std::env::temp_dir().join(format!("cantax-{}-{name}", std::process::id()));
    fs::write(&path, contents).expect("Failed to write temp file");
    path
}

#[test]
fn test_builtin_tables_pass_engine_validation() {
    let (tables, config) = builtin();

    assert!(TaxEngine::validated(&tables, &config).is_ok());
    assert_eq!(tables.tax_year, config.tax_year);
}

#[test]
fn test_builtin_file_matches_embedded_table() {
    let records =
        RateTableLoader::parse(BUILTIN_CSV_2024.as_bytes()).expect("Failed to parse CSV");
    let tables = RateTableLoader::build(&records, 2024).expect("Failed to build tables");

    assert_eq!(tables, RateTableLoader::builtin_2024().expect("builtin"));
    assert_eq!(records.len(), 67);
}

#[test]
fn test_individual_scenario_through_json_view() {
    let (tables, config) = builtin();
    let engine = TaxEngine::new(&tables, &config);

    let output = calculate_value(
        &engine,
        &json!({
            "kind": "individual",
            "province": "ON",
            "age": 40,
            "salary": 60000,
            "tax_withheld": 10000
        }),
    );

    assert_eq!(output["kind"], json!("individual"));
    assert_eq!(money(&output, "federal_tax"), dec!(9227.32));
    assert_eq!(money(&output, "provincial_tax"), dec!(3380.71));
    assert_eq!(money(&output, "net_tax"), dec!(9626.13));
    assert_eq!(money(&output, "balance_owing"), dec!(-373.87));
}

#[test]
fn test_loosely_formatted_fields_are_coerced() {
    let (tables, config) = builtin();
    let engine = TaxEngine::new(&tables, &config);

    let output = calculate_value(
        &engine,
        &json!({
            "kind": "individual",
            "province": "ontario",
            "age": "40",
            "salary": "$60,000",
            "tax_withheld": "10000",
            "donations": "n/a"
        }),
    );

    assert_eq!(money(&output, "net_tax"), dec!(9626.13));
}

#[test]
fn test_corporate_scenario_through_json_view() {
    let (tables, config) = builtin();
    let engine = TaxEngine::new(&tables, &config);

    let output = calculate_value(
        &engine,
        &json!({ "kind": "corporate", "active_business_income": 400000 }),
    );

    assert_eq!(money(&output, "federal_tax"), dec!(36000));
    assert_eq!(money(&output, "provincial_tax"), dec!(12800));
    assert_eq!(money(&output["closing_balances"], "lrip"), dec!(351200));
}

#[test]
fn test_every_kind_evaluates_with_builtin_tables() {
    let (tables, config) = builtin();
    let engine = TaxEngine::new(&tables, &config);

    for kind in [
        "individual",
        "corporate",
        "capital_gain",
        "amt",
        "rollover_85",
        "wind_up_88",
        "departure",
        "death",
    ] {
        let output = calculate_value(&engine, &json!({ "kind": kind }));

        assert_eq!(output["kind"], json!(kind), "unexpected output for {kind}: {output}");
        assert!(output.get("error").is_none());
    }
}

#[test]
fn test_every_province_evaluates_with_builtin_tables() {
    let (tables, config) = builtin();
    let engine = TaxEngine::new(&tables, &config);

    for province in Province::ALL {
        let output = calculate_value(
            &engine,
            &json!({ "kind": "individual", "province": province.as_str(), "salary": 80000 }),
        );

        assert!(money(&output, "net_tax") > Decimal::ZERO, "no tax in {province}");
    }
}

#[test]
fn test_invalid_shapes_report_invalid_input() {
    let (tables, config) = builtin();
    let engine = TaxEngine::new(&tables, &config);

    for input in [
        json!(null),
        json!([1, 2, 3]),
        json!("individual"),
        json!({ "kind": "partnership" }),
    ] {
        assert_eq!(
            calculate_value(&engine, &input),
            json!({ "error": "Invalid input data" })
        );
    }
}

#[test]
fn test_missing_province_table_is_reported() {
    let csv = "tax_year,jurisdiction,min_income,max_income,rate\n2024,FED,0,,0.15\n";
    let tables = RateTableLoader::load(csv.as_bytes(), 2024).expect("Failed to load");
    let config = TaxYearConfig::default();
    let engine = TaxEngine::new(&tables, &config);

    let output = calculate_value(
        &engine,
        &json!({ "kind": "individual", "province": "QC", "salary": 50000 }),
    );

    assert_eq!(output, json!({ "error": "no tax brackets for province QC" }));
}

#[test]
fn test_breakdown_is_derived_from_result() {
    let (tables, config) = builtin();
    let engine = TaxEngine::new(&tables, &config);

    let input = parse_input(&json!({ "kind": "individual", "salary": 60000, "age": 40 }))
        .expect("Failed to parse input");
    let result = engine.calculate(&input).expect("Failed to calculate");
    let lines = result.breakdown();

    let net_tax = lines
        .iter()
        .find(|line| line.label == "Net tax")
        .expect("Net tax line");
    assert_eq!(net_tax.value, dec!(9626.13));
}

#[test]
fn test_rate_file_for_another_year() {
    let path = temp_file(
        "rates-2025.csv",
        "tax_year,jurisdiction,min_income,max_income,rate\n\
         2025,FED,0,57375,0.145\n\
         2025,FED,57375,,0.205\n\
         2025,ON,0,,0.0505\n",
    );
    let config = parse_config("tax_year = 2025\n").expect("Failed to parse config");

    let file = fs::File::open(&path).expect("Failed to open rates");
    let tables = RateTableLoader::load(file, config.tax_year).expect("Failed to load rates");
    fs::remove_file(&path).ok();

    assert_eq!(tables.tax_year, 2025);
    assert_eq!(tables.federal[0].tax_rate, dec!(0.145));
    assert!(matches!(
        RateTableLoader::builtin_2024().map(|t| t.tax_year),
        Ok(2024)
    ));
}

#[test]
fn test_rate_file_missing_requested_year() {
    let err = RateTableLoader::load(BUILTIN_CSV_2024.as_bytes(), 2030).expect_err("no 2030");

    assert!(matches!(err, RateTableLoaderError::TaxYearNotFound(2030)));
}

#[test]
fn test_config_override_changes_result() {
    let path = temp_file(
        "config.toml",
        "[corporate]\nbusiness_limit = \"300000\"\n",
    );
    let config = load_config(&path).expect("Failed to load config");
    fs::remove_file(&path).ok();

    let tables = RateTableLoader::builtin_2024().expect("builtin");
    let engine = TaxEngine::new(&tables, &config);

    let output = calculate_value(
        &engine,
        &json!({ "kind": "corporate", "active_business_income": 400000 }),
    );

    assert_eq!(money(&output, "small_business_income"), dec!(300000));
    assert_eq!(money(&output, "general_rate_income"), dec!(100000));
}

#[test]
fn test_malformed_opening_balances_are_coerced() {
    let (tables, config) = builtin();
    let engine = TaxEngine::new(&tables, &config);
    let expected = calculate_value(
        &engine,
        &json!({ "kind": "corporate", "active_business_income": 100000 }),
    );

    for balances in [json!({ "grip": null, "cda": "n/a" }), json!(null), json!("none")] {
        let output = calculate_value(
            &engine,
            &json!({
                "kind": "corporate",
                "active_business_income": 100000,
                "opening_balances": balances
            }),
        );

        assert_eq!(output, expected);
    }

    let output = calculate_value(
        &engine,
        &json!({
            "kind": "wind_up_88",
            "subsidiary_balances": { "lrip": "abc" },
            "opening_balances": null
        }),
    );
    assert_eq!(output["kind"], json!("wind_up_88"));
}

#[test]
fn test_oversized_amounts_are_clamped() {
    let (tables, config) = builtin();
    let engine = TaxEngine::new(&tables, &config);

    let corporate = calculate_value(
        &engine,
        &json!({ "kind": "corporate", "passive_income": "20000000000000000000000000000" }),
    );
    assert_eq!(corporate["kind"], json!("corporate"), "unexpected output: {corporate}");

    let individual = calculate_value(
        &engine,
        &json!({
            "kind": "individual",
            "salary": "50000000000000000000000000000",
            "other_income": "50000000000000000000000000000"
        }),
    );
    assert_eq!(individual["kind"], json!("individual"), "unexpected output: {individual}");
    assert!(money(&individual, "net_tax") > Decimal::ZERO);
}
