//! Statutory parameter overrides from TOML.
//!
//! A configuration file names only the values it changes; everything else
//! keeps the built-in 2024 default:
//!
//! ```toml
//! tax_year = 2024
//!
//! [corporate]
//! business_limit = "600000"
//!
//! [provinces.ON]
//! basic_personal_amount = "12747"
//! credit_rate = "0.0505"
//! # ... every provincial field
//! ```
//!
//! Entries under `[provinces]` replace the built-in entry for that province
//! and leave the others alone.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use cantax_core::{Province, ProvincialParameters, TaxYearConfig};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Just the `provinces` table, to tell which entries the file supplied.
#[derive(Debug, Default, Deserialize)]
struct ProvinceOverrides {
    #[serde(default)]
    provinces: BTreeMap<Province, ProvincialParameters>,
}

/// Parse a TOML document into a [`TaxYearConfig`].
pub fn parse_config(source: &str) -> Result<TaxYearConfig, ConfigError> {
    let mut config: TaxYearConfig = toml::from_str(source)?;
    let overrides: ProvinceOverrides = toml::from_str(source)?;

    if !overrides.provinces.is_empty() {
        let mut provinces = ProvincialParameters::canada_2024();
        provinces.extend(overrides.provinces);
        config.provinces = provinces;
    }

    Ok(config)
}

/// Read and parse the configuration at `path`.
pub fn load_config(path: &Path) -> Result<TaxYearConfig, ConfigError> {
    let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&source)?;

    info!(path = %path.display(), tax_year = config.tax_year, "Loaded tax year config");
    Ok(config)
}
