mod accounts;
mod province;
mod tax_bracket;
mod tax_year_config;

pub use accounts::{AccountMovement, IntegrationAccountBalances};
pub use province::Province;
pub use tax_bracket::{RateTables, TaxBracket};
pub use tax_year_config::{
    AmtParameters, CorporateParameters, DepartureParameters, FederalParameters,
    ProvincialParameters, TaxYearConfig,
};
