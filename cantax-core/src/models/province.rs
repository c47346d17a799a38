use serde::{Deserialize, Serialize};

/// Canadian provinces and territories.
///
/// Serialized as the two-letter postal code. [`Province::parse`] also accepts
/// full names, case-insensitively.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Province {
    #[serde(rename = "AB")]
    Alberta,
    #[serde(rename = "BC")]
    BritishColumbia,
    #[serde(rename = "MB")]
    Manitoba,
    #[serde(rename = "NB")]
    NewBrunswick,
    #[serde(rename = "NL")]
    NewfoundlandAndLabrador,
    #[serde(rename = "NS")]
    NovaScotia,
    #[serde(rename = "NT")]
    NorthwestTerritories,
    #[serde(rename = "NU")]
    Nunavut,
    #[default]
    #[serde(rename = "ON")]
    Ontario,
    #[serde(rename = "PE")]
    PrinceEdwardIsland,
    #[serde(rename = "QC")]
    Quebec,
    #[serde(rename = "SK")]
    Saskatchewan,
    #[serde(rename = "YT")]
    Yukon,
}

impl Province {
    pub const ALL: [Province; 13] = [
        Self::Alberta,
        Self::BritishColumbia,
        Self::Manitoba,
        Self::NewBrunswick,
        Self::NewfoundlandAndLabrador,
        Self::NovaScotia,
        Self::NorthwestTerritories,
        Self::Nunavut,
        Self::Ontario,
        Self::PrinceEdwardIsland,
        Self::Quebec,
        Self::Saskatchewan,
        Self::Yukon,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alberta => "AB",
            Self::BritishColumbia => "BC",
            Self::Manitoba => "MB",
            Self::NewBrunswick => "NB",
            Self::NewfoundlandAndLabrador => "NL",
            Self::NovaScotia => "NS",
            Self::NorthwestTerritories => "NT",
            Self::Nunavut => "NU",
            Self::Ontario => "ON",
            Self::PrinceEdwardIsland => "PE",
            Self::Quebec => "QC",
            Self::Saskatchewan => "SK",
            Self::Yukon => "YT",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Alberta => "Alberta",
            Self::BritishColumbia => "British Columbia",
            Self::Manitoba => "Manitoba",
            Self::NewBrunswick => "New Brunswick",
            Self::NewfoundlandAndLabrador => "Newfoundland and Labrador",
            Self::NovaScotia => "Nova Scotia",
            Self::NorthwestTerritories => "Northwest Territories",
            Self::Nunavut => "Nunavut",
            Self::Ontario => "Ontario",
            Self::PrinceEdwardIsland => "Prince Edward Island",
            Self::Quebec => "Quebec",
            Self::Saskatchewan => "Saskatchewan",
            Self::Yukon => "Yukon",
        }
    }

    /// Parses a postal code (`"QC"`) or full name (`"quebec"`).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.into_iter().find(|p| {
            p.as_str().eq_ignore_ascii_case(s)
                || p.name().eq_ignore_ascii_case(s)
                || (*p == Self::Quebec && s.eq_ignore_ascii_case("québec"))
        })
    }
}

impl std::fmt::Display for Province {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parse_accepts_codes_and_names() {
        assert_eq!(Province::parse("QC"), Some(Province::Quebec));
        assert_eq!(Province::parse("on"), Some(Province::Ontario));
        assert_eq!(Province::parse(" British Columbia "), Some(Province::BritishColumbia));
        assert_eq!(Province::parse("Québec"), Some(Province::Quebec));
    }

    #[test]
    fn parse_rejects_unknown() {
        assert_eq!(Province::parse("XX"), None);
        assert_eq!(Province::parse(""), None);
    }

    #[test]
    fn codes_round_trip_through_parse() {
        for province in Province::ALL {
            assert_eq!(Province::parse(province.as_str()), Some(province));
        }
    }
}
