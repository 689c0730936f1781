use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ClinicsError;

/// Canonical city buckets used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CityCategory {
    #[serde(rename = "תל אביב")]
    TelAviv,
    #[serde(rename = "בת ים")]
    BatYam,
    #[serde(rename = "יפו")]
    Jaffa,
    #[serde(rename = "חולון")]
    Holon,
    #[serde(rename = "אזור")]
    Azor,
    #[serde(rename = "other")]
    Other,
}

impl CityCategory {
    pub const ALL: [CityCategory; 6] = [
        CityCategory::TelAviv,
        CityCategory::BatYam,
        CityCategory::Jaffa,
        CityCategory::Holon,
        CityCategory::Azor,
        CityCategory::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CityCategory::TelAviv => "תל אביב",
            CityCategory::BatYam => "בת ים",
            CityCategory::Jaffa => "יפו",
            CityCategory::Holon => "חולון",
            CityCategory::Azor => "אזור",
            CityCategory::Other => "other",
        }
    }
}

impl fmt::Display for CityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CityCategory {
    type Err = ClinicsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        CityCategory::ALL
            .into_iter()
            .find(|c| c.label() == s)
            .ok_or_else(|| ClinicsError::InvalidInput(format!("unknown city category: {s}")))
    }
}

/// Maps free-text city names onto a [`CityCategory`].
///
/// Rules are checked in a fixed order and the first match wins, so an input
/// such as "תל אביב-יפו" lands in `TelAviv` even though it also mentions Jaffa.
/// Anything unrecognised (including the empty string) is `Other`.
pub fn normalize(raw: &str) -> CityCategory {
    let city = raw.trim();
    if city.contains("תל אביב") || city == "תל אביב-יפו" {
        return CityCategory::TelAviv;
    }
    if city.contains("בת") && city.contains("ים") {
        return CityCategory::BatYam;
    }
    match city {
        "בתים" => CityCategory::BatYam,
        "יפו" => CityCategory::Jaffa,
        "חולון" => CityCategory::Holon,
        "אזור" => CityCategory::Azor,
        _ => CityCategory::Other,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CityFilter {
    #[default]
    All,
    Only(CityCategory),
}

impl CityFilter {
    pub fn matches(self, category: CityCategory) -> bool {
        match self {
            CityFilter::All => true,
            CityFilter::Only(c) => c == category,
        }
    }
}

impl FromStr for CityFilter {
    type Err = ClinicsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            return Ok(CityFilter::All);
        }
        s.parse().map(CityFilter::Only)
    }
}

/// Marker colour and CSS class for a clinic's city.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CityStyle {
    pub color: &'static str,
    pub class: &'static str,
}

const OTHER_STYLE: CityStyle = CityStyle {
    color: "#a4a7b5",
    class: "other",
};

const BAT_YAM_STYLE: CityStyle = CityStyle {
    color: "#fdcb6e",
    class: "batyam",
};

// Substring table, checked top to bottom.
const CITY_STYLES: [(&str, CityStyle); 8] = [
    (
        "תל אביב",
        CityStyle {
            color: "#6c5ce7",
            class: "ta",
        },
    ),
    (
        "חולון",
        CityStyle {
            color: "#00cec9",
            class: "holon",
        },
    ),
    ("בת ים", BAT_YAM_STYLE),
    ("בת-ים", BAT_YAM_STYLE),
    ("בת- ים", BAT_YAM_STYLE),
    ("בתים", BAT_YAM_STYLE),
    (
        "יפו",
        CityStyle {
            color: "#ff7675",
            class: "jaffa",
        },
    ),
    ("אזור", OTHER_STYLE),
];

pub fn city_style(raw: Option<&str>) -> CityStyle {
    let Some(city) = raw.filter(|s| !s.is_empty()) else {
        return OTHER_STYLE;
    };
    CITY_STYLES
        .iter()
        .find(|(key, _)| city.contains(key))
        .map(|(_, style)| *style)
        .unwrap_or(OTHER_STYLE)
}
