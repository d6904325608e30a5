use std::{fmt, str::FromStr};

use anyhow::bail;
use serde::{Deserialize, Serialize};

/// Geography levels that observations can be reported at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoLevel {
    County,         // Whole-county totals
    Tract,          // Census tracts, the fine level
    Neighborhood,   // Exact groupings of tracts
    Puma,           // Public Use Microdata Areas
}

impl GeoLevel {
    pub const ALL: [GeoLevel; 4] = [
        GeoLevel::County,
        GeoLevel::Tract,
        GeoLevel::Neighborhood,
        GeoLevel::Puma,
    ];

    pub fn to_str(&self) -> &'static str {
        match self {
            GeoLevel::County => "county",
            GeoLevel::Tract => "tract",
            GeoLevel::Neighborhood => "neighborhood",
            GeoLevel::Puma => "puma",
        }
    }
}

impl fmt::Display for GeoLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

impl FromStr for GeoLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "county" => Ok(GeoLevel::County),
            "tract" => Ok(GeoLevel::Tract),
            "neighborhood" => Ok(GeoLevel::Neighborhood),
            "puma" => Ok(GeoLevel::Puma),
            other => bail!("Unknown geography level {other:?} (expected one of county, tract, neighborhood, puma)"),
        }
    }
}
