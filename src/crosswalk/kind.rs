use std::{fmt, str::FromStr};

use anyhow::bail;
use serde::{Deserialize, Serialize};

use crate::map::GeoLevel;

/// The fine/coarse layer pairs a crosswalk is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrosswalkKind {
    TractNeighborhood,
    TractPuma,
}

impl CrosswalkKind {
    pub const ALL: [CrosswalkKind; 2] = [CrosswalkKind::TractNeighborhood, CrosswalkKind::TractPuma];

    pub fn to_str(&self) -> &'static str {
        match self {
            CrosswalkKind::TractNeighborhood => "tract-neighborhood",
            CrosswalkKind::TractPuma => "tract-puma",
        }
    }

    /// The level being mapped from.
    pub fn fine(&self) -> GeoLevel { GeoLevel::Tract }

    /// The level being mapped to.
    pub fn coarse(&self) -> GeoLevel {
        match self {
            CrosswalkKind::TractNeighborhood => GeoLevel::Neighborhood,
            CrosswalkKind::TractPuma => GeoLevel::Puma,
        }
    }

    /// Whether fine units get identifiers re-derived within their coarse unit.
    pub fn local_ids(&self) -> bool {
        matches!(self, CrosswalkKind::TractNeighborhood)
    }

    /// Cache key (file name) for the persisted crosswalk table.
    pub fn cache_key(&self) -> String {
        format!("{}-crosswalk.geojson", self.to_str())
    }
}

impl fmt::Display for CrosswalkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

impl FromStr for CrosswalkKind {
    type Err = anyhow::Error;

    /// Accepts the full name (`tract-puma`) or just the coarse level (`puma`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tract-neighborhood" | "neighborhood" => Ok(CrosswalkKind::TractNeighborhood),
            "tract-puma" | "puma" => Ok(CrosswalkKind::TractPuma),
            other => bail!("Unknown crosswalk kind {other:?} (expected tract-neighborhood or tract-puma)"),
        }
    }
}
