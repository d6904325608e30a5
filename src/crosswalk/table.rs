use std::collections::BTreeMap;

use ahash::AHashMap;
use anyhow::{ensure, Context, Result};
use geo::MultiPolygon;

use crate::{common::{self, Feature}, crosswalk::CrosswalkKind, stats::Observation};

/// Identifier of a fine unit re-derived within its coarse unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalId {
    pub index: String, // "01", "02", ... in crosswalk order
    pub geoid: String, // coarse_id + index
    pub name: String,  // coarse_name + " " + position
}

/// One fine unit resolved to the coarse unit covering most of its area.
#[derive(Debug, Clone, PartialEq)]
pub struct CrosswalkEntry {
    pub fine_id: String,
    pub fine_name: String,
    pub coarse_id: String,
    pub coarse_name: String,
    pub intersection_area: f64,
    pub fine_area: f64,
    pub local: Option<LocalId>,
    pub geometry: MultiPolygon<f64>,
}

impl CrosswalkEntry {
    /// Share of the fine unit's area inside its coarse unit.
    pub fn percent_inner_area(&self) -> f64 { self.intersection_area / self.fine_area }

    fn to_feature(&self) -> Feature {
        let mut properties = BTreeMap::from([
            ("fine_id".to_string(), self.fine_id.clone()),
            ("fine_name".to_string(), self.fine_name.clone()),
            ("coarse_id".to_string(), self.coarse_id.clone()),
            ("coarse_name".to_string(), self.coarse_name.clone()),
            ("intersection_area".to_string(), self.intersection_area.to_string()),
            ("fine_area".to_string(), self.fine_area.to_string()),
        ]);
        if let Some(local) = &self.local {
            properties.insert("local_index".to_string(), local.index.clone());
            properties.insert("local_geoid".to_string(), local.geoid.clone());
            properties.insert("local_name".to_string(), local.name.clone());
        }
        Feature { properties, geometry: self.geometry.clone() }
    }

    fn from_feature(feature: Feature) -> Result<Self> {
        let area = |key: &str| -> Result<f64> {
            let value = feature.property(key)?;
            value.parse::<f64>().with_context(|| format!("Invalid {key} value {value:?}"))
        };

        let local = match feature.properties.get("local_index").filter(|index| !index.is_empty()) {
            Some(index) => Some(LocalId {
                index: index.clone(),
                geoid: feature.property("local_geoid")?.to_string(),
                name: feature.property("local_name")?.to_string(),
            }),
            None => None,
        };

        Ok(Self {
            fine_id: feature.property("fine_id")?.to_string(),
            fine_name: feature.property("fine_name")?.to_string(),
            coarse_id: feature.property("coarse_id")?.to_string(),
            coarse_name: feature.property("coarse_name")?.to_string(),
            intersection_area: area("intersection_area")?,
            fine_area: area("fine_area")?,
            local,
            geometry: feature.geometry,
        })
    }
}

/// A fine-to-coarse mapping table with exactly one entry per fine unit.
#[derive(Debug, Clone)]
pub struct Crosswalk {
    kind: CrosswalkKind,
    entries: Vec<CrosswalkEntry>,
    index: AHashMap<String, usize>,
}

impl Crosswalk {
    /// Wrap a set of entries, rejecting duplicate fine ids.
    pub fn new(kind: CrosswalkKind, entries: Vec<CrosswalkEntry>) -> Result<Self> {
        let mut index = AHashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let previous = index.insert(entry.fine_id.clone(), i);
            ensure!(previous.is_none(),
                "[Crosswalk::new] fine unit {:?} appears more than once in the {kind} crosswalk", entry.fine_id);
        }
        Ok(Self { kind, entries, index })
    }

    #[inline] pub fn kind(&self) -> CrosswalkKind { self.kind }

    #[inline] pub fn entries(&self) -> &[CrosswalkEntry] { &self.entries }

    #[inline] pub fn len(&self) -> usize { self.entries.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Look up the entry for a fine unit id.
    pub fn get(&self, fine_id: &str) -> Option<&CrosswalkEntry> {
        self.index.get(fine_id).map(|&i| &self.entries[i])
    }

    /// Replace fine-unit ids and names with their local identifiers.
    /// Rows for units absent from the crosswalk are dropped.
    pub fn relabel(&self, observations: &[Observation]) -> Result<Vec<Observation>> {
        ensure!(self.kind.local_ids(), "[Crosswalk::relabel] {} crosswalk carries no local identifiers", self.kind);

        let mut dropped = 0;
        let rows = observations.iter()
            .filter_map(|row| {
                let local = self.get(&row.unit_id).and_then(|entry| entry.local.as_ref());
                if local.is_none() { dropped += 1 }
                local.map(|local| Observation {
                    unit_id: local.geoid.clone(),
                    unit_name: local.name.clone(),
                    ..row.clone()
                })
            })
            .collect();

        if dropped > 0 {
            log::warn!("[Crosswalk::relabel] dropped {dropped} rows for units absent from the {} crosswalk", self.kind);
        }
        Ok(rows)
    }

    /// Serialize to a GeoJSON feature collection with string-typed properties.
    pub fn to_geojson_bytes(&self) -> Result<Vec<u8>> {
        let features = self.entries.iter().map(CrosswalkEntry::to_feature).collect::<Vec<_>>();
        common::write_to_geojson_bytes(&features)
    }

    /// Parse a crosswalk previously written by [`Crosswalk::to_geojson_bytes`].
    pub fn from_geojson_bytes(kind: CrosswalkKind, bytes: &[u8]) -> Result<Self> {
        let entries = common::read_from_geojson_bytes(bytes)?
            .into_iter()
            .enumerate()
            .map(|(i, feature)| CrosswalkEntry::from_feature(feature)
                .with_context(|| format!("[Crosswalk::from_geojson_bytes] Bad {kind} crosswalk feature {i}")))
            .collect::<Result<Vec<_>>>()?;

        Self::new(kind, entries)
    }
}
