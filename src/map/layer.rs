use std::{collections::BTreeMap, path::Path};

use ahash::AHashMap;
use anyhow::{ensure, Context, Result};
use geo::MultiPolygon;

use crate::{common::{self, Feature}, geom::{Geometries, Overlap}, map::{GeoLevel, GeoUnit, Membership}};

/// A single planar polygon layer: one geography level's units and their shapes,
/// indexed alike. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct Layer {
    level: GeoLevel,
    units: Vec<GeoUnit>,
    geoms: Geometries,
}

impl Layer {
    /// Construct a layer from units and their shapes (same order, same length).
    pub fn new(level: GeoLevel, units: Vec<GeoUnit>, shapes: Vec<MultiPolygon<f64>>) -> Result<Self> {
        ensure!(units.len() == shapes.len(),
            "[Layer::new] {level} layer has {} units but {} shapes", units.len(), shapes.len());
        Ok(Self { level, units, geoms: Geometries::new(shapes) })
    }

    #[inline] pub fn level(&self) -> GeoLevel { self.level }

    #[inline] pub fn len(&self) -> usize { self.units.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.units.is_empty() }

    #[inline] pub fn units(&self) -> &[GeoUnit] { &self.units }

    #[inline] pub fn shapes(&self) -> &[MultiPolygon<f64>] { self.geoms.shapes() }

    /// Resolve every unit of `self` to the unit of `coarse` covering the largest share
    /// of its area. Equal shares go to the lexicographically smaller coarse id.
    /// Units overlapping nothing in `coarse` are absent from the result.
    pub fn overlay(&self, coarse: &Layer) -> Vec<Overlap> {
        self.geoms.overlay_largest(&coarse.geoms, |a, b| coarse.units[a].id.cmp(&coarse.units[b].id))
    }

    /// Build a coarser layer by dissolving this layer's units according to `membership`.
    /// Output units are ordered by coarse id; fine units without a membership row are left out.
    pub fn dissolve(&self, level: GeoLevel, membership: &[Membership]) -> Result<Layer> {
        let index = self.units.iter().enumerate()
            .map(|(i, unit)| (unit.id.clone(), i))
            .collect::<AHashMap<_, _>>();

        let mut groups: BTreeMap<&str, (&str, Vec<usize>)> = BTreeMap::new();
        let mut unmatched = 0;
        for row in membership {
            let Some(&i) = index.get(row.fine_id.as_str()) else { unmatched += 1; continue };
            groups.entry(row.coarse_id.as_str())
                .or_insert_with(|| (row.coarse_name.as_str(), Vec::new()))
                .1.push(i);
        }

        if unmatched > 0 {
            log::warn!("[Layer::dissolve] {unmatched} membership rows name units absent from the {} layer", self.level);
        }
        let assigned = groups.values().map(|(_, members)| members.len()).sum::<usize>();
        if assigned < self.len() {
            log::warn!("[Layer::dissolve] {} of {} {} units have no {level} assignment",
                self.len() - assigned, self.len(), self.level);
        }

        let (units, members): (Vec<_>, Vec<_>) = groups.into_iter()
            .map(|(id, (name, members))| (GeoUnit::new(id, name), members))
            .unzip();

        Layer::new(level, units, self.geoms.dissolve(&members))
    }

    /// Read a layer from GeoJSON bytes whose features carry `id` and `name` properties.
    pub fn from_geojson_bytes(level: GeoLevel, bytes: &[u8]) -> Result<Self> {
        let (units, shapes): (Vec<_>, Vec<_>) = common::read_from_geojson_bytes(bytes)?
            .into_iter()
            .map(|feature| Ok((
                GeoUnit::new(feature.property("id")?, feature.property("name")?),
                feature.geometry,
            )))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .unzip();

        Self::new(level, units, shapes)
    }

    /// Read a layer from a GeoJSON file.
    pub fn read_geojson(level: GeoLevel, path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("[Layer::read_geojson] Failed to read {level} layer: {}", path.display()))?;
        Self::from_geojson_bytes(level, &bytes)
            .with_context(|| format!("[Layer::read_geojson] Failed to parse {}", path.display()))
    }

    /// Write the layer to GeoJSON bytes with `id` and `name` properties.
    pub fn to_geojson_bytes(&self) -> Result<Vec<u8>> {
        let features = self.units.iter().zip(self.shapes())
            .map(|(unit, shape)| Feature {
                properties: BTreeMap::from([
                    ("id".to_string(), unit.id.to_string()),
                    ("name".to_string(), unit.name.to_string()),
                ]),
                geometry: shape.clone(),
            })
            .collect::<Vec<_>>();

        common::write_to_geojson_bytes(&features)
    }
}

#[cfg(test)]
mod tests {
    use geo::{polygon, Area, MultiPolygon};

    use super::*;

    fn square(x: f64, y: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: x, y: y), (x: x + 1.0, y: y), (x: x + 1.0, y: y + 1.0), (x: x, y: y + 1.0), (x: x, y: y),
        ]])
    }

    fn tracts() -> Layer {
        Layer::new(GeoLevel::Tract,
            vec![GeoUnit::new("003", "Tract 3"), GeoUnit::new("001", "Tract 1"), GeoUnit::new("002", "Tract 2")],
            vec![square(0.0, 0.0), square(1.0, 0.0), square(2.0, 0.0)],
        ).unwrap()
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        assert!(Layer::new(GeoLevel::Tract, vec![GeoUnit::new("1", "a")], vec![]).is_err());
    }

    #[test]
    fn dissolve_groups_by_coarse_id() {
        let membership = vec![
            Membership::new("001", "B", "Beta"),
            Membership::new("002", "B", "Beta"),
            Membership::new("003", "A", "Alpha"),
        ];
        let hoods = tracts().dissolve(GeoLevel::Neighborhood, &membership).unwrap();

        assert_eq!(hoods.level(), GeoLevel::Neighborhood);
        assert_eq!(hoods.units(), &[GeoUnit::new("A", "Alpha"), GeoUnit::new("B", "Beta")]);
        assert!((hoods.shapes()[0].unsigned_area() - 1.0).abs() < 1e-9);
        assert!((hoods.shapes()[1].unsigned_area() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn geojson_round_trip_keeps_units() {
        let layer = tracts();
        let back = Layer::from_geojson_bytes(GeoLevel::Tract, &layer.to_geojson_bytes().unwrap()).unwrap();
        assert_eq!(back.units(), layer.units());
        assert_eq!(back.shapes(), layer.shapes());
    }
}
