use anyhow::{ensure, Context, Result};

use crate::{
    crosswalk::{Crosswalk, CrosswalkCache, CrosswalkEntry, CrosswalkKind, LocalId},
    map::{GeometryProvider, Layer},
};

/// Build a crosswalk assigning each unit of `fine` to the unit of `coarse`
/// covering the largest share of its area.
///
/// Entries are sorted by `(coarse_id, fine_id)`. For kinds with local ids, fine
/// units are numbered `01..k` within each coarse unit in that order. Fine units
/// overlapping nothing are left out (and reported with a warning).
pub fn build_crosswalk(fine: &Layer, coarse: &Layer, kind: CrosswalkKind) -> Result<Crosswalk> {
    ensure!(fine.level() == kind.fine() && coarse.level() == kind.coarse(),
        "[build_crosswalk] {kind} crosswalk needs {} and {} layers, got {} and {}",
        kind.fine(), kind.coarse(), fine.level(), coarse.level());

    let overlaps = fine.overlay(coarse);
    if overlaps.len() < fine.len() {
        log::warn!("[build_crosswalk] {} of {} {} units overlap no {} unit and were dropped",
            fine.len() - overlaps.len(), fine.len(), fine.level(), coarse.level());
    }

    let mut entries = overlaps.into_iter()
        .map(|overlap| {
            let fine_unit = &fine.units()[overlap.fine];
            let coarse_unit = &coarse.units()[overlap.coarse];
            CrosswalkEntry {
                fine_id: fine_unit.id.to_string(),
                fine_name: fine_unit.name.to_string(),
                coarse_id: coarse_unit.id.to_string(),
                coarse_name: coarse_unit.name.to_string(),
                intersection_area: overlap.intersection_area,
                fine_area: overlap.fine_area,
                local: None,
                geometry: overlap.geometry,
            }
        })
        .collect::<Vec<_>>();

    entries.sort_by(|a, b| (&a.coarse_id, &a.fine_id).cmp(&(&b.coarse_id, &b.fine_id)));

    if kind.local_ids() {
        let mut position = 0;
        for i in 0..entries.len() {
            position = if i > 0 && entries[i - 1].coarse_id == entries[i].coarse_id { position + 1 } else { 1 };
            let entry = &mut entries[i];
            let index = format!("{position:02}");
            entry.local = Some(LocalId {
                geoid: format!("{}{index}", entry.coarse_id),
                name: format!("{} {position}", entry.coarse_name),
                index,
            });
        }
    }

    log::debug!("[build_crosswalk] {kind}: {} entries", entries.len());
    Crosswalk::new(kind, entries)
}

/// Builds crosswalks from a geometry provider, going through a cache.
pub struct CrosswalkBuilder {
    provider: Box<dyn GeometryProvider>,
    cache: Box<dyn CrosswalkCache>,
}

impl CrosswalkBuilder {
    pub fn new(provider: Box<dyn GeometryProvider>, cache: Box<dyn CrosswalkCache>) -> Self {
        Self { provider, cache }
    }

    /// Load the crosswalk of the given kind, computing and storing it if the cache
    /// has no usable copy or `fresh` is set. The table is always parsed back from
    /// its serialized form, so cached and freshly built crosswalks are identical.
    pub fn get(&mut self, kind: CrosswalkKind, fresh: bool) -> Result<Crosswalk> {
        let provider = &self.provider;
        let mut built = false;
        let bytes = self.cache.get_or_build(&kind.cache_key(), fresh, &mut || {
            built = true;
            log::info!("[CrosswalkBuilder] building {kind} crosswalk");
            let fine = provider.layer(kind.fine())?;
            let coarse = provider.layer(kind.coarse())?;
            build_crosswalk(&fine, &coarse, kind)?.to_geojson_bytes()
        })?;

        if !built {
            log::info!("[CrosswalkBuilder] using cached {kind} crosswalk");
        }
        Crosswalk::from_geojson_bytes(kind, &bytes)
            .with_context(|| format!("[CrosswalkBuilder::get] Failed to load {kind} crosswalk"))
    }
}

#[cfg(test)]
mod tests {
    use geo::{polygon, MultiPolygon};

    use super::*;
    use crate::{crosswalk::MemCache, map::{GeoLevel, GeoUnit, MemLayers}};

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1), (x: x0, y: y0)]])
    }

    /// Four tracts in a row plus one far away; hood "B" covers the first two, "A" the rest.
    /// Tract "T2" pokes slightly into "A" but sits mostly in "B".
    fn layers() -> (Layer, Layer) {
        let tracts = Layer::new(GeoLevel::Tract,
            vec![GeoUnit::new("T1", "Tract 1"), GeoUnit::new("T2", "Tract 2"),
                 GeoUnit::new("T3", "Tract 3"), GeoUnit::new("T4", "Tract 4"), GeoUnit::new("T9", "Far")],
            vec![rect(0.0, 0.0, 1.0, 1.0), rect(1.0, 0.0, 2.1, 1.0),
                 rect(2.0, 0.0, 3.0, 1.0), rect(3.0, 0.0, 4.0, 1.0), rect(50.0, 50.0, 51.0, 51.0)],
        ).unwrap();
        let hoods = Layer::new(GeoLevel::Neighborhood,
            vec![GeoUnit::new("B", "Beta"), GeoUnit::new("A", "Alpha")],
            vec![rect(0.0, 0.0, 2.0, 1.0), rect(2.0, 0.0, 4.0, 1.0)],
        ).unwrap();
        (tracts, hoods)
    }

    #[test]
    fn each_fine_unit_appears_once_in_coarse_order() {
        let (tracts, hoods) = layers();
        let crosswalk = build_crosswalk(&tracts, &hoods, CrosswalkKind::TractNeighborhood).unwrap();

        let pairs = crosswalk.entries().iter()
            .map(|e| (e.coarse_id.as_str(), e.fine_id.as_str()))
            .collect::<Vec<_>>();
        // T9 overlaps nothing.
        assert_eq!(pairs, vec![("A", "T3"), ("A", "T4"), ("B", "T1"), ("B", "T2")]);
    }

    #[test]
    fn local_ids_restart_in_each_coarse_unit() {
        let (tracts, hoods) = layers();
        let crosswalk = build_crosswalk(&tracts, &hoods, CrosswalkKind::TractNeighborhood).unwrap();

        let t4 = crosswalk.get("T4").unwrap().local.clone().unwrap();
        assert_eq!(t4, LocalId { index: "02".into(), geoid: "A02".into(), name: "Alpha 2".into() });
        let t1 = crosswalk.get("T1").unwrap().local.clone().unwrap();
        assert_eq!((t1.geoid.as_str(), t1.name.as_str()), ("B01", "Beta 1"));
    }

    #[test]
    fn puma_crosswalk_has_no_local_ids() {
        let (tracts, hoods) = layers();
        let pumas = Layer::new(GeoLevel::Puma, hoods.units().to_vec(), hoods.shapes().to_vec()).unwrap();
        let crosswalk = build_crosswalk(&tracts, &pumas, CrosswalkKind::TractPuma).unwrap();
        assert!(crosswalk.entries().iter().all(|e| e.local.is_none()));
    }

    #[test]
    fn equal_overlap_goes_to_smaller_coarse_id() {
        let tracts = Layer::new(GeoLevel::Tract,
            vec![GeoUnit::new("T1", "Tract 1")],
            vec![rect(0.0, 0.0, 2.0, 1.0)],
        ).unwrap();
        // "Z" comes first in layer order; the tract is split evenly between the two.
        let hoods = Layer::new(GeoLevel::Neighborhood,
            vec![GeoUnit::new("Z", "Zeta"), GeoUnit::new("A", "Alpha")],
            vec![rect(0.0, 0.0, 1.0, 1.0), rect(1.0, 0.0, 2.0, 1.0)],
        ).unwrap();

        let crosswalk = build_crosswalk(&tracts, &hoods, CrosswalkKind::TractNeighborhood).unwrap();
        let entry = crosswalk.get("T1").unwrap();
        assert_eq!(entry.coarse_id, "A");
        assert!((entry.percent_inner_area() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn level_mismatch_is_rejected() {
        let (tracts, hoods) = layers();
        assert!(build_crosswalk(&tracts, &hoods, CrosswalkKind::TractPuma).is_err());
    }

    #[test]
    fn fresh_rebuilds_are_identical_and_cached() {
        let (tracts, hoods) = layers();
        let mut builder = CrosswalkBuilder::new(
            Box::new(MemLayers::new([tracts, hoods])),
            Box::new(MemCache::new()),
        );

        let first = builder.get(CrosswalkKind::TractNeighborhood, true).unwrap();
        let second = builder.get(CrosswalkKind::TractNeighborhood, true).unwrap();
        let cached = builder.get(CrosswalkKind::TractNeighborhood, false).unwrap();

        assert_eq!(first.to_geojson_bytes().unwrap(), second.to_geojson_bytes().unwrap());
        assert_eq!(first.entries(), cached.entries());
    }
}
