use std::{collections::BTreeMap, path::{Path, PathBuf}};

use anyhow::{anyhow, Result};

use crate::{common, map::{GeoLevel, Layer}};

/// Source of polygon layers, one per geography level, already in a shared planar CRS.
pub trait GeometryProvider {
    fn layer(&self, level: GeoLevel) -> Result<Layer>;
}

/// One row of a fine-to-coarse assignment table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub fine_id: String,
    pub coarse_id: String,
    pub coarse_name: String,
}

impl Membership {
    pub fn new(fine_id: &str, coarse_id: &str, coarse_name: &str) -> Self {
        Self { fine_id: fine_id.into(), coarse_id: coarse_id.into(), coarse_name: coarse_name.into() }
    }

    /// Read a membership table from a CSV file with `fine_id`, `coarse_id` and `coarse_name` columns.
    pub fn read_csv(path: &Path) -> Result<Vec<Membership>> {
        let df = common::read_csv_file(path)?;
        let fine = common::string_column(&df, "fine_id")?;
        let coarse = common::string_column(&df, "coarse_id")?;
        let names = common::string_column(&df, "coarse_name")?;

        Ok(fine.into_iter().zip(coarse).zip(names)
            .map(|((fine_id, coarse_id), coarse_name)| Membership { fine_id, coarse_id, coarse_name })
            .collect())
    }
}

/// Layers stored as one GeoJSON file per level under a root directory.
pub struct LayerFiles {
    root: PathBuf,
    files: BTreeMap<GeoLevel, PathBuf>,
}

impl LayerFiles {
    /// Every level defaults to `<root>/<level>.geojson`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), files: BTreeMap::new() }
    }

    /// Override the file used for one level (relative paths resolve against the root).
    pub fn with_file(mut self, level: GeoLevel, path: impl Into<PathBuf>) -> Self {
        self.files.insert(level, path.into());
        self
    }

    fn path(&self, level: GeoLevel) -> PathBuf {
        match self.files.get(&level) {
            Some(path) => self.root.join(path),
            None => self.root.join(format!("{level}.geojson")),
        }
    }
}

impl GeometryProvider for LayerFiles {
    fn layer(&self, level: GeoLevel) -> Result<Layer> {
        Layer::read_geojson(level, &self.path(level))
    }
}

/// In-memory layers.
#[derive(Default, Clone)]
pub struct MemLayers {
    layers: BTreeMap<GeoLevel, Layer>,
}

impl MemLayers {
    pub fn new(layers: impl IntoIterator<Item = Layer>) -> Self {
        Self { layers: layers.into_iter().map(|layer| (layer.level(), layer)).collect() }
    }
}

impl GeometryProvider for MemLayers {
    fn layer(&self, level: GeoLevel) -> Result<Layer> {
        self.layers.get(&level).cloned()
            .ok_or_else(|| anyhow!("No {level} layer available"))
    }
}

/// Builds coarse layers by dissolving the fine layer according to membership tables,
/// and delegates every other level to an inner provider.
pub struct DissolvedProvider {
    inner: Box<dyn GeometryProvider>,
    fine: GeoLevel,
    memberships: BTreeMap<GeoLevel, Vec<Membership>>,
}

impl DissolvedProvider {
    pub fn new(inner: Box<dyn GeometryProvider>, fine: GeoLevel) -> Self {
        Self { inner, fine, memberships: BTreeMap::new() }
    }

    pub fn with_membership(mut self, level: GeoLevel, membership: Vec<Membership>) -> Self {
        self.memberships.insert(level, membership);
        self
    }
}

impl GeometryProvider for DissolvedProvider {
    fn layer(&self, level: GeoLevel) -> Result<Layer> {
        match self.memberships.get(&level) {
            Some(membership) => self.inner.layer(self.fine)?.dissolve(level, membership),
            None => self.inner.layer(level),
        }
    }
}
