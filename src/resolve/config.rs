use std::{collections::{BTreeMap, HashSet}, path::{Path, PathBuf}};

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    crosswalk::{CrosswalkBuilder, DiskCache},
    map::{DissolvedProvider, GeoLevel, GeometryProvider, LayerFiles, Membership},
    resolve::{GeographyResolver, LevelPlan, TableSource},
};

/// Where the shapes of one level come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometrySource {
    /// A GeoJSON file with `id`/`name` properties.
    File(PathBuf),
    /// Dissolve tracts using a `fine_id, coarse_id, coarse_name` CSV.
    Dissolved(PathBuf),
}

/// Run configuration, read from a JSON file. Relative paths resolve against
/// the directory holding the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Directory for cached crosswalk tables.
    pub cache_dir: PathBuf,
    /// Rebuild crosswalks even if cached.
    pub fresh: bool,
    /// Geometry per level; levels not listed load `<level>.geojson`.
    pub geometry: BTreeMap<GeoLevel, GeometrySource>,
    /// Observations CSV per level.
    pub data: BTreeMap<GeoLevel, PathBuf>,
    /// Variables where a higher value is worse.
    pub inverted: Vec<String>,
    /// Sampling rate used for median margins of error, in percent.
    pub sampling_percentage: Option<f64>,
    /// Per-level overrides of the built-in plans.
    pub plans: BTreeMap<GeoLevel, LevelPlan>,

    #[serde(skip)]
    base: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("cache"),
            fresh: false,
            geometry: BTreeMap::new(),
            data: BTreeMap::new(),
            inverted: Vec::new(),
            sampling_percentage: None,
            plans: BTreeMap::new(),
            base: PathBuf::from("."),
        }
    }
}

impl RunConfig {
    /// Parse and validate a configuration from JSON text. Paths resolve against `base`.
    pub fn from_json(text: &str, base: &Path) -> Result<Self> {
        let mut config: RunConfig = serde_json::from_str(text)
            .context("[RunConfig] invalid configuration")?;
        config.base = base.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    /// Read a configuration file.
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("[RunConfig::read] Failed to read {}", path.display()))?;
        let base = path.parent().unwrap_or(Path::new("."));
        Self::from_json(&text, base)
            .with_context(|| format!("[RunConfig::read] in {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        if let Some(s) = self.sampling_percentage {
            ensure!(s > 0.0 && s <= 100.0, "[RunConfig] sampling_percentage must be in (0, 100], got {s}");
        }
        for (level, source) in &self.geometry {
            if matches!(source, GeometrySource::Dissolved(_)) {
                ensure!(*level != GeoLevel::Tract, "[RunConfig] tracts cannot be dissolved from themselves");
            }
        }
        for (&level, plan) in &self.plans {
            plan.validate(level)?;
        }
        Ok(())
    }

    /// Resolve a configured path against the configuration's directory.
    pub fn path(&self, path: &Path) -> PathBuf { self.base.join(path) }

    pub fn inverted_set(&self) -> HashSet<String> { self.inverted.iter().cloned().collect() }

    /// The geometry provider described by `geometry`.
    pub fn geometry_provider(&self) -> Result<Box<dyn GeometryProvider>> {
        let mut files = LayerFiles::new(&self.base);
        let mut dissolved = Vec::new();
        for (&level, source) in &self.geometry {
            match source {
                GeometrySource::File(path) => files = files.with_file(level, path),
                GeometrySource::Dissolved(membership) => dissolved.push((level, self.path(membership))),
            }
        }
        if dissolved.is_empty() { return Ok(Box::new(files)) }

        let mut provider = DissolvedProvider::new(Box::new(files), GeoLevel::Tract);
        for (level, path) in dissolved {
            provider = provider.with_membership(level, Membership::read_csv(&path)?);
        }
        Ok(Box::new(provider))
    }

    /// A crosswalk builder caching under `cache_dir`.
    pub fn crosswalk_builder(&self) -> Result<CrosswalkBuilder> {
        Ok(CrosswalkBuilder::new(self.geometry_provider()?, Box::new(DiskCache::new(self.path(&self.cache_dir)))))
    }

    /// The data source described by `data`.
    pub fn data_source(&self) -> Result<TableSource> {
        self.data.iter()
            .try_fold(TableSource::new(), |source, (&level, path)| source.with_csv(level, &self.path(path)))
    }

    /// A resolver wired to this configuration's data, geometry, cache and plans.
    pub fn resolver(&self) -> Result<GeographyResolver> {
        let mut resolver = GeographyResolver::new(Box::new(self.data_source()?), self.crosswalk_builder()?)
            .with_fresh(self.fresh);
        for (&level, &plan) in &self.plans {
            resolver = resolver.with_plan(level, plan)?;
        }
        Ok(resolver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crosswalk::CrosswalkKind;

    #[test]
    fn parses_with_defaults() {
        let config = RunConfig::from_json(r#"{
            "geometry": { "tract": { "file": "tracts.geojson" }, "neighborhood": { "dissolved": "hoods.csv" } },
            "inverted": ["poverty_rate"],
            "sampling_percentage": 12.5
        }"#, Path::new("/data")).unwrap();

        assert_eq!(config.cache_dir, PathBuf::from("cache"));
        assert_eq!(config.geometry[&GeoLevel::Neighborhood], GeometrySource::Dissolved("hoods.csv".into()));
        assert_eq!(config.path(&config.cache_dir), PathBuf::from("/data/cache"));
        assert!(config.inverted_set().contains("poverty_rate"));
    }

    #[test]
    fn rejects_bad_configs() {
        assert!(RunConfig::from_json(r#"{ "unknown": 1 }"#, Path::new(".")).is_err());
        assert!(RunConfig::from_json(r#"{ "sampling_percentage": 0 }"#, Path::new(".")).is_err());
        assert!(RunConfig::from_json(r#"{ "geometry": { "tract": { "dissolved": "x.csv" } } }"#, Path::new(".")).is_err());
        assert!(RunConfig::from_json(r#"{ "plans": { "puma": { "source": "tract" } } }"#, Path::new(".")).is_err());
        assert!(RunConfig::from_json(r#"{ "plans": { "puma": { "source": "tract", "crosswalk": "tract-puma" } } }"#, Path::new(".")).is_ok());

        let relabel = RunConfig::from_json(
            r#"{ "plans": { "tract": { "source": "tract", "relabel": "tract-neighborhood" } } }"#, Path::new("."),
        ).unwrap();
        assert_eq!(relabel.plans[&GeoLevel::Tract].relabel, Some(CrosswalkKind::TractNeighborhood));
    }
}
