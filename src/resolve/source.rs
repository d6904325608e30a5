use std::{collections::{BTreeMap, HashSet}, path::Path};

use anyhow::{anyhow, bail, Context, Result};

use crate::{map::GeoLevel, stats::Observation};

/// Supplier of raw observations per geography level.
pub trait DataSource {
    /// Whether the source has data at this level.
    fn supports(&self, level: GeoLevel) -> bool;

    /// Rows for the given variables at `level`; every variable when `variables` is empty.
    fn fetch(&self, level: GeoLevel, variables: &[String]) -> Result<Vec<Observation>>;
}

/// Observations held in memory, one table per level.
#[derive(Debug, Default, Clone)]
pub struct TableSource {
    tables: BTreeMap<GeoLevel, Vec<Observation>>,
}

impl TableSource {
    pub fn new() -> Self { Self::default() }

    pub fn with_table(mut self, level: GeoLevel, rows: Vec<Observation>) -> Self {
        self.tables.insert(level, rows);
        self
    }

    /// Load the table for `level` from an observations CSV file.
    pub fn with_csv(self, level: GeoLevel, path: &Path) -> Result<Self> {
        let rows = Observation::read_csv(path)
            .with_context(|| format!("[TableSource::with_csv] Failed to load {level} data from {}", path.display()))?;
        log::debug!("[TableSource] {} {level} rows from {}", rows.len(), path.display());
        Ok(self.with_table(level, rows))
    }
}

impl DataSource for TableSource {
    fn supports(&self, level: GeoLevel) -> bool { self.tables.contains_key(&level) }

    fn fetch(&self, level: GeoLevel, variables: &[String]) -> Result<Vec<Observation>> {
        let table = self.tables.get(&level)
            .ok_or_else(|| anyhow!("[TableSource::fetch] no data for level {level}"))?;
        if variables.is_empty() { return Ok(table.clone()) }

        let wanted = variables.iter().map(String::as_str).collect::<HashSet<_>>();
        let rows = table.iter()
            .filter(|row| wanted.contains(row.variable.as_str()))
            .cloned()
            .collect::<Vec<_>>();

        let found = rows.iter().map(|row| row.variable.as_str()).collect::<HashSet<_>>();
        let missing = variables.iter().filter(|v| !found.contains(v.as_str())).collect::<Vec<_>>();
        if !missing.is_empty() {
            bail!("[TableSource::fetch] {level} data has no rows for {missing:?}");
        }
        Ok(rows)
    }
}
