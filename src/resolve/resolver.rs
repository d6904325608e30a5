use std::collections::BTreeMap;

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::{
    crosswalk::{Crosswalk, CrosswalkBuilder, CrosswalkKind},
    map::GeoLevel,
    resolve::DataSource,
    stats::{aggregate, Aggregation, GroupBy, Observation},
};

/// How a target level is produced: the level data is fetched at, the crosswalk
/// (if any) grouping it into target units, and the crosswalk (if any) whose local
/// identifiers replace the output unit ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LevelPlan {
    pub source: GeoLevel,
    #[serde(default)]
    pub crosswalk: Option<CrosswalkKind>,
    #[serde(default)]
    pub relabel: Option<CrosswalkKind>,
}

impl LevelPlan {
    /// Fetch at `level` and aggregate unit by unit.
    pub fn direct(level: GeoLevel) -> Self {
        Self { source: level, crosswalk: None, relabel: None }
    }

    /// The built-in plan for each level. Native levels pass through unchanged;
    /// relabeling tracts with local ids is an explicit override.
    pub fn default_for(level: GeoLevel) -> Self {
        match level {
            GeoLevel::County | GeoLevel::Tract | GeoLevel::Puma => Self::direct(level),
            GeoLevel::Neighborhood => Self {
                source: GeoLevel::Tract,
                crosswalk: Some(CrosswalkKind::TractNeighborhood),
                relabel: None,
            },
        }
    }

    pub(crate) fn validate(&self, level: GeoLevel) -> Result<()> {
        if let Some(kind) = self.crosswalk {
            ensure!(kind.fine() == self.source && kind.coarse() == level,
                "[LevelPlan] {level} plan uses the {kind} crosswalk but fetches {} data", self.source);
        } else {
            ensure!(self.source == level, "[LevelPlan] {level} plan fetches {} data without a crosswalk", self.source);
        }
        if let Some(kind) = self.relabel {
            ensure!(kind.fine() == level && kind.local_ids(),
                "[LevelPlan] {level} output cannot be relabeled through the {kind} crosswalk");
        }
        Ok(())
    }
}

/// Routes each target level to a direct fetch or a crosswalk reaggregation.
pub struct GeographyResolver {
    source: Box<dyn DataSource>,
    builder: CrosswalkBuilder,
    plans: BTreeMap<GeoLevel, LevelPlan>,
    crosswalks: BTreeMap<CrosswalkKind, Crosswalk>,
    fresh: bool,
}

impl GeographyResolver {
    pub fn new(source: Box<dyn DataSource>, builder: CrosswalkBuilder) -> Self {
        let plans = GeoLevel::ALL.into_iter().map(|level| (level, LevelPlan::default_for(level))).collect();
        Self { source, builder, plans, crosswalks: BTreeMap::new(), fresh: false }
    }

    /// Replace the plan for one level.
    pub fn with_plan(mut self, level: GeoLevel, plan: LevelPlan) -> Result<Self> {
        plan.validate(level)?;
        self.plans.insert(level, plan);
        Ok(self)
    }

    /// Rebuild every crosswalk the first time this resolver needs it.
    pub fn with_fresh(mut self, fresh: bool) -> Self {
        self.fresh = fresh;
        self
    }

    pub fn plan(&self, level: GeoLevel) -> LevelPlan {
        self.plans.get(&level).copied().unwrap_or_else(|| LevelPlan::default_for(level))
    }

    /// The crosswalk of the given kind, loaded once per resolver.
    pub fn crosswalk(&mut self, kind: CrosswalkKind) -> Result<&Crosswalk> {
        if !self.crosswalks.contains_key(&kind) {
            let crosswalk = self.builder.get(kind, self.fresh)?;
            self.crosswalks.insert(kind, crosswalk);
        }
        Ok(&self.crosswalks[&kind])
    }

    /// Produce `aggregation` over `variables` at `level`, following the level's plan.
    /// The variables the aggregation itself reads are fetched as well.
    pub fn resolve(&mut self, level: GeoLevel, variables: &[String], aggregation: &Aggregation) -> Result<Vec<Observation>> {
        let plan = self.plan(level);
        ensure!(self.source.supports(plan.source), "[GeographyResolver] data source has no {} data", plan.source);

        let mut wanted = variables.to_vec();
        for input in aggregation.inputs().unwrap_or_default() {
            if !wanted.contains(&input) { wanted.push(input) }
        }
        let rows = self.source.fetch(plan.source, &wanted)?;
        log::info!("[GeographyResolver] {level}: {} {} rows", rows.len(), plan.source);

        let output = match plan.crosswalk {
            Some(kind) => {
                let crosswalk = self.crosswalk(kind)?;
                aggregate(&rows, aggregation, &GroupBy::Crosswalk(crosswalk))?
            }
            None => aggregate(&rows, aggregation, &GroupBy::Unit)?,
        };

        match plan.relabel {
            Some(kind) => self.crosswalk(kind)?.relabel(&output),
            None => Ok(output),
        }
    }
}
