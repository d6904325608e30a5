#![doc = "tractwalk public API"]
mod common;
mod crosswalk;
mod geom;
mod map;
mod rank;
mod resolve;
mod stats;

#[doc(inline)]
pub use geom::Overlap;

#[doc(inline)]
pub use map::{DissolvedProvider, GeoLevel, GeoUnit, GeometryProvider, Layer, LayerFiles, MemLayers, Membership};

#[doc(inline)]
pub use crosswalk::{
    build_crosswalk, Crosswalk, CrosswalkBuilder, CrosswalkCache, CrosswalkEntry, CrosswalkKind,
    DiskCache, LocalId, MemCache,
};

#[doc(inline)]
pub use stats::{
    aggregate, aggregate_median_data, approximate_median, approximate_proportion, approximate_ratio,
    approximate_sum, fine_to_coarse, observations_to_wide, sum_by, sum_over_variables,
    weighted_fine_to_coarse, weighted_mean_by, Aggregation, Bin, BinSpec, BinnedDistribution,
    Estimate, GroupBy, GroupMedian, Observation, MEDIAN_VARIABLE,
};

#[doc(inline)]
pub use rank::{percentile, rank_and_label, ranked_by_variable, AverageLabel, RankedObservation};

#[doc(inline)]
pub use resolve::{DataSource, GeographyResolver, GeometrySource, LevelPlan, RunConfig, TableSource};
